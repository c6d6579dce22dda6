/*!
Here we go!

Loads configuration, picks a spreadsheet backend, and serves the JSON API
with the dashboard's static files as the fallback.
*/
use std::{
    path::PathBuf,
    sync::Arc,
};

use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tower_http::services::ServeDir;

use registrar::{
    config::{Backend, Cfg, Glob},
    group::{Group, TimeSlot},
    record::Record,
    sheets::{GoogleSheets, MemorySheets, Sheets},
    student::Student,
    user::User,
};

/// Registry id used by the memory backend when none is configured.
static LOCAL_REGISTRY: &str = "local";

/**
Build the offline backend: one workbook per configured spreadsheet id.
Workbooks that hold records are titled `REG <id>` and start with their
tabs and header rows in place; payroll-only workbooks are titled
`Salary <id>` and start empty.
*/
fn memory_backend(cfg: &mut Cfg) -> MemorySheets {
    if cfg.candidate_ids().is_empty() {
        log::info!("No registry spreadsheet configured; using {:?}.", LOCAL_REGISTRY);
        cfg.registry_spreadsheet_ids.push(LOCAL_REGISTRY.to_owned());
    }

    let mut record_books = cfg.candidate_ids();
    record_books.extend(cfg.students_spreadsheet_id.iter().cloned());
    record_books.extend(cfg.student_spreadsheet_ids.iter().cloned());
    record_books.extend(cfg.timeslots_spreadsheet_id.iter().cloned());

    let headers = [
        (User::TAB, User::header_row()),
        (Student::TAB, Student::header_row()),
        (Group::TAB, Group::header_row()),
        (TimeSlot::TAB, TimeSlot::header_row()),
    ];

    let sheets = MemorySheets::new();
    for id in cfg.all_spreadsheet_ids() {
        if record_books.contains(&id) {
            sheets.add_spreadsheet(&id, &format!("REG {}", &id));
            for (tab, header) in headers.iter() {
                sheets.set_rows(&id, tab, vec![header.clone()]);
            }
        } else {
            sheets.add_spreadsheet(&id, &format!("Salary {}", &id));
        }
    }

    log::info!("Memory backend holds {} spreadsheets.", cfg.all_spreadsheet_ids().len());
    sheets
}

async fn serve<S: Sheets>(cfg: Cfg, sheets: Option<Arc<S>>) -> Result<(), String> {
    let addr = cfg.addr;
    let serve_static = ServeDir::new(&cfg.static_dir);

    let glob = Arc::new(Glob::new(cfg, sheets));
    let app = registrar::router(glob)
        .fallback_service(serve_static);

    log::info!("Listening on {}", &addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| format!("Server error: {}", &e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("registrar")
        .build();
    if let Err(e) = TermLogger::init(
        registrar::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ) {
        eprintln!("Unable to start logging: {}", &e);
    }
    log::info!("Logging started.");

    let cfg_path = std::env::args().nth(1).map(PathBuf::from);
    let mut cfg = match Cfg::load(cfg_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("Unable to load configuration: {}", &e);
            std::process::exit(1);
        },
    };
    log::info!("Configuration:\n{:#?}", &cfg);

    let res = match cfg.backend {
        Backend::Google => match (cfg.service_account_key.clone(), cfg.access_token.clone()) {
            (Some(path), _) => match GoogleSheets::from_key_file(&path).await {
                Ok((sheets, email)) => {
                    cfg.service_account.get_or_insert(email);
                    serve(cfg, Some(Arc::new(sheets))).await
                },
                Err(e) => {
                    log::error!("{}", &e);
                    std::process::exit(1);
                },
            },
            (None, Some(token)) => {
                log::warn!("Using a fixed Google access token; it will not be renewed.");
                serve(cfg, Some(Arc::new(GoogleSheets::new(token)))).await
            },
            (None, None) => {
                log::warn!("No Google credentials configured; API requests will fail.");
                serve::<GoogleSheets>(cfg, None).await
            },
        },
        Backend::Memory => {
            let sheets = memory_backend(&mut cfg);
            serve(cfg, Some(Arc::new(sheets))).await
        },
    };

    if let Err(e) = res {
        log::error!("{}", &e);
        std::process::exit(1);
    }
}
