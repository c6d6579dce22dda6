/*!
School registry service: staff, students, cohorts, and time slots kept in
spreadsheet tabs, plus salary and fines reporting gathered from payroll
workbooks.
*/
use std::sync::Arc;

use axum::{routing::any, Extension, Router};

pub mod config;
pub mod error;
pub mod group;
pub mod inter;
pub mod locator;
pub mod payroll;
pub mod range;
pub mod record;
pub mod sheets;
pub mod store;
pub mod student;
pub mod user;

use config::Glob;
use sheets::Sheets;

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// The JSON API. Each route's handler dispatches on the request method.
pub fn router<S: Sheets>(glob: Arc<Glob<S>>) -> Router {
    Router::new()
        .route("/api/users", any(inter::users::api::<S>))
        .route("/api/students", any(inter::students::api::<S>))
        .route("/api/students/import", any(inter::students::import::<S>))
        .route("/api/groups", any(inter::groups::api::<S>))
        .route("/api/timeslots", any(inter::slots::api::<S>))
        .route("/api/payroll", any(inter::payroll::api::<S>))
        .layer(Extension(glob))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ensure_logging() {
        use simplelog::{TermLogger, TerminalMode, ColorChoice};
        let log_cfg = simplelog::ConfigBuilder::new()
            .add_filter_allow_str("registrar")
            .build();
        let res = TermLogger::init(
            log_level_from_env(),
            log_cfg,
            TerminalMode::Stdout,
            ColorChoice::Auto
        );

        match res {
            Ok(_) => { log::info!("Test logging started."); },
            Err(_) => { log::info!("Test logging already started."); },
        }
    }
}
