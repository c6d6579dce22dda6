/*!
Structs to hold configuration data and global variables.

Configuration starts from `Cfg::default()`, is overlaid by an optional TOML
file, and then by environment variables.
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    error::Error,
    locator,
    sheets::Sheets,
    store::Store,
};

/// Body of the error returned when no backing-store credentials are available.
pub const CREDENTIALS_MISSING: &str = "Google Sheets credentials are not configured.";

static DEFAULT_CONFIG_PATH: &str = "registrar.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Google,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Backend::Google),
            "memory" => Ok(Backend::Memory),
            _ => Err(format!("{:?} is not a valid backend (google|memory).", s)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    backend: Option<String>,
    access_token: Option<String>,
    service_account: Option<String>,
    service_account_key: Option<String>,
    registry_spreadsheet_ids: Option<Vec<String>>,
    fallback_spreadsheet_ids: Option<Vec<String>>,
    students_spreadsheet_id: Option<String>,
    student_spreadsheet_ids: Option<Vec<String>>,
    timeslots_spreadsheet_id: Option<String>,
    payroll_spreadsheet_ids: Option<Vec<String>>,
    payroll_max_age: Option<u64>,
    payroll_stale_while_revalidate: Option<u64>,
    static_dir: Option<String>,
}

pub struct Cfg {
    pub addr: SocketAddr,
    pub backend: Backend,
    pub access_token: Option<String>,
    /// Account that must be granted edit access; named in error hints.
    pub service_account: Option<String>,
    /// JSON key of that account. Preferred over `access_token`, which
    /// can't be renewed.
    pub service_account_key: Option<PathBuf>,
    pub registry_spreadsheet_ids: Vec<String>,
    pub fallback_spreadsheet_ids: Vec<String>,
    pub students_spreadsheet_id: Option<String>,
    pub student_spreadsheet_ids: Vec<String>,
    pub timeslots_spreadsheet_id: Option<String>,
    pub payroll_spreadsheet_ids: Vec<String>,
    pub payroll_max_age: u64,
    pub payroll_stale_while_revalidate: u64,
    pub static_dir: PathBuf,
}

// Hand-written so the access token never ends up in the log.
impl std::fmt::Debug for Cfg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cfg")
            .field("addr", &self.addr)
            .field("backend", &self.backend)
            .field("access_token", &self.access_token.as_ref().map(|_| "[set]"))
            .field("service_account", &self.service_account)
            .field("service_account_key", &self.service_account_key)
            .field("registry_spreadsheet_ids", &self.registry_spreadsheet_ids)
            .field("fallback_spreadsheet_ids", &self.fallback_spreadsheet_ids)
            .field("students_spreadsheet_id", &self.students_spreadsheet_id)
            .field("student_spreadsheet_ids", &self.student_spreadsheet_ids)
            .field("timeslots_spreadsheet_id", &self.timeslots_spreadsheet_id)
            .field("payroll_spreadsheet_ids", &self.payroll_spreadsheet_ids)
            .field("payroll_max_age", &self.payroll_max_age)
            .field("payroll_stale_while_revalidate", &self.payroll_stale_while_revalidate)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            backend: Backend::Google,
            access_token: None,
            service_account: None,
            service_account_key: None,
            registry_spreadsheet_ids: Vec::new(),
            fallback_spreadsheet_ids: Vec::new(),
            students_spreadsheet_id: None,
            student_spreadsheet_ids: Vec::new(),
            timeslots_spreadsheet_id: None,
            payroll_spreadsheet_ids: Vec::new(),
            payroll_max_age: 60,
            payroll_stale_while_revalidate: 300,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Split a comma-separated list of ids, dropping blanks.
fn split_ids(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_owned())
        .collect()
}

fn non_blank(s: String) -> Option<String> {
    match s.trim() {
        "" => None,
        x => Some(x.to_owned()),
    }
}

impl Cfg {
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.backend {
            c.backend = s.parse()?;
        }
        c.access_token = cf.access_token.and_then(non_blank);
        c.service_account = cf.service_account.and_then(non_blank);
        c.service_account_key = cf.service_account_key.and_then(non_blank).map(PathBuf::from);
        if let Some(v) = cf.registry_spreadsheet_ids {
            c.registry_spreadsheet_ids = v;
        }
        if let Some(v) = cf.fallback_spreadsheet_ids {
            c.fallback_spreadsheet_ids = v;
        }
        c.students_spreadsheet_id = cf.students_spreadsheet_id.and_then(non_blank);
        if let Some(v) = cf.student_spreadsheet_ids {
            c.student_spreadsheet_ids = v;
        }
        c.timeslots_spreadsheet_id = cf.timeslots_spreadsheet_id.and_then(non_blank);
        if let Some(v) = cf.payroll_spreadsheet_ids {
            c.payroll_spreadsheet_ids = v;
        }
        if let Some(n) = cf.payroll_max_age {
            c.payroll_max_age = n;
        }
        if let Some(n) = cf.payroll_stale_while_revalidate {
            c.payroll_stale_while_revalidate = n;
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        Self::from_toml_str(&file_contents)
    }

    /**
    Overlay values from the environment, as read through `var`.

    Values that are set but blank are ignored.
    */
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>
    {
        let var = |name: &str| var(name).and_then(non_blank);

        if let Some(s) = var("REGISTRAR_BACKEND") {
            self.backend = s.parse()?;
        }
        if let Some(s) = var("GOOGLE_ACCESS_TOKEN") {
            self.access_token = Some(s);
        }
        if let Some(s) = var("GOOGLE_SERVICE_ACCOUNT_EMAIL") {
            self.service_account = Some(s);
        }
        if let Some(s) = var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            self.service_account_key = Some(PathBuf::from(s));
        }
        if let Some(s) = var("REGISTRY_SPREADSHEET_IDS") {
            self.registry_spreadsheet_ids = split_ids(&s);
        }
        if let Some(s) = var("STUDENTS_SPREADSHEET_ID") {
            self.students_spreadsheet_id = Some(s);
        }
        if let Some(s) = var("STUDENT_SPREADSHEET_IDS") {
            self.student_spreadsheet_ids = split_ids(&s);
        }
        if let Some(s) = var("TIMESLOTS_SPREADSHEET_ID") {
            self.timeslots_spreadsheet_id = Some(s);
        }
        if let Some(s) = var("PAYROLL_SPREADSHEET_IDS") {
            self.payroll_spreadsheet_ids = split_ids(&s);
        }

        Ok(())
    }

    /**
    Read the config file at `path` (if given), else at `$REGISTRAR_CONFIG`,
    else at `registrar.toml`, then apply the process environment.

    A config file that doesn't exist just means defaults.
    */
    pub fn load(path: Option<PathBuf>) -> Result<Self, String> {
        let path = path
            .or_else(|| std::env::var("REGISTRAR_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            log::info!("Reading configuration from {}.", path.display());
            Self::from_file(&path)?
        } else {
            log::info!("No config file at {}; using defaults.", path.display());
            Self::default()
        };

        cfg.apply_env(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Registry candidates: environment-provided first, then fallbacks.
    pub fn candidate_ids(&self) -> Vec<String> {
        locator::candidate_ids(&self.registry_spreadsheet_ids, &self.fallback_spreadsheet_ids)
    }

    /// Every spreadsheet id mentioned anywhere in the configuration.
    pub fn all_spreadsheet_ids(&self) -> Vec<String> {
        let mut ids = self.candidate_ids();
        let others = self.students_spreadsheet_id.iter()
            .chain(self.student_spreadsheet_ids.iter())
            .chain(self.timeslots_spreadsheet_id.iter())
            .chain(self.payroll_spreadsheet_ids.iter());
        for id in others {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// What a client should do about a failure reported by the backing store.
    pub fn remediation_hint(&self) -> String {
        let who = self.service_account.as_deref().unwrap_or("the service account");
        format!("Share the spreadsheet with {} as an Editor.", who)
    }
}

/**
This guy will haul around the configuration and the store and be passed
in an `axum::Extension` to the handlers who need him.

`store` is `None` when no backing-store credentials are configured; every
request that needs it then fails with a configuration error.
*/
pub struct Glob<S> {
    pub cfg: Cfg,
    store: Option<Store<S>>,
}

impl<S: Sheets> Glob<S> {
    pub fn new(cfg: Cfg, sheets: Option<Arc<S>>) -> Self {
        let store = sheets.map(Store::new);
        Self { cfg, store }
    }

    pub fn store(&self) -> Result<&Store<S>, Error> {
        self.store.as_ref().ok_or_else(|| Error::Config(CREDENTIALS_MISSING.to_owned()))
    }

    /// Resolve the registry spreadsheet among the configured candidates.
    ///
    /// This probes the backing store, so it is done per request.
    pub async fn registry_id(&self) -> Result<String, Error> {
        let store = self.store()?;
        locator::resolve_primary_spreadsheet(store.sheets(), &self.cfg.candidate_ids()).await
    }

    /// The spreadsheet students are written to.
    pub async fn students_id(&self) -> Result<String, Error> {
        match &self.cfg.students_spreadsheet_id {
            Some(id) => Ok(id.clone()),
            None => self.registry_id().await,
        }
    }

    pub async fn timeslots_id(&self) -> Result<String, Error> {
        match &self.cfg.timeslots_spreadsheet_id {
            Some(id) => Ok(id.clone()),
            None => self.registry_id().await,
        }
    }
}
