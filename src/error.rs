/*!
The error taxonomy shared by the store and the request handlers.

Backing-store failures arrive as `SheetsError` and become `Error::Upstream`.
Everything the handlers return to the client is one of these four kinds.
*/
use thiserror::Error;

use crate::sheets::SheetsError;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A required credential or identifier is missing.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The target record is absent.
    #[error("{0}")]
    NotFound(String),
    /// Any failure reported by the spreadsheet service.
    #[error("{0}")]
    Upstream(String),
    /// A required field was missing or malformed.
    #[error("{0}")]
    Validation(String),
}

impl From<SheetsError> for Error {
    fn from(e: SheetsError) -> Error {
        Error::Upstream(e.display().to_owned())
    }
}

impl Error {
    pub fn not_found(kind: &str, id: &str) -> Error {
        Error::NotFound(format!("There is no {} with id {:?}.", kind, id))
    }
}
