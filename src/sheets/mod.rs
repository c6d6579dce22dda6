/*!
The row contract of the backing spreadsheet service.

A spreadsheet is a titled collection of tabs; each tab is addressed by its
visible title in range references and by a structural `sheet_id` for
structural edits (deleting rows), which survives renames.

Cell values cross this boundary as strings. The service may omit trailing
empty cells of a row and trailing empty rows of a range, so callers must
treat short rows as padded with empty cells.
*/
use std::future::Future;

use serde::Serialize;

pub mod google;
pub mod memory;

pub use google::GoogleSheets;
pub use memory::MemorySheets;

pub type Rows = Vec<Vec<String>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMeta {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMeta {
    pub title: String,
    pub tabs: Vec<TabMeta>,
}

impl SpreadsheetMeta {
    pub fn tab(&self, title: &str) -> Option<&TabMeta> {
        self.tabs.iter().find(|t| t.title == title)
    }

    pub fn tab_titles(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(|t| t.title.as_str())
    }
}

#[derive(Debug, PartialEq)]
pub struct SheetsError(String);

impl SheetsError {
    pub fn new<S: Into<String>>(msg: S) -> Self { SheetsError(msg.into()) }

    /// Prepend some contextual `annotation` for the error.
    pub fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl std::fmt::Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl From<String> for SheetsError {
    fn from(s: String) -> SheetsError { SheetsError(s) }
}

/**
Everything the store needs from a spreadsheet service.

Row numbers passed to `delete_rows` are 0-based and half-open
(`start..end`), matching the service's dimension-range protocol; range
strings use 1-based A1 notation (see `crate::range`).
*/
pub trait Sheets: Send + Sync + 'static {
    /// Spreadsheet title and its tabs, in display order.
    fn metadata(
        &self,
        spreadsheet_id: &str,
    ) -> impl Future<Output = Result<SpreadsheetMeta, SheetsError>> + Send;

    fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> impl Future<Output = Result<Rows, SheetsError>> + Send;

    /// One `Rows` per requested range, in request order.
    fn batch_get_values(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> impl Future<Output = Result<Vec<Rows>, SheetsError>> + Send;

    /// Overwrite the cells of `range` starting at its top-left corner.
    fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Rows,
    ) -> impl Future<Output = Result<(), SheetsError>> + Send;

    /// Append `rows` after the last non-empty row of the table in `range`.
    fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Rows,
    ) -> impl Future<Output = Result<(), SheetsError>> + Send;

    /// Create a tab, returning its structural id.
    fn add_tab(
        &self,
        spreadsheet_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<i64, SheetsError>> + Send;

    fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        start: u32,
        end: u32,
    ) -> impl Future<Output = Result<(), SheetsError>> + Send;
}
