/*!
An in-process spreadsheet service.

Used as the fixture for tests and as the `memory` backend for running the
service offline. It mimics the value semantics of the real service closely
enough for the store: ranges are resolved by tab title, trailing empty
cells and rows are trimmed from reads, and appends land after the last
non-empty row.
*/
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Rows, Sheets, SheetsError, SpreadsheetMeta, TabMeta};
use crate::range;

#[derive(Debug)]
struct Tab {
    sheet_id: i64,
    title: String,
    rows: Rows,
}

#[derive(Debug)]
struct Book {
    title: String,
    tabs: Vec<Tab>,
    /// When set, every call against this spreadsheet fails with this message.
    failure: Option<String>,
}

impl Book {
    fn tab_mut(&mut self, title: &str) -> Result<&mut Tab, SheetsError> {
        self.tabs.iter_mut()
            .find(|t| t.title == title)
            .ok_or_else(|| SheetsError::new(format!("Unable to parse range: {}", title)))
    }

    fn tab(&self, title: &str) -> Result<&Tab, SheetsError> {
        self.tabs.iter()
            .find(|t| t.title == title)
            .ok_or_else(|| SheetsError::new(format!("Unable to parse range: {}", title)))
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

#[derive(Debug, Default)]
pub struct MemorySheets {
    books: Mutex<HashMap<String, Book>>,
}

impl MemorySheets {
    pub fn new() -> Self { Self::default() }

    fn books(&self) -> MutexGuard<'_, HashMap<String, Book>> {
        self.books.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the (working) spreadsheet `id`.
    fn with_book<T, F>(&self, id: &str, f: F) -> Result<T, SheetsError>
    where
        F: FnOnce(&mut Book) -> Result<T, SheetsError>
    {
        let mut books = self.books();
        let book = books.get_mut(id).ok_or_else(|| SheetsError::new(format!(
            "Requested entity was not found: spreadsheet {:?}", id
        )))?;
        if let Some(msg) = &book.failure {
            return Err(SheetsError::new(msg.clone()));
        }
        f(book)
    }

    /// Add an empty spreadsheet. Replaces any existing one with the same id.
    pub fn add_spreadsheet(&self, id: &str, title: &str) {
        log::trace!("MemorySheets::add_spreadsheet( {:?}, {:?} ) called.", id, title);
        self.books().insert(id.to_owned(), Book {
            title: title.to_owned(),
            tabs: Vec::new(),
            failure: None,
        });
    }

    pub fn with_spreadsheet(self, id: &str, title: &str) -> Self {
        self.add_spreadsheet(id, title);
        self
    }

    /// Replace the contents of tab `title`, creating the tab if necessary.
    pub fn set_rows(&self, id: &str, title: &str, rows: Rows) {
        let mut books = self.books();
        let book = books.entry(id.to_owned()).or_insert_with(|| Book {
            title: id.to_owned(),
            tabs: Vec::new(),
            failure: None,
        });
        match book.tabs.iter_mut().find(|t| t.title == title) {
            Some(tab) => { tab.rows = rows; },
            None => {
                let sheet_id = next_sheet_id(book);
                book.tabs.push(Tab { sheet_id, title: title.to_owned(), rows });
            },
        }
    }

    /// Make every subsequent call against spreadsheet `id` fail.
    pub fn fail_spreadsheet(&self, id: &str, msg: &str) {
        if let Some(book) = self.books().get_mut(id) {
            book.failure = Some(msg.to_owned());
        }
    }

    /// A copy of the raw rows of a tab, untrimmed.
    pub fn rows(&self, id: &str, title: &str) -> Option<Rows> {
        self.books().get(id)
            .and_then(|b| b.tabs.iter().find(|t| t.title == title))
            .map(|t| t.rows.clone())
    }

    pub fn tab_count(&self, id: &str) -> usize {
        self.books().get(id).map(|b| b.tabs.len()).unwrap_or(0)
    }
}

fn next_sheet_id(book: &Book) -> i64 {
    book.tabs.iter().map(|t| t.sheet_id + 1).max().unwrap_or(0)
}

fn read_range(book: &Book, range_str: &str) -> Result<Rows, SheetsError> {
    let r = range::parse(range_str).map_err(SheetsError::from)?;
    let tab = book.tab(&r.tab)?;

    let first = (r.first_row as usize).saturating_sub(1);
    let last = match r.last_row {
        Some(n) => (n as usize).min(tab.rows.len()),
        None => tab.rows.len(),
    };

    let mut out: Rows = Vec::new();
    for row in tab.rows.iter().take(last).skip(first) {
        let start = r.first_col - 1;
        let end = match r.last_col {
            Some(n) => n.min(row.len()),
            None => row.len(),
        };
        let mut cells: Vec<String> = if start < end {
            row[start..end].to_vec()
        } else {
            Vec::new()
        };
        while cells.last().map(|c| c.is_empty()).unwrap_or(false) {
            cells.pop();
        }
        out.push(cells);
    }
    while out.last().map(|r| r.is_empty()).unwrap_or(false) {
        out.pop();
    }

    Ok(out)
}

impl Sheets for MemorySheets {
    async fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
        log::trace!("MemorySheets::metadata( {:?} ) called.", spreadsheet_id);
        self.with_book(spreadsheet_id, |book| Ok(SpreadsheetMeta {
            title: book.title.clone(),
            tabs: book.tabs.iter().map(|t| TabMeta {
                sheet_id: t.sheet_id,
                title: t.title.clone(),
            }).collect(),
        }))
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Rows, SheetsError> {
        log::trace!("MemorySheets::get_values( {:?}, {:?} ) called.", spreadsheet_id, range);
        self.with_book(spreadsheet_id, |book| read_range(book, range))
    }

    async fn batch_get_values(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<Rows>, SheetsError> {
        log::trace!(
            "MemorySheets::batch_get_values( {:?}, {:?} ) called.",
            spreadsheet_id, ranges
        );
        self.with_book(spreadsheet_id, |book| {
            ranges.iter().map(|r| read_range(book, r)).collect()
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range_str: &str,
        rows: Rows,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "MemorySheets::update_values( {:?}, {:?}, [ {} rows ] ) called.",
            spreadsheet_id, range_str, rows.len()
        );
        let r = range::parse(range_str).map_err(SheetsError::from)?;
        self.with_book(spreadsheet_id, |book| {
            let tab = book.tab_mut(&r.tab)?;
            let row0 = (r.first_row as usize).saturating_sub(1);
            let col0 = r.first_col - 1;
            for (n, values) in rows.into_iter().enumerate() {
                let idx = row0 + n;
                if tab.rows.len() <= idx {
                    tab.rows.resize(idx + 1, Vec::new());
                }
                let target = &mut tab.rows[idx];
                if target.len() < col0 + values.len() {
                    target.resize(col0 + values.len(), String::new());
                }
                for (m, v) in values.into_iter().enumerate() {
                    target[col0 + m] = v;
                }
            }
            Ok(())
        })
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range_str: &str,
        rows: Rows,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "MemorySheets::append_values( {:?}, {:?}, [ {} rows ] ) called.",
            spreadsheet_id, range_str, rows.len()
        );
        let r = range::parse(range_str).map_err(SheetsError::from)?;
        self.with_book(spreadsheet_id, |book| {
            let tab = book.tab_mut(&r.tab)?;
            while tab.rows.last().map(|row| is_blank(row)).unwrap_or(false) {
                tab.rows.pop();
            }
            tab.rows.extend(rows);
            Ok(())
        })
    }

    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<i64, SheetsError> {
        log::trace!("MemorySheets::add_tab( {:?}, {:?} ) called.", spreadsheet_id, title);
        self.with_book(spreadsheet_id, |book| {
            if book.tabs.iter().any(|t| t.title == title) {
                return Err(SheetsError::new(format!(
                    "A sheet with the name \"{}\" already exists.", title
                )));
            }
            let sheet_id = next_sheet_id(book);
            book.tabs.push(Tab { sheet_id, title: title.to_owned(), rows: Vec::new() });
            Ok(sheet_id)
        })
    }

    async fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        start: u32,
        end: u32,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "MemorySheets::delete_rows( {:?}, {}, {}, {} ) called.",
            spreadsheet_id, sheet_id, start, end
        );
        self.with_book(spreadsheet_id, |book| {
            let tab = book.tabs.iter_mut()
                .find(|t| t.sheet_id == sheet_id)
                .ok_or_else(|| SheetsError::new(format!("No grid with id: {}", sheet_id)))?;
            let len = tab.rows.len();
            let (start, end) = ((start as usize).min(len), (end as usize).min(len));
            if start < end {
                tab.rows.drain(start..end);
            }
            Ok(())
        })
    }
}
