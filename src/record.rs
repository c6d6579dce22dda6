/*!
Conversion between spreadsheet rows and typed records.

Every entity kind lives in its own tab with a fixed column order, given by
`Record::HEADER`. Rows coming back from the store may be short (trailing
empty cells are dropped), so decoders read cells through `cell()` and
substitute defaults for blanks. Rows whose identifier cell is blank are
not records and are skipped.
*/
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Deserializer};

use crate::range;

const ID_LENGTH: usize = 12;

/// Row 1 of every entity tab is the header; data starts here.
pub const FIRST_DATA_ROW: u32 = 2;

pub trait Record: Sized {
    /// Name of the tab holding this kind of record.
    const TAB: &'static str;
    /// Column headers, in storage order. Column A is always the id.
    const HEADER: &'static [&'static str];
    /// Human-readable name for messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// `None` when the row's id cell is blank.
    fn from_row(row: &[String]) -> Option<Self>;
    fn to_row(&self) -> Vec<String>;

    fn n_columns() -> usize { Self::HEADER.len() }

    fn header_row() -> Vec<String> {
        Self::HEADER.iter().map(|s| s.to_string()).collect()
    }

    /// All data rows of the tab.
    fn data_range() -> String {
        range::rows_from(Self::TAB, FIRST_DATA_ROW, Self::n_columns())
    }

    /// The whole table, header included; the target for appends.
    fn table_range() -> String {
        range::columns(Self::TAB, Self::n_columns())
    }

    /// Exactly sheet row `row`.
    fn row_range(row: u32) -> String {
        range::single_row(Self::TAB, row, Self::n_columns())
    }
}

/// The trimmed contents of cell `n`, or `""` if the row is too short.
pub fn cell(row: &[String], n: usize) -> &str {
    row.get(n).map(|s| s.trim()).unwrap_or("")
}

/// The contents of cell `n` exactly as stored, or `""` if the row is too short.
pub fn text(row: &[String], n: usize) -> String {
    row.get(n).cloned().unwrap_or_default()
}

/// `None` for a blank cell, otherwise the cell exactly as stored.
pub fn blank_means_none(row: &[String], n: usize) -> Option<String> {
    match cell(row, n) {
        "" => None,
        _ => Some(text(row, n)),
    }
}

/// The cell contents, or `default` if blank.
pub fn or_default(row: &[String], n: usize, default: &str) -> String {
    match cell(row, n) {
        "" => default.to_owned(),
        x => x.to_owned(),
    }
}

pub fn opt_to_cell(x: &Option<String>) -> String {
    x.clone().unwrap_or_default()
}

/**
Deserialize a string field with surrounding whitespace removed.

Text read from a row is taken verbatim, so records arriving from clients
are trimmed once here; what gets written then reads back unchanged.
*/
pub fn trimmed<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let s = String::deserialize(d)?;
    Ok(s.trim().to_owned())
}

/// Like `trimmed()`, but a blank value means `None`, as it does in a row.
pub fn trimmed_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.and_then(|s| match s.trim() {
        "" => None,
        x => Some(x.to_owned()),
    }))
}

/// Decode every non-blank row.
pub fn decode_rows<R: Record>(rows: &[Vec<String>]) -> Vec<R> {
    log::trace!("decode_rows::<{}>( [ {} rows ] ) called.", R::KIND, rows.len());

    let records: Vec<R> = rows.iter()
        .filter_map(|row| R::from_row(row))
        .collect();

    log::trace!(
        "    ...decoded {} {} records; {} rows skipped.",
        records.len(), R::KIND, rows.len() - records.len()
    );
    records
}

/// A fresh opaque record identifier.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_of_short_rows_are_blank() {
        let row = vec!["a".to_owned(), "  b ".to_owned()];
        assert_eq!(cell(&row, 1), "b");
        assert_eq!(cell(&row, 5), "");
        assert_eq!(blank_means_none(&row, 2), None);
        assert_eq!(or_default(&row, 3, "MWF"), "MWF");
        assert_eq!(text(&row, 1), "  b ");
        assert_eq!(blank_means_none(&row, 1).as_deref(), Some("  b "));
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        #[serde(default, deserialize_with = "trimmed")]
        name: String,
        #[serde(default, deserialize_with = "trimmed_opt")]
        parent: Option<String>,
    }

    #[test]
    fn client_text_is_trimmed() {
        let n: Named = serde_json::from_str(r#"{ "name": " Ana ", "parent": "   " }"#).unwrap();
        assert_eq!(n.name, "Ana");
        assert_eq!(n.parent, None);

        let n: Named = serde_json::from_str(r#"{ "parent": null }"#).unwrap();
        assert_eq!(n.name, "");
        assert_eq!(n.parent, None);
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), ID_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
