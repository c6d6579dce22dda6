/*!
Salary and fines reporting, gathered from loosely-structured workbooks.

Payroll workbooks are kept by hand and come in two shapes:

  * **month tabs**, named after a calendar month, with one row per
    teacher: `teacher | income | bonus | fine | recount | total`;
  * **per-teacher tabs**, named after the teacher, with one row per
    month: `month | income | bonus | fine | recount | total`.

A workbook may also have a `Fines` tab (`teacher | month | amount |
reason | date`). Tabs whose names start with "Pivot Table" are ignored.

Some workbooks are kept per teacher, with rows that never name anybody.
When a row's teacher can't be read, and the workbook's title looks like a
person's name rather than a generic finance title, the title is taken as
the teacher's name. Such names are marked `inferred` so the dashboard can
tell them from names read straight off the sheet.

Money cells are passed through as strings.
*/
use serde::Serialize;

use crate::range;
use crate::record::cell;
use crate::sheets::{Rows, Sheets, SheetsError};

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Column-A values that are labels rather than names (months count too).
const NON_NAME_LABELS: &[&str] = &["month", "total", "fio", "answer"];

/// Header cells that sometimes end up where a teacher's name should be.
const HEADER_ARTIFACTS: &[&str] = &["fio", "teacher"];

/// Words marking a workbook title as generic rather than a person's name.
const GENERIC_TITLE_WORDS: &[&str] = &["salary", "finance", "os it", "track", "copy of"];

const FINES_TAB: &str = "Fines";
const PIVOT_PREFIX: &str = "Pivot Table";
const UNASSIGNED: &str = "Unassigned";
const SAMPLE_ROWS: usize = 3;

pub fn is_month(s: &str) -> bool {
    let s = s.trim().to_lowercase();
    MONTHS.contains(&s.as_str())
}

fn is_non_name_label(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    is_month(&lower) || NON_NAME_LABELS.contains(&lower.as_str())
}

/// Whether a workbook title reads like a finance document rather than a name.
pub fn title_is_generic(title: &str) -> bool {
    let lower = title.to_lowercase();
    GENERIC_TITLE_WORDS.iter().any(|w| lower.contains(w))
        || MONTHS.iter().any(|m| lower.contains(m))
}

/// How confidently a record's teacher is known.
#[derive(Clone, Debug, PartialEq)]
pub enum TeacherName {
    /// Read directly from the sheet.
    Explicit(String),
    /// Taken from the workbook title because the sheet didn't say.
    Inferred { name: String, reason: String },
    /// Nobody; carries the placeholder shown instead.
    Unknown(String),
}

impl TeacherName {
    pub fn name(&self) -> &str {
        match self {
            TeacherName::Explicit(n) => n,
            TeacherName::Inferred { name, .. } => name,
            TeacherName::Unknown(p) => p,
        }
    }

    fn source(&self) -> NameSource {
        match self {
            TeacherName::Explicit(_) => NameSource::Explicit,
            TeacherName::Inferred { .. } => NameSource::Inferred,
            TeacherName::Unknown(_) => NameSource::Unknown,
        }
    }

    fn reason(&self) -> Option<String> {
        match self {
            TeacherName::Inferred { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }
}

/**
Decide a record's teacher from the name derived off the sheet and the
title of the workbook it came from.

The derived name stands unless it is blank, an `Unassigned` placeholder,
or a header artifact. In those cases the workbook title is used, provided
it doesn't look generic.
*/
pub fn classify_teacher(derived: &str, workbook_title: &str) -> TeacherName {
    let derived = derived.trim();
    let lower = derived.to_lowercase();

    let unreadable = derived.is_empty()
        || derived.starts_with(UNASSIGNED)
        || HEADER_ARTIFACTS.contains(&lower.as_str());
    if !unreadable {
        return TeacherName::Explicit(derived.to_owned());
    }

    let title = workbook_title.trim();
    if !title.is_empty() && !title_is_generic(title) {
        let reason = match derived {
            "" => "no teacher on the row".to_owned(),
            x => format!("row named {:?}", x),
        };
        return TeacherName::Inferred { name: title.to_owned(), reason };
    }

    match derived {
        "" => TeacherName::Unknown(UNASSIGNED.to_owned()),
        x => TeacherName::Unknown(x.to_owned()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NameSource {
    Explicit,
    Inferred,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub teacher_name: String,
    pub teacher_name_source: NameSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_reason: Option<String>,
    pub month: String,
    pub income: String,
    pub bonus: String,
    pub fine: String,
    pub recount: String,
    pub total: String,
    pub spreadsheet_id: String,
    pub tab: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fine {
    pub teacher_name: String,
    pub teacher_name_source: NameSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_reason: Option<String>,
    pub month: String,
    pub amount: String,
    pub reason: String,
    pub date: String,
    pub spreadsheet_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsSeen {
    pub spreadsheet_id: String,
    pub title: String,
    pub tabs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetFailure {
    pub spreadsheet_id: String,
    pub error: String,
}

/// Advisory troubleshooting data returned alongside the records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub processed: Vec<String>,
    pub tabs: Vec<TabsSeen>,
    pub sample: Rows,
    pub errors: Vec<SpreadsheetFailure>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub fines: Vec<Fine>,
    pub salaries: Vec<Salary>,
    pub diagnostics: Diagnostics,
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// The name column A gives on a month tab, or a placeholder.
fn month_tab_teacher(row: &[String], tab: &str) -> String {
    match cell(row, 0) {
        x if x.is_empty() || is_non_name_label(x) => format!("{} ({})", UNASSIGNED, tab),
        x => x.to_owned(),
    }
}

fn salary_from_row(
    row: &[String],
    teacher: TeacherName,
    month: &str,
    spreadsheet_id: &str,
    tab: &str,
) -> Salary {
    Salary {
        teacher_name: teacher.name().to_owned(),
        teacher_name_source: teacher.source(),
        inference_reason: teacher.reason(),
        month: month.to_owned(),
        income: cell(row, 1).to_owned(),
        bonus: cell(row, 2).to_owned(),
        fine: cell(row, 3).to_owned(),
        recount: cell(row, 4).to_owned(),
        total: cell(row, 5).to_owned(),
        spreadsheet_id: spreadsheet_id.to_owned(),
        tab: tab.to_owned(),
    }
}

/// Salaries from one month tab.
fn read_month_tab(rows: &Rows, tab: &str, title: &str, spreadsheet_id: &str) -> Vec<Salary> {
    rows.iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let teacher = classify_teacher(&month_tab_teacher(row, tab), title);
            salary_from_row(row, teacher, tab, spreadsheet_id, tab)
        })
        .collect()
}

/// Salaries from one per-teacher tab; ambiguous rows are dropped.
fn read_teacher_tab(rows: &Rows, tab: &str, title: &str, spreadsheet_id: &str) -> Vec<Salary> {
    rows.iter()
        .filter(|row| !is_blank(row))
        .filter_map(|row| {
            let label = cell(row, 0);
            if label.is_empty() || (is_non_name_label(label) && !is_month(label)) {
                log::trace!("Dropping row {:?} of teacher tab {:?}.", row, tab);
                return None;
            }
            let teacher = classify_teacher(tab, title);
            Some(salary_from_row(row, teacher, label, spreadsheet_id, tab))
        })
        .collect()
}

fn read_fines_tab(rows: &Rows, title: &str, spreadsheet_id: &str) -> Vec<Fine> {
    rows.iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let derived = match cell(row, 0) {
                x if x.is_empty() || is_non_name_label(x) => {
                    format!("{} ({})", UNASSIGNED, FINES_TAB)
                },
                x => x.to_owned(),
            };
            let teacher = classify_teacher(&derived, title);
            Fine {
                teacher_name: teacher.name().to_owned(),
                teacher_name_source: teacher.source(),
                inference_reason: teacher.reason(),
                month: cell(row, 1).to_owned(),
                amount: cell(row, 2).to_owned(),
                reason: cell(row, 3).to_owned(),
                date: cell(row, 4).to_owned(),
                spreadsheet_id: spreadsheet_id.to_owned(),
            }
        })
        .collect()
}

/// Everything one workbook contributes. All or nothing.
async fn read_workbook<S: Sheets>(
    sheets: &S,
    spreadsheet_id: &str,
    diag: &mut Diagnostics,
) -> Result<(Vec<Fine>, Vec<Salary>), SheetsError> {
    let meta = sheets.metadata(spreadsheet_id).await
        .map_err(|e| e.annotate("Unable to read workbook metadata"))?;

    let tabs: Vec<String> = meta.tab_titles()
        .filter(|t| !t.starts_with(PIVOT_PREFIX))
        .map(|t| t.to_owned())
        .collect();
    log::debug!("Workbook {:?} ({:?}) tabs: {:?}", spreadsheet_id, &meta.title, &tabs);
    diag.tabs.push(TabsSeen {
        spreadsheet_id: spreadsheet_id.to_owned(),
        title: meta.title.clone(),
        tabs: tabs.clone(),
    });

    let mut fines: Vec<Fine> = Vec::new();
    if tabs.iter().any(|t| t == FINES_TAB) {
        let rows = sheets.get_values(
            spreadsheet_id,
            &range::rows_from(FINES_TAB, 2, 5),
        ).await
            .map_err(|e| e.annotate("Unable to read Fines"))?;
        if diag.sample.is_empty() {
            diag.sample = rows.iter().take(SAMPLE_ROWS).cloned().collect();
        }
        fines = read_fines_tab(&rows, &meta.title, spreadsheet_id);
    }

    let salary_tabs: Vec<&String> = tabs.iter().filter(|t| *t != FINES_TAB).collect();
    let ranges: Vec<String> = salary_tabs.iter()
        .map(|t| range::rows_from(t, 2, 6))
        .collect();
    let tab_rows = sheets.batch_get_values(spreadsheet_id, &ranges).await
        .map_err(|e| e.annotate("Unable to read salary tabs"))?;

    let mut salaries: Vec<Salary> = Vec::new();
    for (tab, rows) in salary_tabs.iter().zip(tab_rows.iter()) {
        if diag.sample.is_empty() {
            diag.sample = rows.iter().take(SAMPLE_ROWS).cloned().collect();
        }
        let mut found = if is_month(tab) {
            read_month_tab(rows, tab, &meta.title, spreadsheet_id)
        } else {
            read_teacher_tab(rows, tab, &meta.title, spreadsheet_id)
        };
        salaries.append(&mut found);
    }

    Ok((fines, salaries))
}

/**
Gather fines and salaries from every workbook in `spreadsheet_ids`.

A workbook that can't be read is logged, noted in the diagnostics, and
contributes nothing; the rest are still processed.
*/
pub async fn aggregate<S: Sheets>(sheets: &S, spreadsheet_ids: &[String]) -> Aggregate {
    log::trace!("payroll::aggregate( {:?} ) called.", spreadsheet_ids);

    let mut agg = Aggregate::default();

    for id in spreadsheet_ids.iter() {
        match read_workbook(sheets, id, &mut agg.diagnostics).await {
            Ok((mut fines, mut salaries)) => {
                log::debug!(
                    "Workbook {:?}: {} fines, {} salary rows.",
                    id, fines.len(), salaries.len()
                );
                agg.fines.append(&mut fines);
                agg.salaries.append(&mut salaries);
                agg.diagnostics.processed.push(id.clone());
            },
            Err(e) => {
                log::error!("Skipping payroll workbook {:?}: {}", id, &e);
                agg.diagnostics.errors.push(SpreadsheetFailure {
                    spreadsheet_id: id.clone(),
                    error: e.to_string(),
                });
            },
        }
    }

    agg
}
