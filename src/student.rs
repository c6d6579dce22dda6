/*!
Students.

```text
Students tab:
  A id | B name | C surname | D phone | E parentPhone | F group | G status
```

`group` is the free-text name of a cohort, not a reference to a `Group` id.
*/
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::record::{cell, or_default, text, trimmed, trimmed_opt, Record};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Status::Active => write!(f, "Active"),
            Status::Inactive => write!(f, "Inactive"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            _ => Err(format!("{:?} is not a valid Status.", s)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, deserialize_with = "trimmed")]
    pub id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub surname: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub phone: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub parent_phone: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub group: String,
    #[serde(default)]
    pub status: Status,
    /// The spreadsheet this student was read from. Not stored in the row.
    #[serde(default, deserialize_with = "trimmed_opt", skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
}

impl Record for Student {
    const TAB: &'static str = "Students";
    const HEADER: &'static [&'static str] = &[
        "id", "name", "surname", "phone", "parentPhone", "group", "status",
    ];
    const KIND: &'static str = "Student";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn from_row(row: &[String]) -> Option<Self> {
        let id = match cell(row, 0) {
            "" => { return None; },
            x => x.to_owned(),
        };

        let status = match or_default(row, 6, "Active").parse::<Status>() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Student {:?}: {}; treating as Active.", &id, &e);
                Status::Active
            },
        };

        Some(Student {
            id,
            name: text(row, 1),
            surname: text(row, 2),
            phone: text(row, 3),
            parent_phone: text(row, 4),
            group: text(row, 5),
            status,
            spreadsheet_id: None,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.surname.clone(),
            self.phone.clone(),
            self.parent_phone.clone(),
            self.group.clone(),
            self.status.to_string(),
        ]
    }
}

impl Student {
    /**
    Student upload .csv rows should look like this

    ```csv
    #name, surname, phone,    parentPhone, group,   status
    Ana,   Lee,     555-0100, 555-0199,    Grade 9, Active
    ```

    `status` may be left blank (meaning `Active`). The id is left empty;
    the store assigns one on insertion.
    */
    pub fn from_csv_line(row: &csv::StringRecord) -> Result<Student, String> {
        log::trace!("Student::from_csv_line( {:?} ) called.", row);

        let name = match row.get(0) {
            Some(s) if !s.is_empty() => s.to_owned(),
            _ => { return Err("no name".to_owned()); },
        };
        let field = |n: usize| row.get(n).unwrap_or("").to_owned();
        let status = match row.get(5) {
            None | Some("") => Status::Active,
            Some(s) => s.parse::<Status>()?,
        };

        Ok(Student {
            id: String::new(),
            name,
            surname: field(1),
            phone: field(2),
            parent_phone: field(3),
            group: field(4),
            status,
            spreadsheet_id: None,
        })
    }

    pub fn vec_from_csv_reader<R: Read>(r: R) -> Result<Vec<Student>, String> {
        log::trace!("Student::vec_from_csv_reader(...) called.");

        let mut csv_reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .has_headers(false)
            .from_reader(r);

        let mut students: Vec<Student> = Vec::new();

        for (n, res) in csv_reader.records().enumerate() {
            let record = match res {
                Ok(record) => record,
                Err(e) => {
                    let estr = match e.position() {
                        Some(p) => format!("Error on line {}: {}", p.line(), &e),
                        None => format!("Error in CSV record {}: {}", &n, &e),
                    };
                    return Err(estr);
                },
            };
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            match Student::from_csv_line(&record) {
                Ok(stud) => { students.push(stud); },
                Err(e) => {
                    let estr = match record.position() {
                        Some(p) => format!("Error on line {}: {}", p.line(), &e),
                        None => format!("Error in CSV record {}: {}", &n, &e),
                    };
                    return Err(estr);
                },
            }
        }

        log::trace!(
            "Student::vec_from_csv_reader() returns {} Students.",
            students.len()
        );
        Ok(students)
    }
}
