/*!
Staff users: admins, employees, and teachers.

```text
Users tab:
  A id | B employeeId | C firstName | D lastName | E password | F role | G telephone | H email
```
*/
use serde::{Deserialize, Serialize};

use crate::record::{cell, or_default, text, trimmed, Record};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Employee,
    Teacher,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Admin    => "admin",
            Role::Employee => "employee",
            Role::Teacher  => "teacher",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin"    => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            "teacher"  => Ok(Role::Teacher),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "trimmed")]
    pub id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub employee_id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub first_name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub last_name: String,
    /// Stored as-is in the sheet; never sent back to clients.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, deserialize_with = "trimmed")]
    pub telephone: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", &self.first_name, &self.last_name).trim().to_owned()
    }
}

impl Record for User {
    const TAB: &'static str = "Users";
    const HEADER: &'static [&'static str] = &[
        "id", "employeeId", "firstName", "lastName",
        "password", "role", "telephone", "email",
    ];
    const KIND: &'static str = "User";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn from_row(row: &[String]) -> Option<Self> {
        let id = match cell(row, 0) {
            "" => { return None; },
            x => x.to_owned(),
        };

        let role = match or_default(row, 5, "employee").parse::<Role>() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("User {:?}: {}; treating as employee.", &id, &e);
                Role::Employee
            },
        };

        Some(User {
            id,
            employee_id: text(row, 1),
            first_name: text(row, 2),
            last_name: text(row, 3),
            password: text(row, 4),
            role,
            telephone: text(row, 6),
            email: text(row, 7),
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.employee_id.clone(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.password.clone(),
            self.role.to_string(),
            self.telephone.clone(),
            self.email.clone(),
        ]
    }
}
