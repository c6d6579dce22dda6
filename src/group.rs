/*!
Cohorts (academic groups) and the time slots they meet in.

```text
Groups tab:
  A id | B name | C description | D teacherId | E scheduleType | F timeSlotId

TimeSlots tab:
  A id | B name | C parentId
```

`teacherId` and `timeSlotId` are soft references; a dangling one means
"unassigned". A time slot is a group with no parent.
*/
use serde::{Deserialize, Serialize};

use crate::record::{
    blank_means_none, cell, opt_to_cell, or_default, text, trimmed, trimmed_opt, Record,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleType {
    /// Monday, Wednesday, Friday.
    #[default]
    Mwf,
    /// Tuesday, Thursday, Saturday.
    Tts,
    Daily,
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            ScheduleType::Mwf   => "MWF",
            ScheduleType::Tts   => "TTS",
            ScheduleType::Daily => "DAILY",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MWF"   => Ok(ScheduleType::Mwf),
            "TTS"   => Ok(ScheduleType::Tts),
            "DAILY" => Ok(ScheduleType::Daily),
            _ => Err(format!("{:?} is not a valid ScheduleType.", s)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, deserialize_with = "trimmed")]
    pub id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub description: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub time_slot_id: Option<String>,
}

impl Record for Group {
    const TAB: &'static str = "Groups";
    const HEADER: &'static [&'static str] = &[
        "id", "name", "description", "teacherId", "scheduleType", "timeSlotId",
    ];
    const KIND: &'static str = "Group";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn from_row(row: &[String]) -> Option<Self> {
        let id = match cell(row, 0) {
            "" => { return None; },
            x => x.to_owned(),
        };

        let schedule_type = match or_default(row, 4, "MWF").parse::<ScheduleType>() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Group {:?}: {}; treating as MWF.", &id, &e);
                ScheduleType::Mwf
            },
        };

        Some(Group {
            id,
            name: text(row, 1),
            description: text(row, 2),
            teacher_id: blank_means_none(row, 3),
            schedule_type,
            time_slot_id: blank_means_none(row, 5),
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.description.clone(),
            opt_to_cell(&self.teacher_id),
            self.schedule_type.to_string(),
            opt_to_cell(&self.time_slot_id),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default, deserialize_with = "trimmed")]
    pub id: String,
    /// Free-text time label, like "14:00".
    #[serde(default, deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub parent_id: Option<String>,
}

impl Record for TimeSlot {
    const TAB: &'static str = "TimeSlots";
    const HEADER: &'static [&'static str] = &["id", "name", "parentId"];
    const KIND: &'static str = "TimeSlot";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn from_row(row: &[String]) -> Option<Self> {
        let id = match cell(row, 0) {
            "" => { return None; },
            x => x.to_owned(),
        };

        Some(TimeSlot {
            id,
            name: text(row, 1),
            parent_id: blank_means_none(row, 2),
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), opt_to_cell(&self.parent_id)]
    }
}

/// Resolve a group's soft references against the known teachers and slots.
///
/// Dangling references come back as `None`, meaning "unassigned".
pub fn resolve_assignment<'a>(
    group: &Group,
    teachers: &'a [crate::user::User],
    slots: &'a [TimeSlot],
) -> (Option<&'a crate::user::User>, Option<&'a TimeSlot>) {
    let teacher = group.teacher_id.as_deref()
        .and_then(|id| teachers.iter().find(|u| u.id == id));
    let slot = group.time_slot_id.as_deref()
        .and_then(|id| slots.iter().find(|s| s.id == id && s.parent_id.is_none()));
    (teacher, slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::User;

    fn algebra() -> Group {
        Group {
            id: "g1".to_owned(),
            name: "Algebra I".to_owned(),
            description: "Morning section".to_owned(),
            teacher_id: Some("u1".to_owned()),
            schedule_type: ScheduleType::Tts,
            time_slot_id: Some("t1".to_owned()),
        }
    }

    #[test]
    fn group_round_trip() {
        let g = algebra();
        assert_eq!(Group::from_row(&g.to_row()), Some(g));
    }

    #[test]
    fn padded_group_survives_round_trip() {
        let g = Group {
            name: " Algebra ".to_owned(),
            teacher_id: Some(" u1".to_owned()),
            ..algebra()
        };
        assert_eq!(Group::from_row(&g.to_row()), Some(g));
    }

    #[test]
    fn blank_teacher_id_is_unassigned() {
        let g: Group = serde_json::from_str(r#"{
            "id": "g1", "name": " Algebra ", "teacherId": "", "timeSlotId": " t1 "
        }"#).unwrap();
        assert_eq!(g.name, "Algebra");
        assert_eq!(g.teacher_id, None);
        assert_eq!(g.time_slot_id.as_deref(), Some("t1"));
        assert_eq!(Group::from_row(&g.to_row()), Some(g));
    }

    #[test]
    fn slot_round_trip() {
        let t = TimeSlot { id: "t1".to_owned(), name: "14:00".to_owned(), parent_id: None };
        assert_eq!(TimeSlot::from_row(&t.to_row()), Some(t));
    }

    #[test]
    fn blank_schedule_is_mwf() {
        let row: Vec<String> = ["g2", "Chem"].iter().map(|s| s.to_string()).collect();
        let g = Group::from_row(&row).unwrap();
        assert_eq!(g.schedule_type, ScheduleType::Mwf);
        assert_eq!(g.teacher_id, None);
    }

    #[test]
    fn schedule_type_json() {
        let v = serde_json::to_value(algebra()).unwrap();
        assert_eq!(v["scheduleType"], "TTS");
        assert_eq!(v["timeSlotId"], "t1");
    }

    #[test]
    fn dangling_references_are_unassigned() {
        let g = algebra();
        let (t, s) = resolve_assignment(&g, &[], &[]);
        assert!(t.is_none() && s.is_none());

        let teachers = vec![User { id: "u1".to_owned(), ..User::default() }];
        let slots = vec![TimeSlot { id: "t1".to_owned(), name: "9:00".to_owned(), parent_id: None }];
        let (t, s) = resolve_assignment(&g, &teachers, &slots);
        assert_eq!(t.map(|u| u.id.as_str()), Some("u1"));
        assert_eq!(s.map(|s| s.name.as_str()), Some("9:00"));
    }
}
