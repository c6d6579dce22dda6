/*!
`Store` methods specific to cohorts.
*/
use serde::Serialize;

use super::Store;
use crate::error::Error;
use crate::group::{resolve_assignment, Group, TimeSlot};
use crate::sheets::Sheets;

/// A group with its soft references looked up. `None` means unassigned.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGroup {
    #[serde(flatten)]
    pub group: Group,
    pub teacher_name: Option<String>,
    pub time_slot_name: Option<String>,
}

impl<S: Sheets> Store<S> {
    /**
    All groups in `groups_id`, with teachers looked up among that
    spreadsheet's users and time slots among those of `slots_id`.

    Missing users or time slots just leave the assignments unresolved.
    */
    pub async fn get_groups_resolved(
        &self,
        groups_id: &str,
        slots_id: &str,
    ) -> Result<Vec<ResolvedGroup>, Error> {
        log::trace!(
            "Store::get_groups_resolved( {:?}, {:?} ) called.",
            groups_id, slots_id
        );

        let groups: Vec<Group> = self.list(groups_id).await?;

        let teachers = match self.get_teachers(groups_id).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Unable to read teachers from {:?}: {}", groups_id, &e);
                Vec::new()
            },
        };
        let slots: Vec<TimeSlot> = match self.list(slots_id).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Unable to read time slots from {:?}: {}", slots_id, &e);
                Vec::new()
            },
        };

        let resolved = groups.into_iter().map(|group| {
            let (teacher, slot) = resolve_assignment(&group, &teachers, &slots);
            let teacher_name = teacher.map(|u| u.full_name());
            let time_slot_name = slot.map(|s| s.name.clone());
            ResolvedGroup { group, teacher_name, time_slot_name }
        }).collect();

        Ok(resolved)
    }
}
