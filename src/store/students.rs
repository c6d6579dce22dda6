/*!
`Store` methods specific to students.

Students are always written to one primary spreadsheet, but older
rosters live in other spreadsheets too, so reads gather every known
Students tab. Each student remembers which spreadsheet it came from,
and edits must name that spreadsheet explicitly.
*/
use futures::future::join_all;
use serde::Serialize;

use super::Store;
use crate::error::Error;
use crate::sheets::Sheets;
use crate::student::Student;

#[derive(Debug, Serialize, PartialEq)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of a multi-record delete. There is no rollback: whatever
/// succeeded before a failure stays deleted.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct BulkOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl<S: Sheets> Store<S> {
    async fn students_in(&self, spreadsheet_id: &str) -> Result<Vec<Student>, Error> {
        let mut studs: Vec<Student> = self.list(spreadsheet_id).await?;
        for s in studs.iter_mut() {
            s.spreadsheet_id = Some(spreadsheet_id.to_owned());
        }
        Ok(studs)
    }

    /**
    Students from the `primary` spreadsheet followed by those of each of the
    `others`, in order.

    A failure reading the primary spreadsheet is an error; failures reading
    any of the others are logged and that spreadsheet is skipped.
    */
    pub async fn get_students_across(
        &self,
        primary: &str,
        others: &[String],
    ) -> Result<Vec<Student>, Error> {
        log::trace!(
            "Store::get_students_across( {:?}, {:?} ) called.",
            primary, others
        );

        let mut others_dedup: Vec<&str> = Vec::with_capacity(others.len());
        for id in others.iter() {
            let id = id.as_str();
            if id != primary && !others_dedup.contains(&id) {
                others_dedup.push(id);
            }
        }

        let mut studs = self.students_in(primary).await?;

        let reads: Vec<_> = others_dedup.iter()
            .map(|id| self.students_in(id))
            .collect();
        let results = join_all(reads).await;

        for (id, res) in others_dedup.iter().zip(results.into_iter()) {
            match res {
                Ok(mut more) => {
                    log::trace!("    ...{} students from {:?}.", more.len(), id);
                    studs.append(&mut more);
                },
                Err(e) => {
                    log::warn!("Skipping students in spreadsheet {:?}: {}", id, &e);
                },
            }
        }

        Ok(studs)
    }

    /// Delete each of `ids` in turn, recording per-id outcomes.
    pub async fn delete_students(
        &self,
        spreadsheet_id: &str,
        ids: &[String],
    ) -> BulkOutcome {
        log::trace!(
            "Store::delete_students( {:?}, [ {} ids ] ) called.",
            spreadsheet_id, ids.len()
        );

        let mut outcome = BulkOutcome::default();
        for id in ids.iter() {
            match self.delete::<Student>(spreadsheet_id, id).await {
                Ok(()) => { outcome.deleted.push(id.clone()); },
                Err(e) => {
                    log::warn!("Unable to delete student {:?}: {}", id, &e);
                    outcome.failed.push(BulkFailure { id: id.clone(), error: e.to_string() });
                },
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{strings, test_store, REGISTRY};

    fn student(name: &str) -> Student {
        Student { name: name.to_owned(), ..Student::default() }
    }

    #[tokio::test]
    async fn students_gathered_across_spreadsheets() {
        let store = test_store();
        store.sheets().add_spreadsheet("old", "Roster 2023");
        store.sheets().set_rows("old", "Students", vec![
            strings(&["id", "name"]),
            strings(&["x1", "Carl"]),
        ]);
        store.sheets().add_spreadsheet("broken", "Roster 2022");
        store.sheets().fail_spreadsheet("broken", "The caller does not have permission");

        let mut ana = student("Ana");
        store.insert(REGISTRY, &mut ana).await.unwrap();

        let others = vec![
            "old".to_owned(), "broken".to_owned(), REGISTRY.to_owned(), "old".to_owned(),
        ];
        let studs = store.get_students_across(REGISTRY, &others).await.unwrap();

        let got: Vec<(&str, Option<&str>)> = studs.iter()
            .map(|s| (s.name.as_str(), s.spreadsheet_id.as_deref()))
            .collect();
        assert_eq!(got, vec![("Ana", Some(REGISTRY)), ("Carl", Some("old"))]);
    }

    #[tokio::test]
    async fn bulk_delete_reports_partial_failure() {
        let store = test_store();
        let mut a = student("A");
        let mut b = student("B");
        let mut c = student("C");
        for s in [&mut a, &mut b, &mut c] {
            store.insert(REGISTRY, s).await.unwrap();
        }

        let ids = vec![a.id.clone(), "missing".to_owned(), c.id.clone()];
        let outcome = store.delete_students(REGISTRY, &ids).await;
        assert_eq!(outcome.deleted, vec![a.id.clone(), c.id.clone()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, "missing");

        let left: Vec<Student> = store.list(REGISTRY).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, b.id);
    }
}
