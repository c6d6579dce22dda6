/*!
Record storage on top of a spreadsheet service.

Every entity kind lives in its own tab, row 1 holding the header and data
starting at row 2 (see `crate::record`). There is no primary-key index in
the backing store, so updates and deletes address rows by position: the id
column is scanned for the record's id, and the resulting sheet row number
is then overwritten or removed.

Position addressing goes stale if another writer shifts rows between the
scan and the mutation. Within this process every find-then-mutate sequence
on a tab runs under that tab's lock; writers in other processes are not
coordinated.
*/
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::Error;
use crate::range;
use crate::record::{self, decode_rows, Record, FIRST_DATA_ROW};
use crate::sheets::{Rows, Sheets};

pub mod groups;
pub mod students;
pub mod users;

type TabKey = (String, String);

/// One async lock per (spreadsheet, tab) pair, created on first use and
/// dropped again when nobody holds or awaits it.
#[derive(Default)]
struct TabLocks {
    locks: Mutex<HashMap<TabKey, Arc<AsyncMutex<()>>>>,
}

impl TabLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<TabKey, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn lock(&self, spreadsheet_id: &str, tab: &str) -> TabGuard<'_> {
        let key = (spreadsheet_id.to_owned(), tab.to_owned());
        let lock = self.map().entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        TabGuard { locks: self, key, guard: Some(guard) }
    }

    #[cfg(test)]
    fn len(&self) -> usize { self.map().len() }
}

/// Held for the duration of a find-then-mutate sequence on one tab.
struct TabGuard<'a> {
    locks: &'a TabLocks,
    key: TabKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TabGuard<'_> {
    fn drop(&mut self) {
        // Clones are only taken under the map lock, so a count of one
        // (the map's own) means no task holds or awaits this lock.
        let mut map = self.locks.map();
        self.guard.take();
        if map.get(&self.key).map(|l| Arc::strong_count(l) == 1).unwrap_or(false) {
            map.remove(&self.key);
        }
    }
}

pub struct Store<S> {
    sheets: Arc<S>,
    locks: TabLocks,
}

impl<S: Sheets> Store<S> {
    pub fn new(sheets: Arc<S>) -> Self {
        log::trace!("Store::new( [ Sheets ] ) called.");
        Self { sheets, locks: TabLocks::default() }
    }

    pub fn sheets(&self) -> &S { &self.sheets }

    /**
    Find the sheet row holding `id` in column A of `tab`.

    Returns the 1-based sheet row number (the first data row is row 2), or
    `None` if no row carries that id.
    */
    pub async fn find_row_index(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        id: &str,
    ) -> Result<Option<u32>, Error> {
        log::trace!(
            "Store::find_row_index( {:?}, {:?}, {:?} ) called.",
            spreadsheet_id, tab, id
        );

        let ids = self.sheets.get_values(
            spreadsheet_id,
            &range::rows_from(tab, FIRST_DATA_ROW, 1),
        ).await
            .map_err(|e| e.annotate(&format!("Unable to read ids from {:?}", tab)))?;

        let pos = ids.iter().position(|row| {
            row.first().map(|c| c.trim() == id).unwrap_or(false)
        });

        Ok(pos.map(|offset| offset as u32 + FIRST_DATA_ROW))
    }

    /// Overwrite the single row addressed by `range`.
    pub async fn update_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<String>,
    ) -> Result<(), Error> {
        log::trace!(
            "Store::update_row( {:?}, {:?}, {:?} ) called.",
            spreadsheet_id, range, &values
        );

        self.sheets.update_values(spreadsheet_id, range, vec![values]).await
            .map_err(|e| e.annotate("Unable to update row"))?;
        Ok(())
    }

    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Rows,
    ) -> Result<(), Error> {
        log::trace!(
            "Store::append_rows( {:?}, {:?}, [ {} rows ] ) called.",
            spreadsheet_id, range, rows.len()
        );

        self.sheets.append_values(spreadsheet_id, range, rows).await
            .map_err(|e| e.annotate("Unable to append rows"))?;
        Ok(())
    }

    /**
    Remove sheet row `row` of `tab`.

    The tab's structural id is looked up immediately before the delete, so
    a rename between the row scan and now doesn't misdirect the removal.
    */
    pub async fn delete_row(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        row: u32,
    ) -> Result<(), Error> {
        log::trace!(
            "Store::delete_row( {:?}, {:?}, {} ) called.",
            spreadsheet_id, tab, row
        );

        let meta = self.sheets.metadata(spreadsheet_id).await
            .map_err(|e| e.annotate("Unable to read spreadsheet metadata"))?;
        let sheet_id = match meta.tab(tab) {
            Some(t) => t.sheet_id,
            None => {
                return Err(Error::Upstream(format!(
                    "Spreadsheet {:?} has no tab {:?}.", spreadsheet_id, tab
                )));
            },
        };

        self.sheets.delete_rows(spreadsheet_id, sheet_id, row - 1, row).await
            .map_err(|e| e.annotate("Unable to delete row"))?;
        Ok(())
    }

    /// Create `tab` with `header` as its first row if it doesn't exist yet.
    ///
    /// Returns whether the tab was created.
    async fn provision_tab(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        header: Vec<String>,
    ) -> Result<bool, Error> {
        let meta = self.sheets.metadata(spreadsheet_id).await
            .map_err(|e| e.annotate("Unable to read spreadsheet metadata"))?;
        if meta.tab(tab).is_some() {
            return Ok(false);
        }

        log::info!("Creating tab {:?} in spreadsheet {:?}.", tab, spreadsheet_id);
        self.sheets.add_tab(spreadsheet_id, tab).await
            .map_err(|e| e.annotate(&format!("Unable to create tab {:?}", tab)))?;
        let n_cols = header.len();
        self.sheets.update_values(
            spreadsheet_id,
            &range::single_row(tab, 1, n_cols),
            vec![header],
        ).await
            .map_err(|e| e.annotate(&format!("Unable to write header of {:?}", tab)))?;

        Ok(true)
    }

    /**
    Ensure `tab` exists, creating it and writing `header` as row 1 if not.

    Safe to call before every write. Two processes provisioning the same
    tab at once may both try to create it; one of them will get an error.
    */
    pub async fn ensure_tab(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        header: &[String],
    ) -> Result<bool, Error> {
        log::trace!("Store::ensure_tab( {:?}, {:?} ) called.", spreadsheet_id, tab);

        let _guard = self.locks.lock(spreadsheet_id, tab).await;
        self.provision_tab(spreadsheet_id, tab, header.to_vec()).await
    }

    //
    //
    // Typed access.
    //
    //

    pub async fn list<R: Record>(&self, spreadsheet_id: &str) -> Result<Vec<R>, Error> {
        log::trace!("Store::list::<{}>( {:?} ) called.", R::KIND, spreadsheet_id);

        let rows = self.sheets.get_values(spreadsheet_id, &R::data_range()).await
            .map_err(|e| e.annotate(&format!("Unable to read {:?}", R::TAB)))?;
        Ok(decode_rows(&rows))
    }

    /// Read the record with `id`, if there is one.
    pub async fn get<R: Record>(
        &self,
        spreadsheet_id: &str,
        id: &str,
    ) -> Result<Option<R>, Error> {
        log::trace!("Store::get::<{}>( {:?}, {:?} ) called.", R::KIND, spreadsheet_id, id);

        let records: Vec<R> = self.list(spreadsheet_id).await?;
        Ok(records.into_iter().find(|r| r.id() == id))
    }

    /// Append `rec` under a freshly generated id, which is written back into `rec`.
    pub async fn insert<R: Record>(
        &self,
        spreadsheet_id: &str,
        rec: &mut R,
    ) -> Result<(), Error> {
        log::trace!("Store::insert::<{}>( {:?}, ... ) called.", R::KIND, spreadsheet_id);

        rec.set_id(record::generate_id());

        let _guard = self.locks.lock(spreadsheet_id, R::TAB).await;
        self.provision_tab(spreadsheet_id, R::TAB, R::header_row()).await?;
        self.append_rows(spreadsheet_id, &R::table_range(), vec![rec.to_row()]).await?;

        log::debug!("Inserted {} {:?} into {:?}.", R::KIND, rec.id(), spreadsheet_id);
        Ok(())
    }

    /// Insert several records with one append. Each gets a fresh id.
    pub async fn insert_many<R: Record>(
        &self,
        spreadsheet_id: &str,
        recs: &mut [R],
    ) -> Result<usize, Error> {
        log::trace!(
            "Store::insert_many::<{}>( {:?}, [ {} records ] ) called.",
            R::KIND, spreadsheet_id, recs.len()
        );
        if recs.is_empty() {
            return Ok(0);
        }

        for rec in recs.iter_mut() {
            rec.set_id(record::generate_id());
        }
        let rows: Rows = recs.iter().map(|r| r.to_row()).collect();

        let _guard = self.locks.lock(spreadsheet_id, R::TAB).await;
        self.provision_tab(spreadsheet_id, R::TAB, R::header_row()).await?;
        self.append_rows(spreadsheet_id, &R::table_range(), rows).await?;

        Ok(recs.len())
    }

    /// Overwrite the row carrying `rec`'s id.
    pub async fn update<R: Record>(
        &self,
        spreadsheet_id: &str,
        rec: &R,
    ) -> Result<(), Error> {
        log::trace!(
            "Store::update::<{}>( {:?}, {:?} ) called.",
            R::KIND, spreadsheet_id, rec.id()
        );

        let _guard = self.locks.lock(spreadsheet_id, R::TAB).await;
        self.provision_tab(spreadsheet_id, R::TAB, R::header_row()).await?;
        let row = match self.find_row_index(spreadsheet_id, R::TAB, rec.id()).await? {
            Some(n) => n,
            None => { return Err(Error::not_found(R::KIND, rec.id())); },
        };
        self.update_row(spreadsheet_id, &R::row_range(row), rec.to_row()).await
    }

    pub async fn delete<R: Record>(
        &self,
        spreadsheet_id: &str,
        id: &str,
    ) -> Result<(), Error> {
        log::trace!("Store::delete::<{}>( {:?}, {:?} ) called.", R::KIND, spreadsheet_id, id);

        let _guard = self.locks.lock(spreadsheet_id, R::TAB).await;
        self.provision_tab(spreadsheet_id, R::TAB, R::header_row()).await?;
        let row = match self.find_row_index(spreadsheet_id, R::TAB, id).await? {
            Some(n) => n,
            None => { return Err(Error::not_found(R::KIND, id)); },
        };
        self.delete_row(spreadsheet_id, R::TAB, row).await?;

        log::debug!("Deleted {} {:?} (row {}) from {:?}.", R::KIND, id, row, spreadsheet_id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::group::{Group, ScheduleType};
    use crate::sheets::{MemorySheets, SheetsError, SpreadsheetMeta};
    use crate::tests::ensure_logging;

    pub static REGISTRY: &str = "reg-1";

    pub fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    pub fn test_store() -> Store<MemorySheets> {
        ensure_logging();
        let sheets = MemorySheets::new().with_spreadsheet(REGISTRY, "School REG");
        Store::new(Arc::new(sheets))
    }

    #[tokio::test]
    async fn find_row_index_counts_from_row_two() {
        let store = test_store();
        store.sheets().set_rows(REGISTRY, "Groups", vec![
            strings(&["id", "name"]),
            strings(&["a"]),
            strings(&["b"]),
            strings(&["c"]),
        ]);

        assert_eq!(store.find_row_index(REGISTRY, "Groups", "a").await.unwrap(), Some(2));
        assert_eq!(store.find_row_index(REGISTRY, "Groups", "b").await.unwrap(), Some(3));
        assert_eq!(store.find_row_index(REGISTRY, "Groups", "z").await.unwrap(), None);
        // The header cell is not a data row.
        assert_eq!(store.find_row_index(REGISTRY, "Groups", "id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ensure_tab_creates_once() {
        let store = test_store();
        let header = strings(&["id", "name", "parentId"]);

        assert!(store.ensure_tab(REGISTRY, "TimeSlots", &header).await.unwrap());
        let n = store.sheets().tab_count(REGISTRY);
        assert!(!store.ensure_tab(REGISTRY, "TimeSlots", &header).await.unwrap());
        assert_eq!(store.sheets().tab_count(REGISTRY), n);
        assert_eq!(store.sheets().rows(REGISTRY, "TimeSlots").unwrap(), vec![header]);
    }

    #[tokio::test]
    async fn insert_update_delete() {
        let store = test_store();

        let mut g = Group {
            name: "Algebra I".to_owned(),
            ..Group::default()
        };
        store.insert(REGISTRY, &mut g).await.unwrap();
        assert!(!g.id.is_empty());

        let mut other = Group { name: "Chem".to_owned(), ..Group::default() };
        store.insert(REGISTRY, &mut other).await.unwrap();

        g.schedule_type = ScheduleType::Daily;
        store.update(REGISTRY, &g).await.unwrap();

        let groups: Vec<Group> = store.list(REGISTRY).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], g);

        store.delete::<Group>(REGISTRY, &g.id).await.unwrap();
        let groups: Vec<Group> = store.list(REGISTRY).await.unwrap();
        assert_eq!(groups, vec![other]);

        match store.delete::<Group>(REGISTRY, &g.id).await {
            Err(Error::NotFound(_)) => {},
            x => panic!("expected NotFound, got {:?}", x),
        }
        match store.update(REGISTRY, &g).await {
            Err(Error::NotFound(_)) => {},
            x => panic!("expected NotFound, got {:?}", x),
        }
    }

    #[tokio::test]
    async fn delete_row_targets_only_its_tab() {
        let store = test_store();
        store.sheets().set_rows(REGISTRY, "Groups", vec![
            strings(&["id"]), strings(&["a"]), strings(&["b"]),
        ]);
        store.sheets().set_rows(REGISTRY, "Other", vec![strings(&["x"])]);

        store.delete_row(REGISTRY, "Groups", 2).await.unwrap();
        assert_eq!(
            store.sheets().rows(REGISTRY, "Groups").unwrap(),
            vec![strings(&["id"]), strings(&["b"])]
        );
        assert_eq!(store.sheets().rows(REGISTRY, "Other").unwrap(), vec![strings(&["x"])]);
    }

    #[tokio::test]
    async fn upstream_failures_carry_message() {
        let store = test_store();
        store.sheets().fail_spreadsheet(REGISTRY, "The caller does not have permission");
        match store.list::<Group>(REGISTRY).await {
            Err(Error::Upstream(msg)) => {
                assert!(msg.contains("The caller does not have permission"), "{}", msg);
            },
            x => panic!("expected Upstream, got {:?}", x),
        }
    }

    #[tokio::test]
    async fn tab_locks_are_released() {
        let store = test_store();
        {
            let _guard = store.locks.lock(REGISTRY, "Groups").await;
            assert_eq!(store.locks.len(), 1);
        }
        assert_eq!(store.locks.len(), 0);

        for n in 0..500 {
            let bogus = format!("no-such-spreadsheet-{}", n);
            assert!(store.delete::<Group>(&bogus, "g1").await.is_err());
        }
        let mut g = Group { name: "Chem".to_owned(), ..Group::default() };
        store.insert(REGISTRY, &mut g).await.unwrap();
        store.delete::<Group>(REGISTRY, &g.id).await.unwrap();
        assert_eq!(store.locks.len(), 0);
    }

    /// Hands control back to the scheduler after every call, so concurrent
    /// store operations interleave between reading row positions and
    /// acting on them.
    struct Yielding(MemorySheets);

    async fn pause() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    impl Sheets for Yielding {
        async fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
            let meta = self.0.metadata(spreadsheet_id).await;
            pause().await;
            meta
        }

        async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Rows, SheetsError> {
            let rows = self.0.get_values(spreadsheet_id, range).await;
            pause().await;
            rows
        }

        async fn batch_get_values(
            &self,
            spreadsheet_id: &str,
            ranges: &[String],
        ) -> Result<Vec<Rows>, SheetsError> {
            let rows = self.0.batch_get_values(spreadsheet_id, ranges).await;
            pause().await;
            rows
        }

        async fn update_values(
            &self,
            spreadsheet_id: &str,
            range: &str,
            rows: Rows,
        ) -> Result<(), SheetsError> {
            pause().await;
            self.0.update_values(spreadsheet_id, range, rows).await
        }

        async fn append_values(
            &self,
            spreadsheet_id: &str,
            range: &str,
            rows: Rows,
        ) -> Result<(), SheetsError> {
            pause().await;
            self.0.append_values(spreadsheet_id, range, rows).await
        }

        async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<i64, SheetsError> {
            pause().await;
            self.0.add_tab(spreadsheet_id, title).await
        }

        async fn delete_rows(
            &self,
            spreadsheet_id: &str,
            sheet_id: i64,
            start: u32,
            end: u32,
        ) -> Result<(), SheetsError> {
            pause().await;
            self.0.delete_rows(spreadsheet_id, sheet_id, start, end).await
        }
    }

    #[tokio::test]
    async fn concurrent_mutations_hit_the_right_rows() {
        ensure_logging();
        let sheets = MemorySheets::new().with_spreadsheet(REGISTRY, "School REG");
        sheets.set_rows(REGISTRY, "Groups", vec![
            Group::header_row(),
            strings(&["a", "Art"]),
            strings(&["b", "Bio"]),
            strings(&["c", "Chem"]),
            strings(&["d", "Drama"]),
        ]);
        let store = Store::new(Arc::new(Yielding(sheets)));

        let drama = Group { id: "d".to_owned(), name: "Dance".to_owned(), ..Group::default() };
        let (del_a, del_c, upd_d) = tokio::join!(
            store.delete::<Group>(REGISTRY, "a"),
            store.delete::<Group>(REGISTRY, "c"),
            store.update(REGISTRY, &drama),
        );
        del_a.unwrap();
        del_c.unwrap();
        upd_d.unwrap();

        let left: Vec<(String, String)> = store.list::<Group>(REGISTRY).await.unwrap()
            .into_iter()
            .map(|g| (g.id, g.name))
            .collect();
        assert_eq!(left, vec![
            ("b".to_owned(), "Bio".to_owned()),
            ("d".to_owned(), "Dance".to_owned()),
        ]);
        assert_eq!(store.locks.len(), 0);
    }
}
