//! Query execution over a session.

use super::sql::{self, Source};
use super::{Assignment, Criteria, Page, PageRequest, Query, Window};
use crate::error::PersistenceResult;
use crate::model::{Entity, EntityId, RecordKey};
use crate::session::{LockMode, Session};
use log::info;
use std::time::Instant;

impl Session<'_> {
    /// All rows matching the query, honouring its window.
    ///
    /// Results are tracked unless the query is read-only.
    pub fn find_all<E: Entity>(&mut self, query: &Query<E::Field>) -> PersistenceResult<Vec<E>> {
        self.flush()?;
        let statement = sql::select(
            &Source::of::<E>(),
            E::SELECT_LIST,
            query.criteria(),
            query.sort(),
            query.row_window(),
        )?;
        let rows = self.query_rows(&statement, |row| E::from_row(row))?;
        Ok(self.track_all(rows, query.is_read_only()))
    }

    /// One page of the query's result plus totals from a separate count.
    ///
    /// The query's own window is ignored; `page` decides the slice.
    pub fn find_page<E: Entity>(
        &mut self,
        query: &Query<E::Field>,
        page: PageRequest,
    ) -> PersistenceResult<Page<E>> {
        let slice = page.resolve(self.config())?;
        let total = self.count::<E>(query.criteria())?;
        let statement = sql::select(
            &Source::of::<E>(),
            E::SELECT_LIST,
            query.criteria(),
            query.sort(),
            Window::Range {
                offset: slice.offset(),
                limit: Some(slice.size),
            },
        )?;
        let rows = self.query_rows(&statement, |row| E::from_row(row))?;
        let content = self.track_all(rows, query.is_read_only());
        Ok(slice.into_page(content, total))
    }

    pub fn count<E: Entity>(&mut self, criteria: &Criteria<E::Field>) -> PersistenceResult<u64> {
        self.flush()?;
        let statement = sql::count(&Source::of::<E>(), criteria)?;
        self.query_count(&statement)
    }

    /// Set-based update of every row matching `criteria`.
    ///
    /// Runs as one statement after locking the matching rows. Audit fields
    /// are not stamped. Affected rows are evicted from the session cache so
    /// later reads see the new values. Returns the number of changed rows.
    pub fn bulk_update<E: Entity>(
        &mut self,
        criteria: &Criteria<E::Field>,
        assignments: &[Assignment<E::Field>],
    ) -> PersistenceResult<u64> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let started_at = Instant::now();
        self.flush()?;
        let source = Source::of::<E>();
        let update = sql::bulk_update(&source, criteria, assignments)?;
        let matching = sql::ids(&source, criteria)?;

        let ids: Vec<EntityId> = self.query_rows(&matching, |row| Ok(row.get(0)?))?;
        for id in ids {
            self.lock(RecordKey::new(E::KIND, id), LockMode::PessimisticWrite)?;
        }
        let updated: Vec<EntityId> = self.query_rows(&update, |row| Ok(row.get(0)?))?;
        for id in &updated {
            self.evict(RecordKey::new(E::KIND, *id));
        }
        info!(
            "event=bulk_update module=query status=ok kind={} rows={} duration_ms={}",
            E::KIND,
            updated.len(),
            started_at.elapsed().as_millis()
        );
        Ok(updated.len() as u64)
    }

    fn track_all<E: Entity>(&mut self, rows: Vec<E>, read_only: bool) -> Vec<E> {
        if read_only {
            return rows;
        }
        rows.into_iter().map(|entity| self.register(entity)).collect()
    }
}
