//! Units of work over the entity store.
//!
//! # Responsibility
//! - Own one transaction, its connection, identity map and write buffer.
//! - Stamp audit fields and apply buffered writes on flush.
//!
//! # Invariants
//! - Inserts run immediately so the store assigns identities; updates and
//!   deletes are buffered until `flush`.
//! - Every read path flushes first, so reads observe this session's writes.
//! - Nothing is visible to other sessions before `commit`.
//! - A session that is dropped without `commit` rolls back and releases its
//!   locks.

mod context;
mod database;
pub(crate) mod lock;

pub use context::{PersistenceContext, SessionStats};
pub use database::Database;
pub use lock::LockMode;

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, PersistenceResult, ValidationError};
use crate::model::audit::AuditStamp;
use crate::model::member::Member;
use crate::model::team::Team;
use crate::model::{Entity, EntityId, EntityKind, RecordKey};
use crate::query::sql::Statement;
use context::{PendingWrite, WriteOp};
use database::{duration_ms, PooledConnection};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use std::time::Instant;
use uuid::Uuid;

/// One transaction against a [`Database`].
pub struct Session<'db> {
    db: &'db Database,
    conn: PooledConnection<'db>,
    tx_id: Uuid,
    context: PersistenceContext,
    stats: SessionStats,
    started_at: Instant,
    active: bool,
}

impl<'db> Session<'db> {
    fn start(db: &'db Database, conn: PooledConnection<'db>) -> PersistenceResult<Self> {
        conn.execute_batch("BEGIN DEFERRED")?;
        let tx_id = Uuid::new_v4();
        debug!("event=tx_begin module=session status=ok tx_id={tx_id}");
        Ok(Self {
            db,
            conn,
            tx_id,
            context: PersistenceContext::default(),
            stats: SessionStats::default(),
            started_at: Instant::now(),
            active: true,
        })
    }

    /// Identity used for lock ownership and diagnostics.
    pub fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    pub fn is_tracked<E: Entity>(&self, id: EntityId) -> bool {
        E::tracked_ref(&self.context).contains_key(&id)
    }

    /// Makes `entity` persistent and returns the stored copy.
    ///
    /// Without an id the store assigns one. With an id already tracked in
    /// this session the values are merged into the tracked copy; with an id
    /// that exists in the store the call fails with `DuplicateIdentity`.
    pub fn persist<E: Entity>(&mut self, entity: E) -> PersistenceResult<E> {
        entity.validate()?;
        self.check_references(&entity.references())?;

        if let Some(id) = entity.id() {
            let key = RecordKey::new(E::KIND, id);
            if let Some(tracked) = E::tracked(&mut self.context).get_mut(&id) {
                tracked.merge_from(entity);
                let merged = tracked.clone();
                self.context.push_update(key);
                return Ok(merged);
            }
            if self.context.is_pending_delete(key) {
                self.flush()?;
            }
            if self.store_contains(key)? {
                return Err(PersistenceError::DuplicateIdentity {
                    kind: E::KIND,
                    id,
                });
            }
        }

        let mut entity = entity;
        entity.on_persist(&self.db.stamp());
        let mut columns = entity.insert_columns();
        if let Some(id) = entity.id() {
            columns.insert(0, (E::KIND.id_column(), Value::Integer(id)));
        }
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::KIND.table(),
            names.join(", "),
            vec!["?"; names.len()].join(", ")
        );
        self.execute(&sql, columns.into_iter().map(|(_, value)| value))?;

        let id = match entity.id() {
            Some(id) => id,
            None => self.conn.last_insert_rowid(),
        };
        entity.assign_id(id);
        let key = RecordKey::new(E::KIND, id);
        self.lock(key, LockMode::PessimisticWrite)?;
        debug!(
            "event=entity_persist module=session status=ok tx_id={} record={}",
            self.tx_id, key
        );
        Ok(self.register(entity))
    }

    /// Looks the record up in the session cache, then in the store.
    pub fn find<E: Entity>(&mut self, id: EntityId) -> PersistenceResult<Option<E>> {
        if self.context.is_pending_delete(RecordKey::new(E::KIND, id)) {
            return Ok(None);
        }
        if let Some(tracked) = E::tracked_ref(&self.context).get(&id) {
            return Ok(Some(tracked.clone()));
        }
        self.load(id)
    }

    /// Like [`Session::find`], failing with `NotFound` when absent.
    pub fn get<E: Entity>(&mut self, id: EntityId) -> PersistenceResult<E> {
        self.find(id)?
            .ok_or_else(|| PersistenceError::not_found(RecordKey::new(E::KIND, id)))
    }

    /// Applies `mutator` to the tracked copy and buffers the write.
    ///
    /// The mutated value is validated before it replaces the tracked copy;
    /// on error the session is unchanged.
    pub fn update<E, F>(&mut self, id: EntityId, mutator: F) -> PersistenceResult<E>
    where
        E: Entity,
        F: FnOnce(&mut E),
    {
        let mut changed = self.get::<E>(id)?;
        mutator(&mut changed);
        match changed.id() {
            Some(to) if to != id => {
                return Err(ValidationError::IdentityChanged {
                    kind: E::KIND,
                    from: id,
                    to,
                }
                .into());
            }
            Some(_) => {}
            // The mutator replaced the whole value; identity stays with the record.
            None => changed.assign_id(id),
        }
        changed.validate()?;
        self.check_references(&changed.references())?;

        E::tracked(&mut self.context).insert(id, changed.clone().into_tracked());
        self.context.push_update(RecordKey::new(E::KIND, id));
        Ok(changed)
    }

    /// Buffers the deletion of a record.
    ///
    /// Rejected while other rows still reference it; nothing cascades.
    pub fn remove<E: Entity>(&mut self, id: EntityId) -> PersistenceResult<()> {
        let key = RecordKey::new(E::KIND, id);
        if !self.store_contains(key)? {
            return Err(PersistenceError::not_found(key));
        }
        for &(referrer, column) in E::REFERENCED_BY {
            self.flush()?;
            let count = self.count_rows(referrer, column, id)?;
            if count > 0 {
                return Err(ValidationError::StillReferenced {
                    kind: E::KIND,
                    id,
                    referrer,
                    count,
                }
                .into());
            }
        }
        E::tracked(&mut self.context).remove(&id);
        self.context.push_delete(key);
        Ok(())
    }

    /// Applies buffered writes inside the open transaction.
    ///
    /// Writes that were not applied stay buffered when an error is returned.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.context.pending_count() == 0 {
            return Ok(());
        }
        let started_at = Instant::now();
        let stamp = self.db.stamp();
        let mut writes = self.context.take_pending().into_iter();
        let mut applied = 0usize;
        while let Some(write) = writes.next() {
            if let Err(err) = self.apply_write(write, &stamp) {
                let mut remaining = vec![write];
                remaining.extend(writes);
                self.context.restore_pending(remaining);
                error!(
                    "event=session_flush module=session status=error tx_id={} record={} applied={} duration_ms={} error={}",
                    self.tx_id,
                    write.key,
                    applied,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
            applied += 1;
        }
        self.stats.flushes += 1;
        debug!(
            "event=session_flush module=session status=ok tx_id={} writes={} duration_ms={}",
            self.tx_id,
            applied,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Detaches every tracked entity and drops unflushed writes.
    pub fn clear(&mut self) {
        let discarded = self.context.clear();
        if discarded > 0 {
            warn!(
                "event=session_clear module=session status=ok tx_id={} discarded_writes={}",
                self.tx_id, discarded
            );
        }
    }

    /// Flushes and commits; locks are released afterwards.
    pub fn commit(mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.conn.execute_batch("COMMIT")?;
        self.finish("commit");
        Ok(())
    }

    /// Discards every write of this session.
    pub fn rollback(mut self) -> PersistenceResult<()> {
        let result = self.conn.execute_batch("ROLLBACK");
        self.finish("rollback");
        result.map_err(Into::into)
    }

    fn finish(&mut self, outcome: &str) {
        self.active = false;
        let released = self.db.locks.release_all(self.tx_id);
        info!(
            "event=tx_end module=session status=ok outcome={} tx_id={} statements={} locks_released={} duration_ms={}",
            outcome,
            self.tx_id,
            self.stats.statements,
            released,
            duration_ms(self.started_at)
        );
    }

    fn apply_write(&mut self, write: PendingWrite, stamp: &AuditStamp) -> PersistenceResult<()> {
        self.lock(write.key, LockMode::PessimisticWrite)?;
        match (write.op, write.key.kind) {
            (WriteOp::Update, EntityKind::Member) => self.apply_update::<Member>(write.key.id, stamp),
            (WriteOp::Update, EntityKind::Team) => self.apply_update::<Team>(write.key.id, stamp),
            (WriteOp::Delete, kind) => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?",
                    kind.table(),
                    kind.id_column()
                );
                self.execute(&sql, [Value::Integer(write.key.id)])?;
                Ok(())
            }
        }
    }

    fn apply_update<E: Entity>(&mut self, id: EntityId, stamp: &AuditStamp) -> PersistenceResult<()> {
        let Some(entity) = E::tracked(&mut self.context).get_mut(&id) else {
            return Ok(());
        };
        entity.on_update(stamp);
        let columns = entity.update_columns();
        let assignments: Vec<String> = columns
            .iter()
            .map(|(name, _)| format!("{name} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            E::KIND.table(),
            assignments.join(", "),
            E::KIND.id_column()
        );
        let bind_values = columns
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(id)));
        if self.execute(&sql, bind_values)? == 0 {
            return Err(PersistenceError::not_found(RecordKey::new(E::KIND, id)));
        }
        Ok(())
    }

    fn check_references(&mut self, keys: &[RecordKey]) -> PersistenceResult<()> {
        for key in keys {
            if !self.store_contains(*key)? {
                return Err(PersistenceError::not_found(*key));
            }
        }
        Ok(())
    }

    /// Whether the record exists as seen from this session.
    fn store_contains(&mut self, key: RecordKey) -> PersistenceResult<bool> {
        if self.context.is_pending_delete(key) {
            return Ok(false);
        }
        let tracked = match key.kind {
            EntityKind::Member => self.context.members.contains_key(&key.id),
            EntityKind::Team => self.context.teams.contains_key(&key.id),
        };
        if tracked {
            return Ok(true);
        }
        let statement = Statement {
            sql: format!(
                "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
                key.kind.table(),
                key.kind.id_column()
            ),
            bind_values: vec![Value::Integer(key.id)],
        };
        Ok(!self.query_rows(&statement, |_| Ok(()))?.is_empty())
    }

    fn count_rows(&mut self, table: &str, column: &str, id: EntityId) -> PersistenceResult<u64> {
        let statement = Statement {
            sql: format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?"),
            bind_values: vec![Value::Integer(id)],
        };
        self.query_count(&statement)
    }

    /// Reads one record by id from the store and tracks it.
    pub(crate) fn load<E: Entity>(&mut self, id: EntityId) -> PersistenceResult<Option<E>> {
        let statement = Statement {
            sql: format!(
                "SELECT {} FROM {} e WHERE e.{} = ?",
                E::SELECT_LIST,
                E::KIND.table(),
                E::KIND.id_column()
            ),
            bind_values: vec![Value::Integer(id)],
        };
        self.stats.entity_fetches += 1;
        let found = self
            .query_rows(&statement, |row| E::from_row(row))?
            .into_iter()
            .next();
        Ok(found.map(|entity| self.register(entity)))
    }

    /// Makes `entity` the tracked copy of its identity.
    pub(crate) fn register<E: Entity>(&mut self, entity: E) -> E {
        if let Some(id) = entity.id() {
            E::tracked(&mut self.context).insert(id, entity.clone().into_tracked());
        }
        entity
    }

    pub(crate) fn evict(&mut self, key: RecordKey) {
        self.context.evict(key);
    }

    pub(crate) fn config(&self) -> &PersistenceConfig {
        self.db.config()
    }

    pub(crate) fn query_rows<T>(
        &mut self,
        statement: &Statement,
        mut map: impl FnMut(&Row<'_>) -> PersistenceResult<T>,
    ) -> PersistenceResult<Vec<T>> {
        self.stats.statements += 1;
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let mut rows = stmt.query(params_from_iter(statement.bind_values.iter()))?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            mapped.push(map(row)?);
        }
        Ok(mapped)
    }

    pub(crate) fn query_count(&mut self, statement: &Statement) -> PersistenceResult<u64> {
        let counts: Vec<i64> = self.query_rows(statement, |row| Ok(row.get(0)?))?;
        let count = counts.first().copied().unwrap_or(0);
        u64::try_from(count)
            .map_err(|_| PersistenceError::InvalidData(format!("negative row count {count}")))
    }

    pub(crate) fn execute(
        &mut self,
        sql: &str,
        bind_values: impl IntoIterator<Item = Value>,
    ) -> PersistenceResult<usize> {
        self.stats.statements += 1;
        Ok(self.conn.execute(sql, params_from_iter(bind_values))?)
    }

    /// Prepares a caller-supplied statement; used by native queries.
    pub(crate) fn prepare_native(&self, sql: &str) -> PersistenceResult<rusqlite::Statement<'_>> {
        Ok(self.conn.prepare(sql)?)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!(
                "event=tx_end module=session status=error outcome=drop tx_id={} error={}",
                self.tx_id, err
            );
        }
        self.finish("drop");
    }
}
