//! In-process pessimistic record locks.
//!
//! # Invariants
//! - A record has at most one exclusive owner, and never an exclusive owner
//!   together with a shared owner from another session.
//! - Locks are held until the owning session commits, rolls back or drops.
//! - Plain reads never consult the lock table.

use super::database::duration_ms;
use super::Session;
use crate::error::{ContentionTarget, PersistenceError, PersistenceResult};
use crate::model::{Entity, EntityId, RecordKey};
use crate::query::{sql, Query};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Pessimistic lock modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared: other readers may hold it too; writers wait.
    PessimisticRead,
    /// Exclusive: every other locker waits.
    PessimisticWrite,
}

impl LockMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::PessimisticRead => "read",
            Self::PessimisticWrite => "write",
        }
    }
}

#[derive(Debug, Default)]
struct LockEntry {
    exclusive: Option<Uuid>,
    shared: BTreeSet<Uuid>,
}

impl LockEntry {
    fn grantable(&self, owner: Uuid, mode: LockMode) -> bool {
        let exclusive_free = self.exclusive.map_or(true, |holder| holder == owner);
        match mode {
            LockMode::PessimisticRead => exclusive_free,
            LockMode::PessimisticWrite => {
                exclusive_free && self.shared.iter().all(|holder| *holder == owner)
            }
        }
    }

    fn grant(&mut self, owner: Uuid, mode: LockMode) {
        match mode {
            LockMode::PessimisticRead => {
                if self.exclusive != Some(owner) {
                    self.shared.insert(owner);
                }
            }
            LockMode::PessimisticWrite => {
                self.shared.remove(&owner);
                self.exclusive = Some(owner);
            }
        }
    }

    fn release(&mut self, owner: Uuid) {
        if self.exclusive == Some(owner) {
            self.exclusive = None;
        }
        self.shared.remove(&owner);
    }

    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

/// Lock table shared by all sessions of one `Database`.
#[derive(Debug, Default)]
pub(crate) struct LockManager {
    entries: Mutex<HashMap<RecordKey, LockEntry>>,
    released: Condvar,
}

impl LockManager {
    /// Blocks until the lock is granted or `timeout` elapses.
    pub fn acquire(
        &self,
        owner: Uuid,
        key: RecordKey,
        mode: LockMode,
        timeout: Duration,
    ) -> PersistenceResult<()> {
        let started_at = Instant::now();
        let deadline = started_at + timeout;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let entry = entries.entry(key).or_default();
            if entry.grantable(owner, mode) {
                entry.grant(owner, mode);
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if entry.is_free() {
                    entries.remove(&key);
                }
                return Err(PersistenceError::ContentionTimeout {
                    target: ContentionTarget::Record(key),
                    waited_ms: duration_ms(started_at),
                });
            }
            entries = self
                .released
                .wait_timeout(entries, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Drops every lock held by `owner` and wakes waiters.
    pub fn release_all(&self, owner: Uuid) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut released = 0;
        entries.retain(|_, entry| {
            if entry.exclusive == Some(owner) || entry.shared.contains(&owner) {
                released += 1;
                entry.release(owner);
            }
            !entry.is_free()
        });
        drop(entries);
        if released > 0 {
            self.released.notify_all();
        }
        released
    }
}

impl Session<'_> {
    /// Locks the record, then reads its current committed state.
    ///
    /// Pending writes are flushed first; the tracked copy is replaced by the
    /// fresh row.
    pub fn find_with_lock<E: Entity>(
        &mut self,
        id: EntityId,
        mode: LockMode,
    ) -> PersistenceResult<Option<E>> {
        let key = RecordKey::new(E::KIND, id);
        self.lock(key, mode)?;
        self.flush()?;
        if self.context.is_pending_delete(key) {
            return Ok(None);
        }
        self.load::<E>(id)
    }

    /// Locks every record matching the query's filter in primary key order,
    /// then reads them.
    pub fn find_all_with_lock<E: Entity>(
        &mut self,
        query: &Query<E::Field>,
        mode: LockMode,
    ) -> PersistenceResult<Vec<E>> {
        self.flush()?;
        let statement = sql::ids(&sql::Source::of::<E>(), query.criteria())?;
        let ids: Vec<EntityId> = self.query_rows(&statement, |row| Ok(row.get(0)?))?;
        for id in &ids {
            self.lock(RecordKey::new(E::KIND, *id), mode)?;
        }
        self.find_all::<E>(query)
    }

    pub(crate) fn lock(&mut self, key: RecordKey, mode: LockMode) -> PersistenceResult<()> {
        let timeout = self.db.config().lock_timeout();
        match self.db.locks.acquire(self.tx_id, key, mode, timeout) {
            Ok(()) => {
                debug!(
                    "event=lock_acquire module=session status=ok tx_id={} record={} mode={}",
                    self.tx_id,
                    key,
                    mode.as_str()
                );
                Ok(())
            }
            Err(err) => {
                info!(
                    "event=lock_acquire module=session status=timeout tx_id={} record={} mode={}",
                    self.tx_id,
                    key,
                    mode.as_str()
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LockManager, LockMode};
    use crate::error::{ContentionTarget, PersistenceError};
    use crate::model::{EntityKind, RecordKey};
    use std::time::Duration;
    use uuid::Uuid;

    const SHORT: Duration = Duration::from_millis(20);

    fn key(id: i64) -> RecordKey {
        RecordKey::new(EntityKind::Member, id)
    }

    #[test]
    fn shared_locks_coexist() {
        let locks = LockManager::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        locks.acquire(a, key(1), LockMode::PessimisticRead, SHORT).unwrap();
        locks.acquire(b, key(1), LockMode::PessimisticRead, SHORT).unwrap();
    }

    #[test]
    fn exclusive_lock_times_out_other_owner() {
        let locks = LockManager::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        locks.acquire(a, key(1), LockMode::PessimisticWrite, SHORT).unwrap();

        let err = locks
            .acquire(b, key(1), LockMode::PessimisticRead, SHORT)
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::ContentionTimeout {
                target: ContentionTarget::Record(record),
                ..
            } if record == key(1)
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn owner_may_upgrade_and_reenter() {
        let locks = LockManager::default();
        let a = Uuid::new_v4();
        locks.acquire(a, key(1), LockMode::PessimisticRead, SHORT).unwrap();
        locks.acquire(a, key(1), LockMode::PessimisticWrite, SHORT).unwrap();
        locks.acquire(a, key(1), LockMode::PessimisticWrite, SHORT).unwrap();
    }

    #[test]
    fn release_lets_waiters_in() {
        let locks = LockManager::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        locks.acquire(a, key(1), LockMode::PessimisticWrite, SHORT).unwrap();
        locks.acquire(a, key(2), LockMode::PessimisticRead, SHORT).unwrap();

        assert_eq!(locks.release_all(a), 2);
        locks.acquire(b, key(1), LockMode::PessimisticWrite, SHORT).unwrap();
        locks.acquire(b, key(2), LockMode::PessimisticWrite, SHORT).unwrap();
    }

    #[test]
    fn waiter_is_granted_after_release_from_other_thread() {
        let locks = LockManager::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        locks.acquire(a, key(1), LockMode::PessimisticWrite, SHORT).unwrap();

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                locks.acquire(b, key(1), LockMode::PessimisticWrite, Duration::from_secs(5))
            });
            std::thread::sleep(Duration::from_millis(50));
            locks.release_all(a);
            waiter.join().unwrap().unwrap();
        });
    }
}
