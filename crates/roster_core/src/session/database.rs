//! Database handle and per-session connection checkout.
//!
//! # Invariants
//! - File databases are migrated once at open; sessions reuse idle
//!   connections or open new ones.
//! - An in-memory database owns a single connection that is lent to one
//!   session at a time.
//! - A connection returned with an open transaction is rolled back first.

use super::lock::LockManager;
use super::Session;
use crate::config::PersistenceConfig;
use crate::db::{open_db, open_db_in_memory, open_session_connection};
use crate::error::{ContentionTarget, PersistenceError, PersistenceResult};
use crate::model::audit::{AuditStamp, AuditorAware, Clock, StaticAuditor, SystemClock};
use log::{info, warn};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

enum ConnectionSource {
    File {
        path: PathBuf,
        idle: Mutex<Vec<Connection>>,
    },
    Memory {
        slot: Mutex<Option<Connection>>,
        returned: Condvar,
    },
}

/// Shared entry point for units of work against one store.
pub struct Database {
    source: ConnectionSource,
    config: PersistenceConfig,
    clock: Arc<dyn Clock>,
    auditor: Arc<dyn AuditorAware>,
    pub(crate) locks: LockManager,
}

impl Database {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>, config: PersistenceConfig) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path, config.lock_timeout())?;
        Ok(Self::with_source(
            ConnectionSource::File {
                path,
                idle: Mutex::new(vec![conn]),
            },
            config,
        ))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(config: PersistenceConfig) -> PersistenceResult<Self> {
        let conn = open_db_in_memory(config.lock_timeout())?;
        Ok(Self::with_source(
            ConnectionSource::Memory {
                slot: Mutex::new(Some(conn)),
                returned: Condvar::new(),
            },
            config,
        ))
    }

    fn with_source(source: ConnectionSource, config: PersistenceConfig) -> Self {
        Self {
            source,
            config,
            clock: Arc::new(SystemClock),
            auditor: Arc::new(StaticAuditor::default()),
            locks: LockManager::default(),
        }
    }

    /// Replaces the audit clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the source of `created_by` / `updated_by`.
    pub fn with_auditor(mut self, auditor: impl AuditorAware + 'static) -> Self {
        self.auditor = Arc::new(auditor);
        self
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Starts a unit of work.
    pub fn begin(&self) -> PersistenceResult<Session<'_>> {
        let conn = self.checkout()?;
        Session::start(self, conn)
    }

    /// Runs `work` in its own session: commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T, F>(&self, work: F) -> PersistenceResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> PersistenceResult<T>,
    {
        let mut session = self.begin()?;
        match work(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    warn!(
                        "event=tx_rollback module=session status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    pub(crate) fn stamp(&self) -> AuditStamp {
        AuditStamp {
            at_ms: self.clock.now_ms(),
            actor: self.auditor.current_auditor(),
        }
    }

    fn checkout(&self) -> PersistenceResult<PooledConnection<'_>> {
        let conn = match &self.source {
            ConnectionSource::File { path, idle } => {
                let reused = idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
                match reused {
                    Some(conn) => conn,
                    None => open_session_connection(path, self.config.lock_timeout())?,
                }
            }
            ConnectionSource::Memory { slot, returned } => {
                let started_at = Instant::now();
                let deadline = started_at + self.config.lock_timeout();
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if let Some(conn) = slot.take() {
                        break conn;
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        info!(
                            "event=db_checkout module=session status=timeout waited_ms={}",
                            started_at.elapsed().as_millis()
                        );
                        return Err(PersistenceError::ContentionTimeout {
                            target: ContentionTarget::Database,
                            waited_ms: duration_ms(started_at),
                        });
                    }
                    slot = returned
                        .wait_timeout(slot, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        };
        Ok(PooledConnection {
            db: self,
            conn: Some(conn),
        })
    }

    fn checkin(&self, conn: Connection) {
        match &self.source {
            ConnectionSource::File { idle, .. } => {
                idle.lock().unwrap_or_else(PoisonError::into_inner).push(conn);
            }
            ConnectionSource::Memory { slot, returned } => {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(conn);
                returned.notify_one();
            }
        }
    }
}

pub(crate) fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// A connection lent to one session; returned to the database on drop.
pub(crate) struct PooledConnection<'db> {
    db: &'db Database,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !conn.is_autocommit() {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                warn!(
                    "event=db_checkin module=session status=error error_code=rollback_failed error={}",
                    err
                );
            }
        }
        self.db.checkin(conn);
    }
}
