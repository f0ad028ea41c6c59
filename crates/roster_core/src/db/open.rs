//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - `open_db`/`open_db_in_memory` return connections with migrations applied.
//! - Session connections skip migrations; the owning `Database` ran them once.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    File,
    Memory,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens a SQLite database file, switches it to WAL and applies all pending
/// migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(OpenMode::File, busy_timeout, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// Every call creates a distinct database; it lives as long as the returned
/// connection.
pub fn open_db_in_memory(busy_timeout: Duration) -> DbResult<Connection> {
    open_with(OpenMode::Memory, busy_timeout, Connection::open_in_memory)
}

/// Opens one more connection to an already migrated database file.
pub(crate) fn open_session_connection(
    path: &Path,
    busy_timeout: Duration,
) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn, OpenMode::File, busy_timeout)?;
    Ok(conn)
}

fn open_with(
    mode: OpenMode,
    busy_timeout: Duration,
    opener: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={}", mode.as_str());

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let bootstrapped = configure_connection(&conn, mode, busy_timeout)
        .and_then(|()| apply_migrations(&mut conn));
    match bootstrapped {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(conn: &Connection, mode: OpenMode, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    if mode == OpenMode::File {
        // journal_mode reports the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    Ok(())
}
