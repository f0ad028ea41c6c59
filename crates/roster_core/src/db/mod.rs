//! Storage layer: connections and schema for the `teams`/`members` tables.
//!
//! # Invariants
//! - No entity table is touched before the schema reaches the latest version.
//! - File databases run in WAL mode; readers never block on the writer.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
pub(crate) use open::open_session_connection;

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema step {version} ({name}) failed: {source}")]
    Migration {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
