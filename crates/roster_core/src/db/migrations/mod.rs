//! Schema versions of the roster store.
//!
//! # Invariants
//! - Versions are contiguous, starting at 1.
//! - `PRAGMA user_version` always equals the last applied version.
//! - Pending steps run in one immediate transaction; the version is
//!   re-read inside it so concurrent openers apply each step once.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "teams_members",
        sql: include_str!("0001_teams_members.sql"),
    },
    SchemaStep {
        version: 2,
        name: "member_indexes",
        sql: include_str!("0002_member_indexes.sql"),
    },
    SchemaStep {
        version: 3,
        name: "member_age_range",
        sql: include_str!("0003_member_age_range.sql"),
    },
];

/// Highest schema version this build can open.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the schema behind `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    if current_user_version(conn)? == latest_version() {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = current_user_version(&tx)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    for step in SCHEMA_STEPS.iter().filter(|step| step.version > from_version) {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    if from_version < latest {
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            from_version, latest
        );
    }
    Ok(())
}

/// Schema version recorded in the database header.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
