//! Error taxonomy for the persistence core.
//!
//! # Invariants
//! - `NotFound` and `Validation` are surfaced directly and never retried.
//! - `ContentionTimeout` is the only retryable error; the core never retries
//!   on its own.

use crate::db::DbError;
use crate::model::{EntityId, EntityKind, RecordKey};
use rusqlite::ErrorCode;
use std::fmt::{Display, Formatter};

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors returned by sessions, repositories and services.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("{kind} identity already exists: {id}")]
    DuplicateIdentity { kind: EntityKind, id: EntityId },

    #[error("lock on {target} not obtained (waited {waited_ms}ms)")]
    ContentionTimeout {
        target: ContentionTarget,
        waited_ms: u64,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl PersistenceError {
    /// Whether the caller may retry the whole unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ContentionTimeout { .. })
    }

    pub(crate) fn not_found(key: RecordKey) -> Self {
        Self::NotFound {
            kind: key.kind,
            id: key.id,
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::ContentionTimeout {
                target: ContentionTarget::Database,
                waited_ms: 0,
            },
            Some(ErrorCode::ConstraintViolation) => {
                Self::Validation(ValidationError::Constraint(value.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// What a contended session was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionTarget {
    /// A row-level pessimistic lock.
    Record(RecordKey),
    /// The store itself: writer lock, stale snapshot or pooled connection.
    Database,
}

impl Display for ContentionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(key) => write!(f, "{key}"),
            Self::Database => f.write_str("database"),
        }
    }
}

/// Invariant violations detected before or while touching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("age must be non-negative, got {0}")]
    NegativeAge(i32),

    #[error("page size must be a positive integer")]
    ZeroPageSize,

    #[error("field `{field}` expects a {expected} value")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{0}` cannot be compared with null")]
    NullComparison(&'static str),

    #[error("field `{0}` is not updatable")]
    NotUpdatable(&'static str),

    #[error("{kind} identity cannot change from {from} to {to}")]
    IdentityChanged {
        kind: EntityKind,
        from: EntityId,
        to: EntityId,
    },

    #[error("{kind} {id} is still referenced by {count} row(s) in `{referrer}`")]
    StillReferenced {
        kind: EntityKind,
        id: EntityId,
        referrer: &'static str,
        count: u64,
    },

    #[error("native queries bind by position only, found named parameter `{0}`")]
    NamedParameter(String),

    #[error("statement expects {expected} parameter(s), got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("native page queries require a count query")]
    MissingCountQuery,

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("store constraint violated: {0}")]
    Constraint(String),
}
