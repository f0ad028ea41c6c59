//! Entity model for the roster store.
//!
//! # Responsibility
//! - Define the Member and Team records and their audit metadata.
//! - Describe, through [`Entity`], how each record maps to its table.
//!
//! # Invariants
//! - Every persisted record is identified by a store-assigned `EntityId`.
//! - Only `Member` stores the Member→Team edge; a Team's members are derived.

pub mod audit;
pub mod member;
pub mod team;

use crate::error::{PersistenceResult, ValidationError};
use crate::query::EntityField;
use crate::session::PersistenceContext;
use audit::AuditStamp;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};

/// Surrogate identity shared by all entity kinds.
pub type EntityId = i64;

/// Entity kinds known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Member,
    Team,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Team => "team",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Member => "members",
            Self::Team => "teams",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            Self::Member => "member_id",
            Self::Team => "team_id",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one stored row, used for caching, locking and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl RecordKey {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Table mapping and lifecycle hooks for one entity kind.
///
/// Queries alias the entity table as `e` and, where an entity has a team
/// reference, the joined team table as `t`.
pub trait Entity: Clone + Debug + Sized {
    const KIND: EntityKind;
    /// Select list over alias `e`, each column labelled with its table name.
    const SELECT_LIST: &'static str;
    /// Join target used when a query touches team columns.
    const TEAM_JOIN: Option<&'static str> = None;
    /// `(table, column)` pairs holding foreign keys to this entity.
    const REFERENCED_BY: &'static [(&'static str, &'static str)] = &[];

    type Field: EntityField;

    fn id(&self) -> Option<EntityId>;

    fn assign_id(&mut self, id: EntityId);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Rows that must exist before this record can be written.
    fn references(&self) -> Vec<RecordKey> {
        Vec::new()
    }

    /// Copies caller-owned attributes from `other`, keeping identity and audit.
    fn merge_from(&mut self, other: Self);

    /// Runs once before the first insert.
    fn on_persist(&mut self, _stamp: &AuditStamp) {}

    /// Runs before every flushed update.
    fn on_update(&mut self, _stamp: &AuditStamp) {}

    /// Normalises the copy kept in the session cache.
    fn into_tracked(self) -> Self {
        self
    }

    /// Non-key columns written by INSERT.
    fn insert_columns(&self) -> Vec<(&'static str, Value)>;

    /// Columns written by UPDATE; creation-only columns are excluded.
    fn update_columns(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self>;

    fn tracked(context: &mut PersistenceContext) -> &mut HashMap<EntityId, Self>;

    fn tracked_ref(context: &PersistenceContext) -> &HashMap<EntityId, Self>;

    fn key(&self) -> Option<RecordKey> {
        self.id().map(|id| RecordKey::new(Self::KIND, id))
    }
}
