//! Team entity.

use super::{Entity, EntityId, EntityKind};
use crate::error::{PersistenceResult, ValidationError};
use crate::query::{EntityField, ValueKind};
use crate::session::PersistenceContext;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;
use std::collections::HashMap;

pub type TeamId = EntityId;

/// A named group of members. Membership lives on `Member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    id: Option<TeamId>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(mut self, id: TeamId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<TeamId> {
        self.id
    }

    /// Reads the team columns of a member row joined as `t_team_id` / `t_name`.
    pub(crate) fn from_joined_row(row: &Row<'_>) -> PersistenceResult<Option<Self>> {
        let id: Option<TeamId> = row.get("t_team_id")?;
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(Some(Self {
            id: Some(id),
            name: row.get("t_name")?,
        }))
    }
}

impl Entity for Team {
    const KIND: EntityKind = EntityKind::Team;
    const SELECT_LIST: &'static str = "e.team_id AS team_id, e.name AS name";
    const REFERENCED_BY: &'static [(&'static str, &'static str)] = &[("members", "team_id")];

    type Field = TeamField;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn merge_from(&mut self, other: Self) {
        self.name = other.name;
    }

    fn insert_columns(&self) -> Vec<(&'static str, Value)> {
        self.update_columns()
    }

    fn update_columns(&self) -> Vec<(&'static str, Value)> {
        vec![("name", Value::Text(self.name.clone()))]
    }

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Ok(Self {
            id: Some(row.get("team_id")?),
            name: row.get("name")?,
        })
    }

    fn tracked(context: &mut PersistenceContext) -> &mut HashMap<EntityId, Self> {
        &mut context.teams
    }

    fn tracked_ref(context: &PersistenceContext) -> &HashMap<EntityId, Self> {
        &context.teams
    }
}

/// Queryable team attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamField {
    Id,
    Name,
}

impl EntityField for TeamField {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "e.team_id",
            Self::Name => "e.name",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::Id => ValueKind::Integer,
            Self::Name => ValueKind::Text,
        }
    }

    fn nullable(self) -> bool {
        false
    }

    fn needs_team_join(self) -> bool {
        false
    }

    fn update_column(self) -> Option<&'static str> {
        match self {
            Self::Name => Some("name"),
            Self::Id => None,
        }
    }
}
