//! Member entity and its reference to a team.
//!
//! # Invariants
//! - `age` is never negative.
//! - The team reference is only changed through [`Member::change_team`].

use super::audit::{Audit, AuditStamp};
use super::team::{Team, TeamId};
use super::{Entity, EntityId, EntityKind, RecordKey};
use crate::error::{PersistenceResult, ValidationError};
use crate::query::{EntityField, ValueKind};
use crate::session::PersistenceContext;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;
use std::collections::HashMap;

pub type MemberId = EntityId;

/// Member→Team edge as held by a member.
///
/// `Unresolved` carries only the id; the team row has not been read yet.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TeamRef {
    Unresolved { id: TeamId },
    Resolved { id: TeamId, team: Team },
}

impl TeamRef {
    pub fn id(&self) -> TeamId {
        match self {
            Self::Unresolved { id } | Self::Resolved { id, .. } => *id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Returns the loaded team, if any.
    pub fn team(&self) -> Option<&Team> {
        match self {
            Self::Resolved { team, .. } => Some(team),
            Self::Unresolved { .. } => None,
        }
    }
}

impl PartialEq for TeamRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TeamRef {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    id: Option<MemberId>,
    pub username: String,
    pub age: i32,
    team: Option<TeamRef>,
    audit: Option<Audit>,
}

impl Member {
    /// Creates a transient member without a team.
    pub fn new(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team: None,
            audit: None,
        }
    }

    /// Creates a transient member that belongs to `team_id`.
    pub fn with_team(username: impl Into<String>, age: i32, team_id: TeamId) -> Self {
        let mut member = Self::new(username, age);
        member.change_team(Some(team_id));
        member
    }

    /// Sets a caller-chosen identity before the first persist.
    pub fn with_id(mut self, id: MemberId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<MemberId> {
        self.id
    }

    pub fn team_id(&self) -> Option<TeamId> {
        self.team.as_ref().map(TeamRef::id)
    }

    pub fn team(&self) -> Option<&TeamRef> {
        self.team.as_ref()
    }

    /// `None` until the member has been persisted.
    pub fn audit(&self) -> Option<&Audit> {
        self.audit.as_ref()
    }

    /// Moves the member to another team, or out of any team.
    ///
    /// The only place the Member→Team edge is written; `Team` holds no
    /// member list to keep in sync.
    pub fn change_team(&mut self, team_id: Option<TeamId>) {
        if self.team_id() == team_id {
            return;
        }
        self.team = team_id.map(|id| TeamRef::Unresolved { id });
    }

    pub(crate) fn resolve_team(&mut self, team: Team) {
        if let Some(id) = team.id() {
            if self.team_id() == Some(id) {
                self.team = Some(TeamRef::Resolved { id, team });
            }
        }
    }

    pub(crate) fn from_parts(
        id: MemberId,
        username: String,
        age: i32,
        team_id: Option<TeamId>,
        audit: Audit,
    ) -> Self {
        Self {
            id: Some(id),
            username,
            age,
            team: team_id.map(|id| TeamRef::Unresolved { id }),
            audit: Some(audit),
        }
    }
}

impl Entity for Member {
    const KIND: EntityKind = EntityKind::Member;
    const SELECT_LIST: &'static str = "e.member_id AS member_id, e.username AS username, \
         e.age AS age, e.team_id AS team_id, e.created_at AS created_at, \
         e.created_by AS created_by, e.updated_at AS updated_at, e.updated_by AS updated_by";
    const TEAM_JOIN: Option<&'static str> = Some("teams t ON t.team_id = e.team_id");

    type Field = MemberField;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.age < 0 {
            return Err(ValidationError::NegativeAge(self.age));
        }
        Ok(())
    }

    fn references(&self) -> Vec<RecordKey> {
        self.team_id()
            .map(|id| RecordKey::new(EntityKind::Team, id))
            .into_iter()
            .collect()
    }

    fn merge_from(&mut self, other: Self) {
        let team_id = other.team_id();
        self.username = other.username;
        self.age = other.age;
        self.change_team(team_id);
    }

    fn on_persist(&mut self, stamp: &AuditStamp) {
        self.audit = Some(Audit::created(stamp));
    }

    fn on_update(&mut self, stamp: &AuditStamp) {
        match self.audit.as_mut() {
            Some(audit) => audit.touch(stamp),
            None => self.audit = Some(Audit::created(stamp)),
        }
    }

    fn into_tracked(mut self) -> Self {
        if let Some(id) = self.team_id() {
            self.team = Some(TeamRef::Unresolved { id });
        }
        self
    }

    fn insert_columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = self.update_columns();
        if let Some(audit) = self.audit.as_ref() {
            columns.push(("created_at", Value::Integer(audit.created_at)));
            columns.push(("created_by", Value::Text(audit.created_by.clone())));
        }
        columns
    }

    fn update_columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = vec![
            ("username", Value::Text(self.username.clone())),
            ("age", Value::Integer(i64::from(self.age))),
            ("team_id", self.team_id().map_or(Value::Null, Value::Integer)),
        ];
        if let Some(audit) = self.audit.as_ref() {
            columns.push(("updated_at", Value::Integer(audit.updated_at)));
            columns.push(("updated_by", Value::Text(audit.updated_by.clone())));
        }
        columns
    }

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Ok(Self::from_parts(
            row.get("member_id")?,
            row.get("username")?,
            row.get("age")?,
            row.get("team_id")?,
            Audit {
                created_at: row.get("created_at")?,
                created_by: row.get("created_by")?,
                updated_at: row.get("updated_at")?,
                updated_by: row.get("updated_by")?,
            },
        ))
    }

    fn tracked(context: &mut PersistenceContext) -> &mut HashMap<EntityId, Self> {
        &mut context.members
    }

    fn tracked_ref(context: &PersistenceContext) -> &HashMap<EntityId, Self> {
        &context.members
    }
}

/// Queryable member attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberField {
    Id,
    Username,
    Age,
    TeamId,
    /// Name of the referenced team; filtering on it joins `teams`.
    TeamName,
    CreatedAt,
    CreatedBy,
    UpdatedAt,
    UpdatedBy,
}

impl MemberField {
    pub const ALL: [MemberField; 9] = [
        Self::Id,
        Self::Username,
        Self::Age,
        Self::TeamId,
        Self::TeamName,
        Self::CreatedAt,
        Self::CreatedBy,
        Self::UpdatedAt,
        Self::UpdatedBy,
    ];

    /// Parses the field names accepted on the command line.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))
    }
}

impl EntityField for MemberField {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Age => "age",
            Self::TeamId => "team_id",
            Self::TeamName => "team_name",
            Self::CreatedAt => "created_at",
            Self::CreatedBy => "created_by",
            Self::UpdatedAt => "updated_at",
            Self::UpdatedBy => "updated_by",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "e.member_id",
            Self::Username => "e.username",
            Self::Age => "e.age",
            Self::TeamId => "e.team_id",
            Self::TeamName => "t.name",
            Self::CreatedAt => "e.created_at",
            Self::CreatedBy => "e.created_by",
            Self::UpdatedAt => "e.updated_at",
            Self::UpdatedBy => "e.updated_by",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::Id | Self::Age | Self::TeamId | Self::CreatedAt | Self::UpdatedAt => {
                ValueKind::Integer
            }
            Self::Username | Self::TeamName | Self::CreatedBy | Self::UpdatedBy => ValueKind::Text,
        }
    }

    fn nullable(self) -> bool {
        matches!(self, Self::TeamId | Self::TeamName)
    }

    fn needs_team_join(self) -> bool {
        matches!(self, Self::TeamName)
    }

    fn update_column(self) -> Option<&'static str> {
        match self {
            Self::Username => Some("username"),
            Self::Age => Some("age"),
            Self::TeamId => Some("team_id"),
            Self::UpdatedAt => Some("updated_at"),
            Self::UpdatedBy => Some("updated_by"),
            Self::Id | Self::TeamName | Self::CreatedAt | Self::CreatedBy => None,
        }
    }
}
