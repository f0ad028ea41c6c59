//! Result shapes narrower than a full entity.
//!
//! Projections are detached values; they are never tracked.

use crate::error::PersistenceResult;
use crate::model::member::{Member, MemberId};
use crate::model::Entity;
use crate::query::sql::{self, Source};
use crate::query::{JoinKind, Page, PageRequest, Query, Window};
use crate::session::Session;
use rusqlite::Row;
use serde::Serialize;

/// A row shape selected from one entity's table.
pub trait Projection: Sized {
    type Source: Entity;
    /// Select list over aliases `e` (entity) and `t` (team).
    const SELECT_LIST: &'static str;
    /// Team join required by the select list.
    const JOIN: Option<JoinKind> = None;

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameOnly {
    pub username: String,
}

impl Projection for UsernameOnly {
    type Source = Member;
    const SELECT_LIST: &'static str = "e.username AS username";

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Ok(Self {
            username: row.get("username")?,
        })
    }
}

/// Member row flattened with its team name.
///
/// Selected through an inner join, so members without a team are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl Projection for MemberDto {
    type Source = Member;
    const SELECT_LIST: &'static str =
        "e.member_id AS member_id, e.username AS username, t.name AS team_name";
    const JOIN: Option<JoinKind> = Some(JoinKind::Inner);

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Ok(Self {
            id: row.get("member_id")?,
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

/// Uses the resolved team when present; an unresolved team yields no name.
impl From<&Member> for MemberDto {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id().unwrap_or_default(),
            username: member.username.clone(),
            team_name: member
                .team()
                .and_then(|team| team.team())
                .map(|team| team.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamInfo {
    pub name: String,
}

/// Username with the nested team, kept for members without a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberWithTeamName {
    pub username: String,
    pub team: Option<TeamInfo>,
}

impl Projection for MemberWithTeamName {
    type Source = Member;
    const SELECT_LIST: &'static str = "e.username AS username, t.name AS team_name";
    const JOIN: Option<JoinKind> = Some(JoinKind::Left);

    fn from_row(row: &Row<'_>) -> PersistenceResult<Self> {
        let team_name: Option<String> = row.get("team_name")?;
        Ok(Self {
            username: row.get("username")?,
            team: team_name.map(|name| TeamInfo { name }),
        })
    }
}

impl Session<'_> {
    /// Rows of the query in the shape of `P`.
    pub fn project<P: Projection>(
        &mut self,
        query: &Query<<P::Source as Entity>::Field>,
    ) -> PersistenceResult<Vec<P>> {
        self.flush()?;
        let statement = sql::select(
            &Source::of::<P::Source>().joined(P::JOIN),
            P::SELECT_LIST,
            query.criteria(),
            query.sort(),
            query.row_window(),
        )?;
        self.query_rows(&statement, |row| P::from_row(row))
    }

    /// One page of projected rows; totals count the same joined rows.
    pub fn project_page<P: Projection>(
        &mut self,
        query: &Query<<P::Source as Entity>::Field>,
        page: PageRequest,
    ) -> PersistenceResult<Page<P>> {
        let slice = page.resolve(self.config())?;
        self.flush()?;
        let source = Source::of::<P::Source>().joined(P::JOIN);
        let total = self.query_count(&sql::count(&source, query.criteria())?)?;
        let statement = sql::select(
            &source,
            P::SELECT_LIST,
            query.criteria(),
            query.sort(),
            Window::Range {
                offset: slice.offset(),
                limit: Some(slice.size),
            },
        )?;
        let content = self.query_rows(&statement, |row| P::from_row(row))?;
        Ok(slice.into_page(content, total))
    }
}
