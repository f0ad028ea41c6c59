//! Member→Team association loading.
//!
//! # Responsibility
//! - Resolve a member's team lazily through the session cache.
//! - Load members together with their teams in one joined statement.
//! - Derive a team's members from the member side of the edge.
//!
//! # Invariants
//! - A team is read from the store at most once per session while tracked.
//! - `members_of` is recomputed on every call and never cached.

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::member::{Member, MemberField, MemberId, TeamRef};
use crate::model::team::{Team, TeamId};
use crate::model::{Entity, EntityKind, RecordKey};
use crate::query::sql::{self, Source};
use crate::query::{Criteria, JoinKind, Query};
use crate::session::Session;

const FETCH_JOIN_TEAM_COLUMNS: &str = "t.team_id AS t_team_id, t.name AS t_name";

impl Session<'_> {
    /// Loads the member's team if it is not loaded yet.
    pub fn resolve_team(&mut self, member: &mut Member) -> PersistenceResult<()> {
        let Some(TeamRef::Unresolved { id }) = member.team() else {
            return Ok(());
        };
        let team = self.get::<Team>(*id)?;
        member.resolve_team(team);
        Ok(())
    }

    pub fn resolve_teams(&mut self, members: &mut [Member]) -> PersistenceResult<()> {
        for member in members {
            self.resolve_team(member)?;
        }
        Ok(())
    }

    /// Loads members and their teams with one `LEFT JOIN` statement.
    ///
    /// Every returned member with a team has it resolved; the teams become
    /// tracked.
    pub fn find_members_with_team(
        &mut self,
        query: &Query<MemberField>,
    ) -> PersistenceResult<Vec<Member>> {
        self.flush()?;
        let select_list = format!("{}, {FETCH_JOIN_TEAM_COLUMNS}", Member::SELECT_LIST);
        let statement = sql::select(
            &Source::of::<Member>().joined(Some(JoinKind::Left)),
            &select_list,
            query.criteria(),
            query.sort(),
            query.row_window(),
        )?;
        let rows = self.query_rows(&statement, |row| {
            Ok((Member::from_row(row)?, Team::from_joined_row(row)?))
        })?;

        let mut members = Vec::with_capacity(rows.len());
        for (member, team) in rows {
            let mut member = if query.is_read_only() {
                member
            } else {
                self.register(member)
            };
            if let Some(team) = team {
                let team = if query.is_read_only() {
                    team
                } else {
                    self.register(team)
                };
                member.resolve_team(team);
            }
            members.push(member);
        }
        Ok(members)
    }

    /// Members whose team reference is `team_id`, in insertion order.
    pub fn members_of(&mut self, team_id: TeamId) -> PersistenceResult<Vec<Member>> {
        if self.find::<Team>(team_id)?.is_none() {
            return Err(PersistenceError::not_found(RecordKey::new(
                EntityKind::Team,
                team_id,
            )));
        }
        self.find_all::<Member>(&Query::filter(
            Criteria::new().eq(MemberField::TeamId, team_id),
        ))
    }

    /// Moves a member to another team, or out of any team.
    pub fn change_team(
        &mut self,
        member_id: MemberId,
        team_id: Option<TeamId>,
    ) -> PersistenceResult<Member> {
        self.update(member_id, |member: &mut Member| member.change_team(team_id))
    }
}
