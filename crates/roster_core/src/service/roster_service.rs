//! Roster use-cases: member listing, lookups and seeding.

use crate::error::PersistenceResult;
use crate::model::member::{Member, MemberField, MemberId};
use crate::model::team::{Team, TeamId};
use crate::projection::MemberDto;
use crate::query::{Page, PageRequest, Query, Sort};
use crate::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use crate::repo::team_repo::{SqliteTeamRepository, TeamRepository};
use crate::session::Database;
use log::info;

/// Request-scoped roster operations over one database.
pub struct RosterService<'db> {
    db: &'db Database,
}

impl<'db> RosterService<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// One page of members as DTOs, teams resolved through the session cache.
    pub fn list_members(
        &self,
        page: PageRequest,
        sort: Sort<MemberField>,
    ) -> PersistenceResult<Page<MemberDto>> {
        self.db.transaction(|session| {
            let mut members = session.find_page::<Member>(&Query::new().sorted(sort), page)?;
            session.resolve_teams(members.content_mut())?;
            Ok(members.map(|member| MemberDto::from(&member)))
        })
    }

    pub fn member_username(&self, id: MemberId) -> PersistenceResult<String> {
        self.db
            .transaction(|session| Ok(session.get::<Member>(id)?.username))
    }

    /// Creates `team_name` with `count` members `{prefix}{i}` aged `10 + i`.
    pub fn seed_team(
        &self,
        team_name: &str,
        member_prefix: &str,
        count: u32,
    ) -> PersistenceResult<TeamId> {
        let team_id = self.db.transaction(|session| {
            let team = SqliteTeamRepository::new(session).save(Team::new(team_name))?;
            let team_id = team.id().unwrap_or_default();
            let mut members = SqliteMemberRepository::new(session);
            for index in 0..count {
                let offset = i32::try_from(index).unwrap_or(i32::MAX);
                members.save(Member::with_team(
                    format!("{member_prefix}{index}"),
                    10_i32.saturating_add(offset),
                    team_id,
                ))?;
            }
            Ok(team_id)
        })?;
        info!(
            "event=seed_team module=service status=ok team_id={} members={}",
            team_id, count
        );
        Ok(team_id)
    }

    pub fn rename_member(&self, id: MemberId, username: &str) -> PersistenceResult<Member> {
        self.db.transaction(|session| {
            session.update(id, |member: &mut Member| {
                member.username = username.to_string();
            })
        })
    }

    /// Whether any member exists; used to seed an empty store once.
    pub fn is_empty(&self) -> PersistenceResult<bool> {
        self.db
            .transaction(|session| Ok(SqliteMemberRepository::new(session).count()? == 0))
    }
}
