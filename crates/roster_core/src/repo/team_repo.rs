//! Team repository contract and its session-backed implementation.

use crate::error::PersistenceResult;
use crate::model::member::Member;
use crate::model::team::{Team, TeamId};
use crate::query::Query;
use crate::session::Session;

pub trait TeamRepository {
    fn save(&mut self, team: Team) -> PersistenceResult<Team>;
    fn find_by_id(&mut self, id: TeamId) -> PersistenceResult<Option<Team>>;
    fn find_all(&mut self) -> PersistenceResult<Vec<Team>>;
    /// Fails while members still belong to the team.
    fn delete(&mut self, id: TeamId) -> PersistenceResult<()>;
    /// Derived member list, recomputed on every call.
    fn members_of(&mut self, id: TeamId) -> PersistenceResult<Vec<Member>>;
}

/// Team repository over a borrowed session.
pub struct SqliteTeamRepository<'s, 'db> {
    session: &'s mut Session<'db>,
}

impl<'s, 'db> SqliteTeamRepository<'s, 'db> {
    pub fn new(session: &'s mut Session<'db>) -> Self {
        Self { session }
    }
}

impl TeamRepository for SqliteTeamRepository<'_, '_> {
    fn save(&mut self, team: Team) -> PersistenceResult<Team> {
        self.session.persist(team)
    }

    fn find_by_id(&mut self, id: TeamId) -> PersistenceResult<Option<Team>> {
        self.session.find(id)
    }

    fn find_all(&mut self) -> PersistenceResult<Vec<Team>> {
        self.session.find_all::<Team>(&Query::new())
    }

    fn delete(&mut self, id: TeamId) -> PersistenceResult<()> {
        self.session.remove::<Team>(id)
    }

    fn members_of(&mut self, id: TeamId) -> PersistenceResult<Vec<Member>> {
        self.session.members_of(id)
    }
}
