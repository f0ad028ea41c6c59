//! Persistence core for the member/team roster.
//! Entities, queries, sessions and locking live here; binaries
//! only wire configuration and logging around them.

pub mod association;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod native;
pub mod projection;
pub mod query;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{ConfigError, PersistenceConfig};
pub use error::{ContentionTarget, PersistenceError, PersistenceResult, ValidationError};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination, LoggingError};
pub use model::audit::{Audit, AuditorAware, Clock, ManualClock, StaticAuditor, SystemClock};
pub use model::member::{Member, MemberField, MemberId, TeamRef};
pub use model::team::{Team, TeamField, TeamId};
pub use model::{Entity, EntityId, EntityKind, RecordKey};
pub use native::{FromNativeRow, MemberProjection, NativeQuery};
pub use projection::{MemberDto, MemberWithTeamName, Projection, TeamInfo, UsernameOnly};
pub use query::{
    Assignment, Criteria, Direction, EntityField, FieldValue, JoinKind, Page, PageRequest, Query,
    Sort, ValueKind,
};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::team_repo::{SqliteTeamRepository, TeamRepository};
pub use service::roster_service::RosterService;
pub use session::{Database, LockMode, PersistenceContext, Session, SessionStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
