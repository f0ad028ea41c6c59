//! Member repository contract and its session-backed implementation.

use crate::error::PersistenceResult;
use crate::model::member::{Member, MemberField, MemberId};
use crate::native::{MemberProjection, NativeQuery};
use crate::projection::{MemberDto, Projection, UsernameOnly};
use crate::query::{Assignment, Criteria, FieldValue, Page, PageRequest, Query, Sort};
use crate::session::{LockMode, Session};

const MEMBERS_BY_NAME_AND_AGE_SQL: &str =
    "SELECT * FROM members WHERE username LIKE ? AND age BETWEEN ? AND ? ORDER BY member_id";
const MEMBER_PROJECTION_SQL: &str = "SELECT m.member_id AS member_id, m.username AS username, \
     t.name AS team_name FROM members m LEFT JOIN teams t ON t.team_id = m.team_id \
     WHERE m.username LIKE ? AND m.age BETWEEN ? AND ? ORDER BY m.member_id";
const MEMBER_PROJECTION_COUNT_SQL: &str =
    "SELECT COUNT(*) FROM members WHERE username LIKE ? AND age BETWEEN ? AND ?";

/// Member queries used by the roster use-cases.
pub trait MemberRepository {
    fn save(&mut self, member: Member) -> PersistenceResult<Member>;
    fn find_by_id(&mut self, id: MemberId) -> PersistenceResult<Option<Member>>;
    /// Every member with its team loaded in the same statement.
    fn find_all(&mut self) -> PersistenceResult<Vec<Member>>;
    fn count(&mut self) -> PersistenceResult<u64>;
    fn delete(&mut self, id: MemberId) -> PersistenceResult<()>;

    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i32,
    ) -> PersistenceResult<Vec<Member>>;
    /// First three members in insertion order.
    fn find_top3(&mut self) -> PersistenceResult<Vec<Member>>;
    fn find_by_username(&mut self, username: &str) -> PersistenceResult<Vec<Member>>;
    fn find_by_username_and_team_name(
        &mut self,
        username: &str,
        team_name: &str,
    ) -> PersistenceResult<Vec<Member>>;
    fn find_usernames(&mut self) -> PersistenceResult<Vec<String>>;
    /// Members that belong to a team, flattened with the team name.
    fn find_member_dtos(&mut self) -> PersistenceResult<Vec<MemberDto>>;
    /// Members whose username contains `fragment`.
    fn find_members_like(&mut self, fragment: &str) -> PersistenceResult<Vec<Member>>;
    fn find_by_names_in(&mut self, names: &[&str]) -> PersistenceResult<Vec<Member>>;

    fn find_by_age(
        &mut self,
        age: i32,
        sort: Sort<MemberField>,
        page: PageRequest,
    ) -> PersistenceResult<Page<Member>>;
    /// Plain offset/limit slice of the members of `age`, by username descending.
    fn find_by_age_window(
        &mut self,
        age: i32,
        offset: u64,
        limit: u32,
    ) -> PersistenceResult<Vec<Member>>;
    fn total_count_by_age(&mut self, age: i32) -> PersistenceResult<u64>;

    /// `age = age * 10` for every member aged `age` or more.
    fn bulk_age_update(&mut self, age: i32) -> PersistenceResult<u64>;
    /// `age = age * 100` for every member aged `age` or less.
    fn bulk_age_plus(&mut self, age: i32) -> PersistenceResult<u64>;

    fn find_member_fetch_join(&mut self) -> PersistenceResult<Vec<Member>>;
    /// Snapshot that is not tracked by the session.
    fn find_read_only_by_username(&mut self, username: &str) -> PersistenceResult<Option<Member>>;
    /// Exclusive pessimistic lock on every member with `username`.
    fn find_lock_by_username(&mut self, username: &str) -> PersistenceResult<Vec<Member>>;

    fn find_projections_by_username(
        &mut self,
        username: &str,
    ) -> PersistenceResult<Vec<UsernameOnly>>;
    fn find_projected_by_username<P: Projection<Source = Member>>(
        &mut self,
        username: &str,
    ) -> PersistenceResult<Vec<P>>;

    /// Members whose username matches the SQL `LIKE` pattern and whose age
    /// lies in `age_from..=age_to`.
    fn find_by_native_query(
        &mut self,
        pattern: &str,
        age_from: i32,
        age_to: i32,
    ) -> PersistenceResult<Vec<Member>>;
    /// Same filter as [`MemberRepository::find_by_native_query`], flattened
    /// with the team name and paged.
    fn find_by_native_projection(
        &mut self,
        pattern: &str,
        age_from: i32,
        age_to: i32,
        page: PageRequest,
    ) -> PersistenceResult<Page<MemberProjection>>;
}

/// Member repository over a borrowed session.
pub struct SqliteMemberRepository<'s, 'db> {
    session: &'s mut Session<'db>,
}

impl<'s, 'db> SqliteMemberRepository<'s, 'db> {
    pub fn new(session: &'s mut Session<'db>) -> Self {
        Self { session }
    }
}

fn by_username(username: &str) -> Query<MemberField> {
    Query::filter(Criteria::new().eq(MemberField::Username, username))
}

fn name_and_age_params(pattern: &str, age_from: i32, age_to: i32) -> [FieldValue; 3] {
    [
        FieldValue::from(pattern),
        FieldValue::from(age_from),
        FieldValue::from(age_to),
    ]
}

fn by_age(age: i32) -> Criteria<MemberField> {
    Criteria::new().eq(MemberField::Age, age)
}

impl MemberRepository for SqliteMemberRepository<'_, '_> {
    fn save(&mut self, member: Member) -> PersistenceResult<Member> {
        self.session.persist(member)
    }

    fn find_by_id(&mut self, id: MemberId) -> PersistenceResult<Option<Member>> {
        self.session.find(id)
    }

    fn find_all(&mut self) -> PersistenceResult<Vec<Member>> {
        self.session.find_members_with_team(&Query::new())
    }

    fn count(&mut self) -> PersistenceResult<u64> {
        self.session.count::<Member>(&Criteria::new())
    }

    fn delete(&mut self, id: MemberId) -> PersistenceResult<()> {
        self.session.remove::<Member>(id)
    }

    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i32,
    ) -> PersistenceResult<Vec<Member>> {
        let criteria = Criteria::new()
            .eq(MemberField::Username, username)
            .gt(MemberField::Age, age);
        self.session.find_all::<Member>(&Query::filter(criteria))
    }

    fn find_top3(&mut self) -> PersistenceResult<Vec<Member>> {
        self.session.find_all::<Member>(&Query::new().top(3))
    }

    fn find_by_username(&mut self, username: &str) -> PersistenceResult<Vec<Member>> {
        self.session.find_all::<Member>(&by_username(username))
    }

    fn find_by_username_and_team_name(
        &mut self,
        username: &str,
        team_name: &str,
    ) -> PersistenceResult<Vec<Member>> {
        let criteria = Criteria::new()
            .eq(MemberField::Username, username)
            .eq(MemberField::TeamName, team_name);
        self.session.find_all::<Member>(&Query::filter(criteria))
    }

    fn find_usernames(&mut self) -> PersistenceResult<Vec<String>> {
        let rows = self.session.project::<UsernameOnly>(&Query::new())?;
        Ok(rows.into_iter().map(|row| row.username).collect())
    }

    fn find_member_dtos(&mut self) -> PersistenceResult<Vec<MemberDto>> {
        self.session.project::<MemberDto>(&Query::new())
    }

    fn find_members_like(&mut self, fragment: &str) -> PersistenceResult<Vec<Member>> {
        let criteria = Criteria::new().contains(MemberField::Username, fragment);
        self.session.find_all::<Member>(&Query::filter(criteria))
    }

    fn find_by_names_in(&mut self, names: &[&str]) -> PersistenceResult<Vec<Member>> {
        let criteria = Criteria::new().is_in(MemberField::Username, names.iter().copied());
        self.session.find_all::<Member>(&Query::filter(criteria))
    }

    fn find_by_age(
        &mut self,
        age: i32,
        sort: Sort<MemberField>,
        page: PageRequest,
    ) -> PersistenceResult<Page<Member>> {
        self.session
            .find_page::<Member>(&Query::filter(by_age(age)).sorted(sort), page)
    }

    fn find_by_age_window(
        &mut self,
        age: i32,
        offset: u64,
        limit: u32,
    ) -> PersistenceResult<Vec<Member>> {
        let query = Query::filter(by_age(age))
            .sorted(Sort::desc(MemberField::Username))
            .window(offset, Some(limit));
        self.session.find_all::<Member>(&query)
    }

    fn total_count_by_age(&mut self, age: i32) -> PersistenceResult<u64> {
        self.session.count::<Member>(&by_age(age))
    }

    fn bulk_age_update(&mut self, age: i32) -> PersistenceResult<u64> {
        self.session.bulk_update::<Member>(
            &Criteria::new().ge(MemberField::Age, age),
            &[Assignment::multiply(MemberField::Age, 10)],
        )
    }

    fn bulk_age_plus(&mut self, age: i32) -> PersistenceResult<u64> {
        self.session.bulk_update::<Member>(
            &Criteria::new().le(MemberField::Age, age),
            &[Assignment::multiply(MemberField::Age, 100)],
        )
    }

    fn find_member_fetch_join(&mut self) -> PersistenceResult<Vec<Member>> {
        self.session.find_members_with_team(&Query::new())
    }

    fn find_read_only_by_username(&mut self, username: &str) -> PersistenceResult<Option<Member>> {
        let members = self
            .session
            .find_all::<Member>(&by_username(username).read_only().top(1))?;
        Ok(members.into_iter().next())
    }

    fn find_lock_by_username(&mut self, username: &str) -> PersistenceResult<Vec<Member>> {
        self.session
            .find_all_with_lock::<Member>(&by_username(username), LockMode::PessimisticWrite)
    }

    fn find_projections_by_username(
        &mut self,
        username: &str,
    ) -> PersistenceResult<Vec<UsernameOnly>> {
        self.session.project::<UsernameOnly>(&by_username(username))
    }

    fn find_projected_by_username<P: Projection<Source = Member>>(
        &mut self,
        username: &str,
    ) -> PersistenceResult<Vec<P>> {
        self.session.project::<P>(&by_username(username))
    }

    fn find_by_native_query(
        &mut self,
        pattern: &str,
        age_from: i32,
        age_to: i32,
    ) -> PersistenceResult<Vec<Member>> {
        self.session.native_query(
            &NativeQuery::new(MEMBERS_BY_NAME_AND_AGE_SQL),
            &name_and_age_params(pattern, age_from, age_to),
        )
    }

    fn find_by_native_projection(
        &mut self,
        pattern: &str,
        age_from: i32,
        age_to: i32,
        page: PageRequest,
    ) -> PersistenceResult<Page<MemberProjection>> {
        let query =
            NativeQuery::new(MEMBER_PROJECTION_SQL).with_count(MEMBER_PROJECTION_COUNT_SQL);
        self.session.native_page(
            &query,
            &name_and_age_params(pattern, age_from, age_to),
            page,
        )
    }
}
