use roster_core::{
    Criteria, Database, FieldValue, Member, MemberDto, MemberField, MemberProjection,
    MemberRepository, MemberWithTeamName, NativeQuery, PageRequest, PersistenceConfig,
    PersistenceError, Query, Session, Sort, SqliteMemberRepository, Team, TeamInfo,
    UsernameOnly, ValidationError,
};

fn database() -> Database {
    Database::open_in_memory(PersistenceConfig::default()).unwrap()
}

/// m1, m2 in teamA; m3 in teamB; loner without a team.
fn seed(session: &mut Session<'_>) {
    let team_a = session.persist(Team::new("teamA")).unwrap().id().unwrap();
    let team_b = session.persist(Team::new("teamB")).unwrap().id().unwrap();
    session.persist(Member::with_team("m1", 10, team_a)).unwrap();
    session.persist(Member::with_team("m2", 20, team_a)).unwrap();
    session.persist(Member::with_team("m3", 30, team_b)).unwrap();
    session.persist(Member::new("loner", 40)).unwrap();
}

fn by_username() -> Query<MemberField> {
    Query::new().sorted(Sort::asc(MemberField::Username))
}

#[test]
fn username_projection_selects_matching_rows() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let mut repo = SqliteMemberRepository::new(&mut session);
    let rows = repo.find_projections_by_username("m1").unwrap();
    assert_eq!(
        rows,
        vec![UsernameOnly {
            username: "m1".to_string()
        }]
    );
    assert!(repo.find_projections_by_username("nobody").unwrap().is_empty());
}

#[test]
fn member_dto_skips_members_without_team() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let dtos = session.project::<MemberDto>(&by_username()).unwrap();
    let names: Vec<(&str, Option<&str>)> = dtos
        .iter()
        .map(|dto| (dto.username.as_str(), dto.team_name.as_deref()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("m1", Some("teamA")),
            ("m2", Some("teamA")),
            ("m3", Some("teamB")),
        ]
    );
}

#[test]
fn projections_are_not_tracked() {
    let db = database();
    db.transaction(|session| {
        seed(session);
        Ok(())
    })
    .unwrap();

    let mut session = db.begin().unwrap();
    let dtos = session.project::<MemberDto>(&by_username()).unwrap();
    assert_eq!(dtos.len(), 3);
    assert_eq!(session.context().tracked_count(), 0);
}

#[test]
fn nested_team_projection_keeps_members_without_team() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let rows = SqliteMemberRepository::new(&mut session)
        .find_projected_by_username::<MemberWithTeamName>("loner")
        .unwrap();
    assert_eq!(
        rows,
        vec![MemberWithTeamName {
            username: "loner".to_string(),
            team: None,
        }]
    );

    let rows = session.project::<MemberWithTeamName>(&by_username()).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[1].team,
        Some(TeamInfo {
            name: "teamA".to_string()
        })
    );
}

#[test]
fn projection_page_counts_joined_rows() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let page = session
        .project_page::<MemberDto>(&by_username(), PageRequest::of(1, 2))
        .unwrap();
    assert_eq!(page.total_elements(), 3);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.number_of_elements(), 1);
    assert_eq!(page.content()[0].username, "m3");
    assert!(page.is_last());

    let page = session
        .project_page::<UsernameOnly>(
            &Query::filter(Criteria::new().ge(MemberField::Age, 20)),
            PageRequest::of(0, 10),
        )
        .unwrap();
    assert_eq!(page.total_elements(), 3);
}

#[test]
fn native_query_filters_by_pattern_and_age_range() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let members = SqliteMemberRepository::new(&mut session)
        .find_by_native_query("m%", 15, 30)
        .unwrap();
    let names: Vec<&str> = members.iter().map(|member| member.username.as_str()).collect();
    assert_eq!(names, vec!["m2", "m3"]);
    assert_eq!(members[0].age, 20);
    assert!(members[0].team_id().is_some());
    assert!(members[0].audit().is_some());

    let missing = SqliteMemberRepository::new(&mut session)
        .find_by_native_query("%o%", 0, 30)
        .unwrap();
    assert!(missing.is_empty());
}

#[test]
fn native_query_sees_pending_writes() {
    let db = database();
    let mut session = db.begin().unwrap();
    let id = session.persist(Member::new("before", 10)).unwrap().id().unwrap();
    session
        .update(id, |member: &mut Member| member.username = "after".to_string())
        .unwrap();

    let rows: Vec<Member> = session
        .native_query(
            &NativeQuery::new("SELECT * FROM members WHERE username = ?1;"),
            &[FieldValue::from("after")],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn native_projection_page_reports_totals() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let page = SqliteMemberRepository::new(&mut session)
        .find_by_native_projection("%", 10, 40, PageRequest::of(0, 3))
        .unwrap();
    assert_eq!(page.total_elements(), 4);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.number_of_elements(), 3);
    assert!(page.has_next());

    let page = SqliteMemberRepository::new(&mut session)
        .find_by_native_projection("%", 10, 40, PageRequest::of(1, 3))
        .unwrap();
    assert_eq!(page.number_of_elements(), 1);
    assert_eq!(page.content()[0].username, "loner");
    assert_eq!(page.content()[0].team_name, None);
    assert!(!page.has_next());

    let page = SqliteMemberRepository::new(&mut session)
        .find_by_native_projection("m%", 20, 30, PageRequest::of(0, 5))
        .unwrap();
    assert_eq!(page.total_elements(), 2);
    let teams: Vec<Option<&str>> = page
        .content()
        .iter()
        .map(|row| row.team_name.as_deref())
        .collect();
    assert_eq!(teams, vec![Some("teamA"), Some("teamB")]);
}

#[test]
fn native_page_binds_parameters_to_both_statements() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed(&mut session);

    let query = NativeQuery::new(
        "SELECT m.member_id AS member_id, m.username AS username, t.name AS team_name \
         FROM members m LEFT JOIN teams t ON t.team_id = m.team_id WHERE m.age >= ? \
         ORDER BY m.age",
    )
    .with_count("SELECT COUNT(*) FROM members WHERE age >= ?");
    let page = session
        .native_page::<MemberProjection>(&query, &[FieldValue::from(20)], PageRequest::of(0, 2))
        .unwrap();

    assert_eq!(page.total_elements(), 3);
    let names: Vec<&str> = page
        .content()
        .iter()
        .map(|row| row.username.as_str())
        .collect();
    assert_eq!(names, vec!["m2", "m3"]);
    assert_eq!(page.content()[1].team_name.as_deref(), Some("teamB"));
}

#[test]
fn native_page_requires_count_query() {
    let db = database();
    let mut session = db.begin().unwrap();

    let err = session
        .native_page::<Member>(
            &NativeQuery::new("SELECT * FROM members"),
            &[],
            PageRequest::of(0, 10),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Validation(ValidationError::MissingCountQuery)
    ));
}

#[test]
fn native_query_rejects_named_parameters() {
    let db = database();
    let mut session = db.begin().unwrap();

    let err = session
        .native_query::<Member>(
            &NativeQuery::new("SELECT * FROM members WHERE username = :name"),
            &[FieldValue::from("m1")],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Validation(ValidationError::NamedParameter(ref name)) if name == ":name"
    ));
}

#[test]
fn native_query_checks_parameter_count() {
    let db = database();
    let mut session = db.begin().unwrap();

    let err = session
        .native_query::<Member>(
            &NativeQuery::new("SELECT * FROM members WHERE username = ? AND age > ?"),
            &[FieldValue::from("m1")],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Validation(ValidationError::ParameterCount {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn native_results_are_detached() {
    let db = database();
    db.transaction(|session| {
        seed(session);
        Ok(())
    })
    .unwrap();

    let mut session = db.begin().unwrap();
    let rows: Vec<Member> = session
        .native_query(&NativeQuery::new("SELECT * FROM members"), &[])
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(session.context().tracked_count(), 0);
}
