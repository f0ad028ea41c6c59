use roster_core::{
    Criteria, Database, Direction, FieldValue, Member, MemberField, PageRequest,
    PersistenceConfig, PersistenceError, Query, Session, Sort, Team, ValidationError,
};

fn database() -> Database {
    Database::open_in_memory(PersistenceConfig::default()).unwrap()
}

fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(|member| member.username.as_str()).collect()
}

fn seed_anakins(session: &mut Session<'_>) {
    let team = session.persist(Team::new("Team1")).unwrap();
    for index in 0..30 {
        session
            .persist(Member::with_team(
                format!("Anakin_{index}"),
                10 + index,
                team.id().unwrap(),
            ))
            .unwrap();
    }
}

#[test]
fn anakin_page_sorted_by_username_desc() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);

    let query = Query::filter(Criteria::new().ge(MemberField::Age, 10))
        .sorted(Sort::desc(MemberField::Username));
    let page = session
        .find_page::<Member>(&query, PageRequest::of(0, 10))
        .unwrap();

    assert_eq!(
        usernames(page.content()),
        vec![
            "Anakin_9", "Anakin_8", "Anakin_7", "Anakin_6", "Anakin_5", "Anakin_4", "Anakin_3",
            "Anakin_29", "Anakin_28", "Anakin_27",
        ]
    );
    assert_eq!(page.total_elements(), 30);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.number(), 0);
    assert!(page.is_first());
    assert!(page.has_next());
    assert!(!page.is_last());
}

#[test]
fn pages_partition_the_result() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);
    let query = Query::new().sorted(Sort::asc(MemberField::Username));

    for size in [1_u32, 4, 7, 10, 30, 31] {
        let first = session
            .find_page::<Member>(&query, PageRequest::of(0, size))
            .unwrap();
        let total_pages = first.total_pages();
        assert_eq!(total_pages, 30_u64.div_ceil(u64::from(size)));

        let mut seen = Vec::new();
        for number in 0..total_pages {
            let page = session
                .find_page::<Member>(&query, PageRequest::of(number as u32, size))
                .unwrap();
            seen.extend(page.content().iter().map(|member| member.id().unwrap()));
        }
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(seen.len(), 30, "page size {size}");
        assert_eq!(unique.len(), 30, "page size {size}");
    }
}

#[test]
fn page_beyond_last_is_empty_with_totals() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);

    let page = session
        .find_page::<Member>(&Query::new(), PageRequest::of(9, 10))
        .unwrap();
    assert!(page.content().is_empty());
    assert_eq!(page.total_elements(), 30);
    assert_eq!(page.total_pages(), 3);
    assert!(!page.has_next());
    assert!(page.has_previous());
}

#[test]
fn zero_page_size_is_rejected_and_missing_size_uses_default() {
    let config = PersistenceConfig {
        default_page_size: 4,
        ..PersistenceConfig::default()
    };
    let db = Database::open_in_memory(config).unwrap();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);

    let err = session
        .find_page::<Member>(&Query::new(), PageRequest::of(0, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Validation(ValidationError::ZeroPageSize)
    ));

    let page = session
        .find_page::<Member>(&Query::new(), PageRequest::page(1))
        .unwrap();
    assert_eq!(page.size(), 4);
    assert_eq!(usernames(page.content()), vec!["Anakin_4", "Anakin_5", "Anakin_6", "Anakin_7"]);
}

#[test]
fn equality_and_greater_than_combine_with_and() {
    let db = database();
    let mut session = db.begin().unwrap();
    session.persist(Member::new("AAA", 10)).unwrap();
    session.persist(Member::new("AAA", 20)).unwrap();
    session.persist(Member::new("BBB", 30)).unwrap();

    let criteria = Criteria::new()
        .eq(MemberField::Username, "AAA")
        .gt(MemberField::Age, 15);
    let found = session.find_all::<Member>(&Query::filter(criteria)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "AAA");
    assert_eq!(found[0].age, 20);
}

#[test]
fn ties_are_broken_by_insertion_order() {
    let db = database();
    let mut session = db.begin().unwrap();
    let ids: Vec<i64> = (0..5)
        .map(|_| session.persist(Member::new("same", 10)).unwrap().id().unwrap())
        .collect();

    for direction in [Direction::Asc, Direction::Desc] {
        let found = session
            .find_all::<Member>(&Query::new().sorted(Sort::by(MemberField::Username, direction)))
            .unwrap();
        let found_ids: Vec<i64> = found.iter().map(|member| member.id().unwrap()).collect();
        assert_eq!(found_ids, ids);
    }
}

#[test]
fn membership_filter_matches_candidates_and_empty_set_matches_nothing() {
    let db = database();
    let mut session = db.begin().unwrap();
    session.persist(Member::new("AAA", 10)).unwrap();
    session.persist(Member::new("BBB", 20)).unwrap();
    session.persist(Member::new("CCC", 30)).unwrap();

    let found = session
        .find_all::<Member>(&Query::filter(
            Criteria::new().is_in(MemberField::Username, ["AAA", "CCC", "ZZZ"]),
        ))
        .unwrap();
    assert_eq!(usernames(&found), vec!["AAA", "CCC"]);

    let none = session
        .find_all::<Member>(&Query::filter(
            Criteria::new().is_in(MemberField::Username, Vec::<&str>::new()),
        ))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn pattern_match_is_case_sensitive() {
    let db = database();
    let mut session = db.begin().unwrap();
    session.persist(Member::new("Anakin", 10)).unwrap();
    session.persist(Member::new("anakin", 10)).unwrap();
    session.persist(Member::new("Luke", 10)).unwrap();

    let found = session
        .find_all::<Member>(&Query::filter(
            Criteria::new().contains(MemberField::Username, "Ana"),
        ))
        .unwrap();
    assert_eq!(usernames(&found), vec!["Anakin"]);

    let found = session
        .find_all::<Member>(&Query::filter(
            Criteria::new().like(MemberField::Username, "_uk%"),
        ))
        .unwrap();
    assert_eq!(usernames(&found), vec!["Luke"]);
}

#[test]
fn team_name_filter_joins_team() {
    let db = database();
    let mut session = db.begin().unwrap();
    let team_a = session.persist(Team::new("teamA")).unwrap();
    let team_b = session.persist(Team::new("teamB")).unwrap();
    session
        .persist(Member::with_team("m1", 0, team_a.id().unwrap()))
        .unwrap();
    session
        .persist(Member::with_team("m2", 0, team_b.id().unwrap()))
        .unwrap();
    session.persist(Member::new("m1", 0)).unwrap();

    let criteria = Criteria::new()
        .eq(MemberField::Username, "m1")
        .eq(MemberField::TeamName, "teamA");
    let found = session.find_all::<Member>(&Query::filter(criteria)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].team_id(), team_a.id());

    let without_team = session
        .find_all::<Member>(&Query::filter(
            Criteria::new().eq(MemberField::TeamId, FieldValue::Null),
        ))
        .unwrap();
    assert_eq!(without_team.len(), 1);
    assert_eq!(without_team[0].team_id(), None);
}

#[test]
fn top_and_offset_windows() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);

    let top = session.find_all::<Member>(&Query::new().top(3)).unwrap();
    assert_eq!(usernames(&top), vec!["Anakin_0", "Anakin_1", "Anakin_2"]);

    let window = session
        .find_all::<Member>(&Query::new().window(28, None))
        .unwrap();
    assert_eq!(usernames(&window), vec!["Anakin_28", "Anakin_29"]);

    let window = session
        .find_all::<Member>(&Query::new().window(5, Some(2)))
        .unwrap();
    assert_eq!(usernames(&window), vec!["Anakin_5", "Anakin_6"]);
}

#[test]
fn between_and_upper_bounds() {
    let db = database();
    let mut session = db.begin().unwrap();
    seed_anakins(&mut session);

    let count = session
        .count::<Member>(&Criteria::new().between(MemberField::Age, 15, 19))
        .unwrap();
    assert_eq!(count, 5);
    let count = session
        .count::<Member>(&Criteria::new().lt(MemberField::Age, 12))
        .unwrap();
    assert_eq!(count, 2);
    let count = session
        .count::<Member>(&Criteria::new().le(MemberField::Age, 12))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn invalid_criteria_are_validation_errors() {
    let db = database();
    let mut session = db.begin().unwrap();

    let err = session
        .find_all::<Member>(&Query::filter(Criteria::new().eq(MemberField::Age, "ten")))
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Validation(ValidationError::TypeMismatch { field: "age", .. })
    ));
}

#[test]
fn read_only_results_are_not_tracked() {
    let db = database();
    let id = db
        .transaction(|session| Ok(session.persist(Member::new("member1", 10))?.id().unwrap()))
        .unwrap();

    let mut session = db.begin().unwrap();
    let found = session
        .find_all::<Member>(&Query::new().read_only())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(!session.is_tracked::<Member>(id));

    session.find_all::<Member>(&Query::new()).unwrap();
    assert!(session.is_tracked::<Member>(id));
}
