use roster_core::{Database, ManualClock, Member, PersistenceConfig, StaticAuditor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn database(clock: &Arc<ManualClock>) -> Database {
    Database::open_in_memory(PersistenceConfig::default())
        .unwrap()
        .with_clock(Arc::clone(clock))
}

#[test]
fn persist_stamps_all_audit_fields() {
    let clock = Arc::new(ManualClock::new(1_000));
    let db = database(&clock).with_auditor(StaticAuditor::new("IN_ADMIN"));

    let mut session = db.begin().unwrap();
    let member = session.persist(Member::new("member1", 10)).unwrap();
    let audit = member.audit().unwrap();
    assert_eq!(audit.created_at, 1_000);
    assert_eq!(audit.updated_at, 1_000);
    assert_eq!(audit.created_by, "IN_ADMIN");
    assert_eq!(audit.updated_by, "IN_ADMIN");
}

#[test]
fn updates_refresh_only_update_fields() {
    let clock = Arc::new(ManualClock::new(1_000));
    let calls = Arc::new(AtomicUsize::new(0));
    let auditor_calls = Arc::clone(&calls);
    let db = database(&clock).with_auditor(move || {
        if auditor_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            "IN_ADMIN".to_string()
        } else {
            "UP_ADMIN".to_string()
        }
    });

    let id = db
        .transaction(|session| Ok(session.persist(Member::new("member1", 10))?.id().unwrap()))
        .unwrap();

    let mut previous_updated_at = 1_000;
    for step in 1..=3 {
        clock.advance(250);
        db.transaction(|session| {
            session.update(id, |member: &mut Member| member.age = 10 + step)?;
            session.flush()
        })
        .unwrap();

        let mut session = db.begin().unwrap();
        let member = session.get::<Member>(id).unwrap();
        let audit = member.audit().unwrap();
        assert_eq!(audit.created_at, 1_000);
        assert_eq!(audit.created_by, "IN_ADMIN");
        assert_eq!(audit.updated_by, "UP_ADMIN");
        assert!(audit.updated_at > previous_updated_at);
        assert!(audit.updated_at >= audit.created_at);
        previous_updated_at = audit.updated_at;
    }
    assert_eq!(previous_updated_at, 1_750);
}

#[test]
fn clock_going_backwards_keeps_updated_at_monotonic() {
    let clock = Arc::new(ManualClock::new(5_000));
    let db = database(&clock);
    let id = db
        .transaction(|session| Ok(session.persist(Member::new("member1", 10))?.id().unwrap()))
        .unwrap();

    clock.set(100);
    db.transaction(|session| {
        session.update(id, |member: &mut Member| member.age = 11)?;
        Ok(())
    })
    .unwrap();

    let mut session = db.begin().unwrap();
    let audit = session.get::<Member>(id).unwrap().audit().cloned().unwrap();
    assert_eq!(audit.created_at, 5_000);
    assert_eq!(audit.updated_at, 5_000);
}

#[test]
fn buffered_update_is_stamped_at_flush_time() {
    let clock = Arc::new(ManualClock::new(1_000));
    let db = database(&clock);

    let mut session = db.begin().unwrap();
    let member = session.persist(Member::new("member1", 10)).unwrap();
    let id = member.id().unwrap();

    clock.set(2_000);
    session
        .update(id, |member: &mut Member| member.age = 11)
        .unwrap();
    clock.set(3_000);
    session.flush().unwrap();

    let flushed = session.get::<Member>(id).unwrap();
    assert_eq!(flushed.audit().unwrap().updated_at, 3_000);
    assert_eq!(flushed.audit().unwrap().created_at, 1_000);
}

#[test]
fn unflushed_update_keeps_previous_stamp() {
    let clock = Arc::new(ManualClock::new(1_000));
    let db = database(&clock);

    let mut session = db.begin().unwrap();
    let id = session.persist(Member::new("member1", 10)).unwrap().id().unwrap();
    clock.set(2_000);
    let updated = session
        .update(id, |member: &mut Member| member.age = 11)
        .unwrap();
    assert_eq!(updated.audit().unwrap().updated_at, 1_000);
}
