use edlock::admin;
use edlock::config::EdlockConfig;
use edlock::coordinator::{LockCoordinator, StoreCoordinator};
use edlock::entity::{Attribute, AttributeValue, Entity, EntityKey, EntityStore, WriteTransaction};
use edlock::error::EdlockError;
use edlock::identity::IdentityContext;
use edlock::lock::{LockKind, now_micros};
use edlock::store::LockStore;
use edlock::store::durable::{DurableLockRecord, DurableLockStore};
use edlock::store::file::FileLockStore;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

struct TestEntity {
    key: EntityKey,
}

impl Entity for TestEntity {
    fn key(&self) -> EntityKey {
        self.key.clone()
    }

    fn attributes(&self) -> Vec<Attribute> {
        vec![Attribute::new(
            "state",
            AttributeValue::Text("ok".into()),
        )]
    }
}

struct StaticEntities;

impl EntityStore for StaticEntities {
    fn load(&self, key: &EntityKey) -> Result<Option<Box<dyn Entity>>, EdlockError> {
        Ok(Some(Box::new(TestEntity { key: key.clone() })))
    }
}

struct PassiveTx;

impl WriteTransaction for PassiveTx {
    fn detach(&self, _key: &EntityKey) {}

    fn attach(&self, _entity: &dyn Entity) {}
}

/// A coordinator wired the way a separate worker process would wire one.
fn open_session(dir: &Path, owner: &str, session: &str) -> StoreCoordinator {
    let file_store = FileLockStore::open(dir, &EdlockConfig::default()).expect("open lock dir");
    StoreCoordinator::new(
        LockStore::new(Arc::new(file_store)),
        Arc::new(StaticEntities),
        Arc::new(PassiveTx),
        IdentityContext::new(owner, session),
    )
}

fn key(pk: &str) -> EntityKey {
    EntityKey::new("indicator", pk)
}

#[test]
fn contending_processes_fail_fast_with_the_holder_identity() {
    let dir = tempdir().expect("temp");
    let alice = open_session(dir.path(), "alice", "s1");
    let bob = open_session(dir.path(), "bob", "s2");

    alice
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("alice holds");

    let err = bob
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect_err("exclusive");
    let EdlockError::PessimisticConflict { lock } = err else {
        panic!("expected a pessimistic conflict");
    };
    assert_eq!(lock.owner, "alice");
    assert_eq!(lock.session_id, "s1");
    assert_eq!(lock.target, key("1"));

    // Optimistic claims and write checks are blocked the same way.
    let err = bob
        .acquire_lock(&key("1"), LockKind::Optimistic, None)
        .expect_err("blocked");
    assert_eq!(err.code_str(), "pessimistic_conflict");
    let err = bob
        .check_before_write(&TestEntity { key: key("1") })
        .expect_err("blocked");
    assert_eq!(err.code_str(), "pessimistic_conflict");

    assert_eq!(bob.store().metrics().snapshot().pessimistic_conflicts, 3);
}

#[test]
fn a_foreign_hold_is_never_adopted_into_the_cache() {
    let dir = tempdir().expect("temp");
    let alice = open_session(dir.path(), "alice", "s1");
    let bob = open_session(dir.path(), "bob", "s2");

    alice
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("alice holds");
    assert!(bob.lock(&key("1")).expect("get").is_some());
    assert!(bob.lock(&key("1")).expect("get").is_some());

    // Had bob cached the foreign hold, the release would stay invisible.
    alice.release_lock(&key("1"), None).expect("release");
    assert!(bob.lock(&key("1")).expect("get").is_none());
}

#[test]
fn foreign_release_attempts_leave_the_hold_in_place() {
    let dir = tempdir().expect("temp");
    let alice = open_session(dir.path(), "alice", "s1");
    let bob = open_session(dir.path(), "bob", "s2");

    alice
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("alice holds");

    assert!(!bob.release_lock(&key("1"), None).expect("own locks only"));
    assert_eq!(bob.release_all_locks().expect("own locks only"), 0);
    assert!(alice.lock(&key("1")).expect("get").is_some());
}

#[test]
fn administrative_clearing_recovers_from_a_crashed_holder() {
    let dir = tempdir().expect("temp");
    let config = EdlockConfig::default();
    {
        let crashed = open_session(dir.path(), "alice", "s1");
        crashed
            .acquire_lock(&key("1"), LockKind::Pessimistic, None)
            .expect("acquire");
        // The process dies without releasing; the hold stays indefinitely.
    }

    let bob = open_session(dir.path(), "bob", "s2");
    let err = bob
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect_err("stale hold still enforced");
    assert_eq!(err.code_str(), "pessimistic_conflict");

    let report = admin::clear_owner(dir.path(), &config, "alice").expect("clear");
    assert_eq!(report.removed, 1);

    bob.acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("cleared");
}

#[test]
fn herd_on_one_target_admits_exactly_one_winner() {
    let dir = tempdir().expect("temp");
    let workers = 8;

    let outcomes: Vec<Result<(), EdlockError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let dir = dir.path().to_path_buf();
                scope.spawn(move || {
                    let store =
                        FileLockStore::open(&dir, &EdlockConfig::default()).expect("open");
                    store.put(DurableLockRecord {
                        target: EntityKey::new("indicator", "hot"),
                        owner: format!("worker-{i}").into(),
                        session_id: format!("s{i}").into(),
                        created_at_micros: now_micros(),
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for outcome in outcomes {
        if let Err(err) = outcome {
            assert_eq!(err.code_str(), "pessimistic_conflict");
        }
    }

    // The surviving record belongs to the single winner.
    let report = admin::list_locks(dir.path(), &EdlockConfig::default()).expect("list");
    assert_eq!(report.entries.len(), 1);
    assert!(report.entries[0].owner.starts_with("worker-"));
}

#[test]
fn reacquiring_an_own_hold_refreshes_it_without_conflict() {
    let dir = tempdir().expect("temp");
    let alice = open_session(dir.path(), "alice", "s1");

    alice
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("acquire");
    let first = alice.lock(&key("1")).expect("get").expect("held");

    alice
        .acquire_lock(&key("1"), LockKind::Pessimistic, None)
        .expect("same owner re-acquires");
    let second = alice.lock(&key("1")).expect("get").expect("held");
    assert!(second.created_at_micros >= first.created_at_micros);
    assert_eq!(second.owner, "alice");
}
