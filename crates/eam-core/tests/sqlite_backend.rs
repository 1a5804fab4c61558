//! The SQLite backend satisfies the same lock and lifecycle invariants as the
//! in-memory store, and keeps them across reopen.

use std::sync::{Arc, Barrier};
use std::thread;

use eam_core::prelude::*;
use eam_core::ArtifactState;
use eam_test_utils::{app, i100, i200, rename, seeded, ALICE, BOB, CAROL};
use pretty_assertions::assert_eq;

#[test]
fn concurrent_checkouts_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("eam.db")).unwrap();
    let harness = Arc::new(seeded(store, VcConfig::default()));
    let barrier = Arc::new(Barrier::new(3));

    let handles: Vec<_> = [(ALICE, i100()), (CAROL, i100()), (BOB, i200())]
        .into_iter()
        .map(|(user, initiative)| {
            let harness = Arc::clone(&harness);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                harness.vc.checkout(user, app(), &initiative)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(harness.vc.query_locks(None).unwrap().len(), 1);
}

#[test]
fn checkin_and_completion_round_trip() {
    let h = seeded(SqliteStore::open_in_memory().unwrap(), VcConfig::default());

    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    let commit = h
        .vc
        .checkin(ALICE, Checkin::new(app(), i100(), rename("Renamed App")))
        .unwrap();
    assert_eq!(commit.shadow.version_number, 1);
    assert_eq!(commit.artifact.state.state, ArtifactState::InitiativeChanges);

    let production = h
        .vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(production.name, "Billing");

    h.vc.complete_initiative(ALICE, &i100()).unwrap();
    let production = h
        .vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(production.name, "Renamed App");
    assert_eq!(production.revision, 2);
    assert_eq!(h.vc.verify_audit().unwrap(), h.vc.audit_trail(None).unwrap().len());
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eam.db");

    let lock = {
        let h = seeded(SqliteStore::open(&path).unwrap(), VcConfig::default());
        h.vc.checkout(ALICE, app(), &i100()).unwrap()
    };

    let h = seeded_reopen(&path);
    let locks = h.query_locks(Some(&i100())).unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].lock, lock);
}

fn seeded_reopen(path: &std::path::Path) -> VersionControl<SqliteStore> {
    let clock = Arc::new(eam_core::ManualClock::new(eam_test_utils::start_time()));
    VersionControl::new(
        SqliteStore::open(path).unwrap(),
        Arc::new(eam_test_utils::directory()),
    )
    .with_clock(clock)
}
