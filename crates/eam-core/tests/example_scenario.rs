//! End-to-end walk through two initiatives competing for one application.
//!
//! Alice works in I-100, Bob in I-200, both on application #42.

use eam_core::prelude::*;
use eam_core::{ArtifactState, ReadSource};
use eam_test_utils::{app, i100, i200, rename, seeded_service, ALICE, BOB};
use pretty_assertions::assert_eq;

#[test]
fn two_initiatives_one_application() {
    let h = seeded_service();
    let vc = &h.vc;

    // Alice checks out #42 under I-100
    let lock = vc.checkout(ALICE, app(), &i100()).unwrap();
    assert_eq!(lock.artifact, app());

    let locks = vc.query_locks(Some(&i100())).unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].lock.artifact, ArtifactRef::new(ArtifactKind::Application, 42));
    assert_eq!(locks[0].lock.locked_by, ALICE);

    let mine = vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(i100()))
        .unwrap();
    assert_eq!(mine.state.state, ArtifactState::CheckedOutMe);

    // Bob is blocked, and told by whom
    let err = vc.checkout(BOB, app(), &i200()).unwrap_err();
    let VcError::LockConflict(conflict) = err else {
        panic!("expected lock conflict, got {err:?}");
    };
    assert_eq!(conflict.locked_by, ALICE);
    assert_eq!(conflict.locked_by_user.as_deref(), Some("alice"));
    assert_eq!(conflict.initiative_id, i100());
    assert_eq!(conflict.expires_at, lock.lock_expiry);

    // Alice checks in a rename
    let commit = vc
        .checkin(
            ALICE,
            Checkin::new(app(), i100(), rename("Renamed App")).with_description("rename"),
        )
        .unwrap();
    assert!(commit.changed_fields.contains("name"));
    assert_eq!(commit.artifact.name, "Renamed App");
    assert!(vc.query_locks(Some(&i100())).unwrap().is_empty());

    let after = vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(i100()))
        .unwrap();
    assert_eq!(after.state.state, ArtifactState::InitiativeChanges);
    assert!(!after.state.is_checked_out_by_me);

    // Production still shows the old name
    let production = vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(production.name, "Billing");
    assert_eq!(production.source, ReadSource::Baseline);

    // Until I-100 completes
    let summary = vc.complete_initiative(ALICE, &i100()).unwrap();
    assert_eq!(summary.promoted, vec![app()]);

    let promoted = vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(promoted.name, "Renamed App");
    assert_eq!(promoted.revision, 2);
    assert_eq!(promoted.state.state, ArtifactState::Production);

    // Bob can now take the lock in I-200
    let bob_lock = vc.checkout(BOB, app(), &i200()).unwrap();
    assert_eq!(bob_lock.base_revision, 2);
}
