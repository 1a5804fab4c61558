use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use eam_artifact::{
    ApplicationRecord, ArtifactChanges, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId,
    LifecycleState, UserId,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::audit::AuditAction;
use crate::clock::ManualClock;
use crate::identity::{MockPermissionPolicy, UserSummary};
use crate::initiative::{NewInitiative, ParticipantRole};
use crate::state::ArtifactState;
use crate::store::MemoryStore;

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const OUTSIDER: UserId = UserId(3);
const VIEWER: UserId = UserId(5);
const ADMIN: UserId = UserId(9);

fn policy() -> MockPermissionPolicy {
    let mut policy = MockPermissionPolicy::new();
    policy
        .expect_can_update()
        .returning(|user, _| user != VIEWER);
    policy.expect_is_admin().returning(|user| user == ADMIN);
    policy.expect_user().returning(|user| {
        Some(UserSummary {
            id: user,
            username: format!("user{user}"),
        })
    });
    policy
}

fn app() -> ArtifactRef {
    ArtifactRef::new(ArtifactKind::Application, 7)
}

fn initiative() -> InitiativeId {
    InitiativeId::from("I-1")
}

fn changes(value: serde_json::Value) -> ArtifactChanges {
    ArtifactChanges::from_json(ArtifactKind::Application, value).unwrap()
}

fn service_with(
    policy: MockPermissionPolicy,
    config: VcConfig,
) -> (VersionControl<MemoryStore>, Arc<ManualClock>) {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let vc = VersionControl::new(MemoryStore::new(), Arc::new(policy))
        .with_clock(clock.clone())
        .with_config(config);

    vc.store()
        .transaction(|tx| {
            let mut record = ApplicationRecord::new("AML-0007", "Ledger");
            record.lob = Some("Finance".into());
            tx.put_baseline(&BaselineEntry {
                artifact: app(),
                record: ArtifactRecord::from(record),
                artifact_state: LifecycleState::Active,
                initiative_origin: None,
                revision: 1,
                updated_at: start,
                updated_by: ADMIN,
            })?;
            Ok(())
        })
        .unwrap();
    vc.create_initiative(ALICE, NewInitiative::new("Ledger rework").with_id("I-1"))
        .unwrap();
    vc.add_participant(ALICE, &initiative(), BOB, ParticipantRole::Developer)
        .unwrap();
    (vc, clock)
}

fn service() -> (VersionControl<MemoryStore>, Arc<ManualClock>) {
    service_with(policy(), VcConfig::default())
}

#[test]
fn checkout_requires_update_right() {
    let (vc, _) = service();
    let err = vc.checkout(VIEWER, app(), &initiative()).unwrap_err();
    assert!(matches!(err, VcError::PermissionDenied { .. }));
    assert!(vc.query_locks(None).unwrap().is_empty());
}

#[test]
fn checkout_requires_participation() {
    let (vc, _) = service();
    let err = vc.checkout(OUTSIDER, app(), &initiative()).unwrap_err();
    assert_eq!(err.code(), "permission_denied");

    let (open, _) = service_with(policy(), VcConfig::default().with_require_participation(false));
    assert!(open.checkout(OUTSIDER, app(), &initiative()).is_ok());
}

#[test]
fn admin_may_check_out_without_participation() {
    let (vc, _) = service();
    let lock = vc.checkout(ADMIN, app(), &initiative()).unwrap();
    assert_eq!(lock.locked_by, ADMIN);
}

#[test]
fn checkout_of_unknown_artifact_or_initiative() {
    let (vc, _) = service();
    let missing = ArtifactRef::new(ArtifactKind::Application, 999);
    assert!(matches!(
        vc.checkout(ALICE, missing, &initiative()),
        Err(VcError::ArtifactNotFound(_))
    ));
    assert!(matches!(
        vc.checkout(ALICE, app(), &"I-404".into()),
        Err(VcError::InitiativeNotFound(_))
    ));
}

#[test]
fn conflict_payload_names_holder() {
    let (vc, _) = service();
    let lock = vc.checkout(ALICE, app(), &initiative()).unwrap();

    let Err(VcError::LockConflict(conflict)) = vc.checkout(BOB, app(), &initiative()) else {
        panic!("expected lock conflict");
    };
    assert_eq!(conflict.locked_by, ALICE);
    assert_eq!(conflict.locked_by_user.as_deref(), Some("user1"));
    assert_eq!(conflict.expires_at, lock.lock_expiry);
}

#[test]
fn lock_expiry_follows_ttl() {
    let (vc, clock) = service_with(policy(), VcConfig::default().with_lock_ttl_secs(60));
    let lock = vc.checkout(ALICE, app(), &initiative()).unwrap();
    assert_eq!(lock.lock_expiry - lock.locked_at, Duration::seconds(60));

    clock.advance(Duration::seconds(60));
    assert!(vc.checkout(BOB, app(), &initiative()).is_err());

    clock.advance(Duration::seconds(1));
    let taken = vc.checkout(BOB, app(), &initiative()).unwrap();
    assert_eq!(taken.locked_by, BOB);
}

#[test]
fn checkin_rejects_empty_and_mismatched_changes() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();

    let empty = ArtifactChanges::from(eam_artifact::ApplicationPatch::default());
    let err = vc
        .checkin(ALICE, Checkin::new(app(), initiative(), empty))
        .unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));

    let interface_changes =
        ArtifactChanges::from_json(ArtifactKind::Interface, json!({"version": "2"})).unwrap();
    let err = vc
        .checkin(ALICE, Checkin::new(app(), initiative(), interface_changes))
        .unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));

    // lock untouched by rejected checkins
    assert_eq!(vc.query_locks(None).unwrap().len(), 1);
}

#[test]
fn non_admin_override_is_denied() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    let err = vc
        .checkin(
            BOB,
            Checkin::new(app(), initiative(), changes(json!({"name": "X"}))).with_admin_override(),
        )
        .unwrap_err();
    assert!(matches!(err, VcError::PermissionDenied { .. }));
}

#[test]
fn admin_override_checkin_is_audited() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    let commit = vc
        .checkin(
            ADMIN,
            Checkin::new(app(), initiative(), changes(json!({"name": "Ledger II"})))
                .with_admin_override(),
        )
        .unwrap();
    assert_eq!(commit.artifact.name, "Ledger II");

    let trail = vc.audit_trail(Some(&app())).unwrap();
    let checkin = trail
        .iter()
        .find(|e| e.action == AuditAction::Checkin)
        .unwrap();
    assert!(checkin.admin_override);
    assert_eq!(checkin.actor, ADMIN);
}

#[test]
fn view_reflects_lock_holder() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    let ctx = ViewContext::initiative(initiative());

    let mine = vc.read_artifact(ALICE, app(), &ctx).unwrap();
    assert_eq!(mine.state.state, ArtifactState::CheckedOutMe);

    let theirs = vc.read_artifact(BOB, app(), &ctx).unwrap();
    assert_eq!(theirs.state.state, ArtifactState::CheckedOutOther);
    assert_eq!(theirs.state.locked_by_name.as_deref(), Some("user1"));

    let admin = vc.read_artifact(ADMIN, app(), &ctx).unwrap();
    assert_eq!(admin.state.state, ArtifactState::CheckedOutMe);
}

#[test]
fn production_edit_on_other_field_is_rebased() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    vc.update_production(ADMIN, app(), &changes(json!({"lob": "Treasury"})))
        .unwrap();

    let commit = vc
        .checkin(
            ALICE,
            Checkin::new(app(), initiative(), changes(json!({"name": "Ledger II"}))),
        )
        .unwrap();
    assert!(commit.conflict.is_none());
    assert_eq!(commit.shadow.base_revision, 2);
    let fields = commit.shadow.data.to_fields();
    assert_eq!(fields["lob"], "Treasury");
    assert_eq!(fields["name"], "Ledger II");
}

#[test]
fn production_edit_on_same_field_conflicts() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    vc.update_production(ADMIN, app(), &changes(json!({"name": "Ledger Prod"})))
        .unwrap();

    let commit = vc
        .checkin(
            ALICE,
            Checkin::new(app(), initiative(), changes(json!({"name": "Ledger II"}))),
        )
        .unwrap();
    let conflict = commit.conflict.unwrap();
    assert_eq!(conflict.fields.len(), 1);
    assert_eq!(conflict.fields[0].field, "name");
    assert_eq!(conflict.fields[0].production_value, "Ledger Prod");
    assert_eq!(commit.shadow.base_revision, 1);
    assert_eq!(commit.artifact.state.state, ArtifactState::Conflicted);
}

#[test]
fn auto_rebase_off_keeps_old_base() {
    let (vc, _) = service_with(policy(), VcConfig::default().with_auto_rebase(false));
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    vc.update_production(ADMIN, app(), &changes(json!({"lob": "Treasury"})))
        .unwrap();
    let commit = vc
        .checkin(
            ALICE,
            Checkin::new(app(), initiative(), changes(json!({"name": "Ledger II"}))),
        )
        .unwrap();
    assert!(commit.conflict.is_none());
    assert_eq!(commit.shadow.base_revision, 1);
}

#[test]
fn cancel_after_checkin_rolls_back_shadow() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    vc.checkin(
        ALICE,
        Checkin::new(app(), initiative(), changes(json!({"name": "Ledger II"}))),
    )
    .unwrap();
    assert_eq!(vc.initiative_changes(&initiative()).unwrap().len(), 1);

    vc.checkout(ALICE, app(), &initiative()).unwrap();
    vc.cancel_checkout(ALICE, app(), &initiative(), false).unwrap();

    assert!(vc.initiative_changes(&initiative()).unwrap().is_empty());
    let view = vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(initiative()))
        .unwrap();
    assert_eq!(view.name, "Ledger");
    assert_eq!(view.source, ReadSource::Baseline);
}

#[test]
fn release_lock_requires_owner_or_admin() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    assert!(matches!(
        vc.release_lock(BOB, app()),
        Err(VcError::PermissionDenied { .. })
    ));
    assert_eq!(vc.query_locks(None).unwrap().len(), 1);

    let released = vc.release_lock(ADMIN, app()).unwrap();
    assert_eq!(released.map(|l| l.locked_by), Some(ALICE));
    assert!(vc.query_locks(None).unwrap().is_empty());

    let trail = vc.audit_trail(Some(&app())).unwrap();
    let release = trail
        .iter()
        .rfind(|e| e.action == AuditAction::ReleaseLock)
        .unwrap();
    assert_eq!(release.actor, ADMIN);
    assert!(release.admin_override);
    assert_eq!(release.initiative_id, Some(initiative()));

    assert_eq!(vc.release_lock(ADMIN, app()).unwrap(), None);
    assert_eq!(vc.release_lock(ALICE, app()).unwrap(), None);
}

#[test]
fn owner_release_is_not_an_override() {
    let (vc, _) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    let released = vc.release_lock(ALICE, app()).unwrap();
    assert_eq!(released.map(|l| l.locked_by), Some(ALICE));

    let trail = vc.audit_trail(Some(&app())).unwrap();
    let release = trail
        .iter()
        .rfind(|e| e.action == AuditAction::ReleaseLock)
        .unwrap();
    assert!(!release.admin_override);
}

#[test]
fn purge_reclaims_expired_rows() {
    let (vc, clock) = service();
    vc.checkout(ALICE, app(), &initiative()).unwrap();
    assert_eq!(vc.purge_expired_locks().unwrap(), 0);

    clock.advance(vc.config().lock_ttl() + Duration::seconds(1));
    assert!(vc.query_locks(None).unwrap().is_empty());
    assert_eq!(vc.purge_expired_locks().unwrap(), 1);
    assert_eq!(vc.purge_expired_locks().unwrap(), 0);
}

#[test]
fn pending_artifact_stays_out_of_production() {
    let (vc, _) = service();
    let proposed = vc
        .propose_artifact(
            BOB,
            &initiative(),
            ArtifactRecord::from(ApplicationRecord::new("AML-0100", "Forecasting")),
        )
        .unwrap();
    assert_eq!(proposed.artifact.id.0, 8);
    assert_eq!(proposed.artifact_state, LifecycleState::Pending);

    let production = vc
        .list_artifacts(ALICE, ArtifactKind::Application, &ViewContext::production(), &[])
        .unwrap();
    assert_eq!(production.len(), 1);

    let pending = vc
        .list_artifacts(
            ALICE,
            ArtifactKind::Application,
            &ViewContext::production().with_mode(crate::view::ViewMode::Pending),
            &[],
        )
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Forecasting");

    let err = vc
        .update_production(ADMIN, proposed.artifact, &changes(json!({"name": "Y"})))
        .unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));
}

#[test]
fn production_write_without_changes_keeps_revision() {
    let (vc, _) = service();
    let view = vc
        .update_production(ADMIN, app(), &changes(json!({"name": "Ledger"})))
        .unwrap();
    assert_eq!(view.revision, 1);
}
