//! Functional tests for the initiative lifecycle.
//!
//! Divergence handling (rebase and conflicts), completion, abandonment and
//! the audit trail that records them.

use eam_core::prelude::*;
use eam_core::{ArtifactState, AuditAction, ConflictStatus, MergeStrategy, ResolutionStrategy};
use eam_test_utils::{
    app, app_changes, i100, i200, rename, seeded_service, Harness, ADMIN, ALICE, BOB, CAROL,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn commit_rename(h: &Harness<MemoryStore>, name: &str) {
    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    h.vc.checkin(ALICE, Checkin::new(app(), i100(), rename(name)))
        .unwrap();
}

/// Production changed a different field: detection rebases, no conflict.
#[test]
fn disjoint_production_edit_is_rebased() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    h.vc.update_production(ADMIN, app(), &app_changes(json!({"team": "Core"})))
        .unwrap();

    let pending = h.vc.detect_conflicts(ALICE, &i100()).unwrap();
    assert!(pending.is_empty());

    let changes = h.vc.initiative_changes(&i100()).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].base_revision, 2);
    let fields = changes[0].data.to_fields();
    assert_eq!(fields["team"], "Core");
    assert_eq!(fields["name"], "Billing Hub");
}

/// Overlapping edit blocks completion until the conflict is resolved.
#[test]
fn conflict_blocks_completion() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    h.vc.update_production(ADMIN, app(), &rename("Billing Prod"))
        .unwrap();

    let err = h.vc.complete_initiative(ALICE, &i100()).unwrap_err();
    assert!(matches!(err, VcError::UnresolvedConflicts { count: 1, .. }));
    assert!(err.requires_human());

    // detection done by the failed completion is kept
    let conflicts = h.vc.list_conflicts(&i100()).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].status, ConflictStatus::Pending);

    let view = h
        .vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(i100()))
        .unwrap();
    assert_eq!(view.state.state, ArtifactState::Conflicted);

    let resolved = h
        .vc
        .resolve_conflict(ALICE, &conflicts[0].id, Resolution::KeepInitiative)
        .unwrap();
    assert_eq!(resolved.resolution, Some(ResolutionStrategy::KeepInitiative));

    let summary = h.vc.complete_initiative(ALICE, &i100()).unwrap();
    assert_eq!(summary.initiative.status, InitiativeStatus::Completed);

    let production = h
        .vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(production.name, "Billing Hub");
    assert_eq!(production.revision, 3);
}

/// Accepting production drops the initiative's value for the conflicting field.
#[test]
fn accept_production_takes_production_value() {
    let h = seeded_service();
    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    h.vc.checkin(
        ALICE,
        Checkin::new(
            app(),
            i100(),
            app_changes(json!({"name": "Billing Hub", "lob": "Corporate"})),
        ),
    )
    .unwrap();
    h.vc.update_production(ADMIN, app(), &rename("Billing Prod"))
        .unwrap();

    let pending = h.vc.detect_conflicts(ALICE, &i100()).unwrap();
    assert_eq!(pending.len(), 1);
    h.vc.resolve_conflict(ALICE, &pending[0].id, Resolution::AcceptProduction)
        .unwrap();

    let shadow = &h.vc.initiative_changes(&i100()).unwrap()[0];
    let fields = shadow.data.to_fields();
    assert_eq!(fields["name"], "Billing Prod");
    assert_eq!(fields["lob"], "Corporate");
    assert_eq!(shadow.base_revision, 2);
    assert!(!shadow.changed_fields.contains("name"));
}

/// Manual resolution may only name conflicting fields.
#[test]
fn manual_resolution_sets_explicit_values() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    h.vc.update_production(ADMIN, app(), &rename("Billing Prod"))
        .unwrap();
    let pending = h.vc.detect_conflicts(ALICE, &i100()).unwrap();

    let mut stray = serde_json::Map::new();
    stray.insert("team".into(), json!("Other"));
    let err = h
        .vc
        .resolve_conflict(ALICE, &pending[0].id, Resolution::Manual { values: stray })
        .unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));

    let mut values = serde_json::Map::new();
    values.insert("name".into(), json!("Billing Platform"));
    h.vc.resolve_conflict(ALICE, &pending[0].id, Resolution::Manual { values })
        .unwrap();

    let view = h
        .vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(i100()))
        .unwrap();
    assert_eq!(view.name, "Billing Platform");
    assert_eq!(view.state.state, ArtifactState::InitiativeChanges);

    let again = h
        .vc
        .resolve_conflict(ALICE, &pending[0].id, Resolution::KeepInitiative)
        .unwrap_err();
    assert!(matches!(again, VcError::Validation(_)));
}

/// Status and description conflicts merge automatically, per field.
#[test]
fn auto_merge_resolves_by_field_strategy() {
    let h = seeded_service();
    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    h.vc.checkin(
        ALICE,
        Checkin::new(
            app(),
            i100(),
            app_changes(json!({"status": "in_progress", "description": "Billing"})),
        ),
    )
    .unwrap();
    h.vc.update_production(
        ADMIN,
        app(),
        &app_changes(json!({"status": "maintenance", "description": "Billing and invoicing"})),
    )
    .unwrap();

    let pending = h.vc.detect_conflicts(ALICE, &i100()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fields.len(), 2);

    let err = h
        .vc
        .auto_resolve_conflict(ALICE, &i200(), &pending[0].id, false)
        .unwrap_err();
    assert!(matches!(err, VcError::ConflictNotFound(_)));

    let outcome = h
        .vc
        .auto_resolve_conflict(ALICE, &i100(), &pending[0].id, false)
        .unwrap();
    assert_eq!(outcome.conflict.resolution, Some(ResolutionStrategy::AutoMerge));
    let strategies: Vec<_> = outcome.merges.iter().map(|m| (m.field.as_str(), m.strategy)).collect();
    assert_eq!(
        strategies,
        vec![
            ("description", MergeStrategy::Concatenate),
            ("status", MergeStrategy::StateMachine),
        ]
    );
    assert!(outcome.merges.iter().all(|m| !m.requires_review));

    let shadow = &h.vc.initiative_changes(&i100()).unwrap()[0];
    let fields = shadow.data.to_fields();
    assert_eq!(fields["status"], "in_progress");
    assert_eq!(fields["description"], "Billing and invoicing");
    assert_eq!(shadow.base_revision, 2);

    let trail = h.vc.audit_trail(Some(&app())).unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, AuditAction::ConflictResolved);
    assert!(last.detail.contains("status=StateMachine"));
}

/// A field without an automatic rule needs review before auto-merge applies.
#[test]
fn auto_merge_refuses_unreviewed_fields() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    h.vc.update_production(ADMIN, app(), &rename("Billing Prod"))
        .unwrap();
    let pending = h.vc.detect_conflicts(ALICE, &i100()).unwrap();

    let err = h
        .vc
        .resolve_conflict(
            ALICE,
            &pending[0].id,
            Resolution::AutoMerge {
                accept_review: false,
            },
        )
        .unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));
    assert!(h.vc.list_conflicts(&i100()).unwrap()[0].is_pending());

    let outcome = h
        .vc
        .auto_resolve_conflict(ALICE, &i100(), &pending[0].id, true)
        .unwrap();
    assert_eq!(outcome.merges[0].strategy, MergeStrategy::Manual);
    assert!(outcome.merges[0].requires_review);

    let view = h
        .vc
        .read_artifact(ALICE, app(), &ViewContext::initiative(i100()))
        .unwrap();
    assert_eq!(view.name, "Billing Prod");
}

/// A proposed artifact becomes active production on completion.
#[test]
fn completion_promotes_proposed_artifact() {
    let h = seeded_service();
    let record = ArtifactRecord::from(eam_artifact::ApplicationRecord::new("AML-0050", "Ledger"));
    let proposed = h.vc.propose_artifact(CAROL, &i100(), record).unwrap();
    assert_eq!(proposed.state.state, ArtifactState::InitiativeChanges);

    // other initiatives may not touch it
    let err = h.vc.checkout(BOB, proposed.artifact, &i200()).unwrap_err();
    assert!(matches!(err, VcError::Validation(_)));

    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    let summary = h.vc.complete_initiative(ALICE, &i100()).unwrap();
    assert_eq!(summary.promoted, vec![proposed.artifact]);
    assert_eq!(summary.released_locks, 1);

    let listed = h
        .vc
        .list_artifacts(BOB, ArtifactKind::Application, &ViewContext::production(), &[])
        .unwrap();
    assert_eq!(listed.len(), 2);
    let ledger = listed
        .iter()
        .find(|v| v.artifact == proposed.artifact)
        .unwrap();
    assert_eq!(ledger.state.state, ArtifactState::Production);
    assert_eq!(ledger.initiative_origin, None);
    assert!(h.vc.query_locks(None).unwrap().is_empty());
}

/// Abandoning discards shadows, locks and pending artifacts, never production.
#[test]
fn abandon_discards_everything() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    let record = ArtifactRecord::from(eam_artifact::ApplicationRecord::new("AML-0051", "Scratch"));
    let proposed = h.vc.propose_artifact(ALICE, &i100(), record).unwrap();
    h.vc.checkout(ALICE, app(), &i100()).unwrap();

    let abandoned = h.vc.abandon_initiative(ALICE, &i100()).unwrap();
    assert_eq!(abandoned.status, InitiativeStatus::Abandoned);

    assert!(h.vc.query_locks(None).unwrap().is_empty());
    assert!(matches!(
        h.vc.read_artifact(ALICE, proposed.artifact, &ViewContext::production()),
        Err(VcError::ArtifactNotFound(_))
    ));
    let production = h
        .vc
        .read_artifact(BOB, app(), &ViewContext::production())
        .unwrap();
    assert_eq!(production.name, "Billing");
    assert_eq!(production.revision, 1);
    assert_eq!(production.state.state, ArtifactState::Production);

    let err = h.vc.checkout(ALICE, app(), &i100()).unwrap_err();
    assert_eq!(err.code(), "initiative_closed");
}

/// Only leads (or admins) complete; terminal statuses do not move.
#[test]
fn lifecycle_permissions_and_transitions() {
    let h = seeded_service();
    let err = h.vc.complete_initiative(CAROL, &i100()).unwrap_err();
    assert!(matches!(err, VcError::PermissionDenied { .. }));

    let review = h
        .vc
        .set_initiative_status(ALICE, &i100(), InitiativeStatus::Review)
        .unwrap();
    assert_eq!(review.status, InitiativeStatus::Review);

    let err = h
        .vc
        .set_initiative_status(ALICE, &i100(), InitiativeStatus::Draft)
        .unwrap_err();
    assert_eq!(err.code(), "illegal_transition");

    h.vc.set_initiative_status(ADMIN, &i100(), InitiativeStatus::Completed)
        .unwrap();
    let err = h
        .vc
        .set_initiative_status(ALICE, &i100(), InitiativeStatus::Active)
        .unwrap_err();
    assert_eq!(err.code(), "illegal_transition");

    let open = h.vc.list_initiatives(Some(InitiativeStatus::Active)).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].initiative_id, i200());
}

/// Every mutation lands in the audit chain, and the chain verifies.
#[test]
fn audit_chain_verifies() {
    let h = seeded_service();
    commit_rename(&h, "Billing Hub");
    h.vc.complete_initiative(ALICE, &i100()).unwrap();

    let checked = h.vc.verify_audit().unwrap();
    assert!(checked >= 6);

    let actions: Vec<AuditAction> = h
        .vc
        .audit_trail(Some(&app()))
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Checkout, AuditAction::Checkin]);
}
