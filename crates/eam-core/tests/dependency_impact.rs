//! Dependency graphs and impact reports over seeded cross-references.
//!
//! Application #42 provides an interface to a second application; I-100
//! renames #42 and proposes an activity hosted on it.

use eam_core::prelude::*;
use eam_core::{DependencyType, OverlapKind, RiskLevel};
use eam_test_utils::{app, i100, i200, rename, seeded_service, Harness, ADMIN, ALICE, BOB};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Landscape {
    ledger: ArtifactRef,
    iface: ArtifactRef,
    activity: ArtifactRef,
}

fn landscape(h: &Harness<MemoryStore>) -> Landscape {
    let ledger = h
        .vc
        .create_artifact(
            ADMIN,
            ArtifactRecord::from(eam_artifact::ApplicationRecord::new("AML-0060", "Ledger")),
        )
        .unwrap()
        .artifact;
    let iface_record = ArtifactRecord::from_json(
        ArtifactKind::Interface,
        json!({
            "imlNumber": "IML-0042",
            "interfaceType": "REST",
            "version": "1.0",
            "providerApplicationId": 42,
            "consumerApplicationId": ledger.id.0,
        }),
    )
    .unwrap();
    let iface = h.vc.create_artifact(ADMIN, iface_record).unwrap().artifact;

    h.vc.checkout(ALICE, app(), &i100()).unwrap();
    h.vc.checkin(ALICE, Checkin::new(app(), i100(), rename("Billing Next")))
        .unwrap();

    let activity_record = ArtifactRecord::from_json(
        ArtifactKind::InternalActivity,
        json!({"applicationId": 42, "activityName": "Post invoice", "activityType": "batch"}),
    )
    .unwrap();
    let activity = h
        .vc
        .propose_artifact(ALICE, &i100(), activity_record)
        .unwrap()
        .artifact;

    Landscape {
        ledger,
        iface,
        activity,
    }
}

/// The graph uses the initiative's own data and proposals.
#[test]
fn graph_reflects_initiative_view() {
    let h = seeded_service();
    let l = landscape(&h);

    let graph = h.vc.dependency_graph(&i100(), app()).unwrap();
    assert_eq!(graph.root, app());
    assert_eq!(graph.nodes[0].name, "Billing Next");
    assert!(graph.nodes[0].modified_in_initiative);

    let reached: Vec<ArtifactRef> = graph.nodes.iter().map(|n| n.artifact).collect();
    assert!(reached.contains(&l.iface));
    assert!(reached.contains(&l.ledger));
    assert!(reached.contains(&l.activity));
    let activity = graph.nodes.iter().find(|n| n.artifact == l.activity).unwrap();
    assert_eq!(activity.revision, 0);
    assert!(graph
        .edges
        .iter()
        .any(|e| e.from == app() && e.to == l.iface && e.dependency_type == DependencyType::Provides));
    assert!(graph.cycles.is_empty());

    // another initiative sees production data and no proposal
    let other = h.vc.dependency_graph(&i200(), app()).unwrap();
    assert_eq!(other.nodes[0].name, "Billing");
    assert!(!other.nodes[0].modified_in_initiative);
    assert!(other.nodes.iter().all(|n| n.artifact != l.activity));

    let err = h.vc.dependency_graph(&i200(), l.activity).unwrap_err();
    assert!(matches!(err, VcError::ArtifactNotFound(_)));
    let err = h.vc.dependency_graph(&"I-404".into(), app()).unwrap_err();
    assert!(matches!(err, VcError::InitiativeNotFound(_)));
}

/// The report covers every change and names the overlapping initiative.
#[test]
fn impact_report_flags_other_initiatives() {
    let h = seeded_service();
    let l = landscape(&h);
    h.vc.checkout(BOB, l.iface, &i200()).unwrap();

    let report = h.vc.impact_report(&i100()).unwrap();
    assert_eq!(report.changed_artifacts, 2);
    // #42, the interface, the ledger and the activity
    assert_eq!(report.total_impacts, 4);
    assert_eq!(report.cross_initiative_impacts.len(), 1);
    let overlap = &report.cross_initiative_impacts[0];
    assert_eq!(overlap.initiative_id, i200());
    assert_eq!(overlap.artifact, l.iface);
    assert_eq!(overlap.name, "IML-0042");
    assert_eq!(overlap.overlap, OverlapKind::Locked);
    assert_eq!(report.risk_level, RiskLevel::Medium);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("Interface changes")));

    // an initiative with no changes has nothing to report
    h.vc.cancel_checkout(BOB, l.iface, &i200(), false).unwrap();
    let quiet = h.vc.impact_report(&i200()).unwrap();
    assert_eq!(quiet.changed_artifacts, 0);
    assert_eq!(quiet.total_impacts, 0);
    assert_eq!(quiet.risk_level, RiskLevel::Low);
    assert!(quiet.recommendations.is_empty());
}
