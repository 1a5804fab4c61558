//! Testing utilities for the EAM workspace
//!
//! Shared users, fixtures and a seeded service.

#![allow(missing_docs)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use eam_artifact::{
    ApplicationRecord, ArtifactChanges, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId,
    LifecycleState, UserId,
};
use eam_core::{
    BaselineEntry, Directory, ManualClock, MemoryStore, NewInitiative, ParticipantRole, Role,
    Store, UserRecord, VcConfig, VersionControl,
};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);
pub const VIEWER: UserId = UserId(5);
pub const ADMIN: UserId = UserId(9);

pub const APP_ID: i64 = 42;

pub fn directory() -> Directory {
    Directory::new([
        UserRecord::new(ALICE, "alice", Role::Editor),
        UserRecord::new(BOB, "bob", Role::Editor),
        UserRecord::new(CAROL, "carol", Role::Architect),
        UserRecord::new(VIEWER, "victor", Role::Viewer),
        UserRecord::new(ADMIN, "admin", Role::Admin),
    ])
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

pub fn app() -> ArtifactRef {
    ArtifactRef::new(ArtifactKind::Application, APP_ID)
}

pub fn i100() -> InitiativeId {
    InitiativeId::from("I-100")
}

pub fn i200() -> InitiativeId {
    InitiativeId::from("I-200")
}

pub fn sample_application() -> ApplicationRecord {
    let mut record = ApplicationRecord::new("AML-0042", "Billing");
    record.lob = Some("Retail".to_string());
    record.team = Some("Payments".to_string());
    record
}

/// Application changes from a JSON patch
pub fn app_changes(json: serde_json::Value) -> ArtifactChanges {
    ArtifactChanges::from_json(ArtifactKind::Application, json).unwrap()
}

pub fn rename(name: &str) -> ArtifactChanges {
    app_changes(serde_json::json!({ "name": name }))
}

/// Service plus the clock driving it
pub struct Harness<S: Store> {
    pub vc: VersionControl<S>,
    pub clock: Arc<ManualClock>,
}

impl<S: Store> Harness<S> {
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Service over `store` with application #42 in production and two open
/// initiatives: I-100 led by alice, I-200 led by bob
pub fn seeded<S: Store>(store: S, config: VcConfig) -> Harness<S> {
    let clock = Arc::new(ManualClock::new(start_time()));
    let vc = VersionControl::new(store, Arc::new(directory()))
        .with_clock(clock.clone())
        .with_config(config);

    let now = start_time();
    vc.store()
        .transaction(|tx| {
            tx.put_baseline(&BaselineEntry {
                artifact: app(),
                record: ArtifactRecord::from(sample_application()),
                artifact_state: LifecycleState::Active,
                initiative_origin: None,
                revision: 1,
                updated_at: now,
                updated_by: ADMIN,
            })?;
            Ok(())
        })
        .unwrap();

    vc.create_initiative(ALICE, NewInitiative::new("Billing revamp").with_id("I-100"))
        .unwrap();
    vc.create_initiative(BOB, NewInitiative::new("Cloud migration").with_id("I-200"))
        .unwrap();
    vc.add_participant(ALICE, &i100(), CAROL, ParticipantRole::Developer)
        .unwrap();

    Harness { vc, clock }
}

pub fn seeded_service() -> Harness<MemoryStore> {
    seeded(MemoryStore::new(), VcConfig::default())
}
