//! Hash-chained audit trail of version-control actions
//!
//! Every event links to its predecessor through `prev_hash`; `hash` is the
//! SHA-256 of the event's fields and `prev_hash`. Events are appended inside
//! the same store transaction as the action they record.

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRef, InitiativeId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuditError;

const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Checkout,
    Checkin,
    CancelCheckout,
    ReleaseLock,
    LocksPurged,
    InitiativeCreated,
    InitiativeStatus,
    ParticipantAdded,
    InitiativeCompleted,
    InitiativeAbandoned,
    ConflictDetected,
    ConflictResolved,
    ProductionWrite,
    ArtifactProposed,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Checkin => "checkin",
            Self::CancelCheckout => "cancel_checkout",
            Self::ReleaseLock => "release_lock",
            Self::LocksPurged => "locks_purged",
            Self::InitiativeCreated => "initiative_created",
            Self::InitiativeStatus => "initiative_status",
            Self::ParticipantAdded => "participant_added",
            Self::InitiativeCompleted => "initiative_completed",
            Self::InitiativeAbandoned => "initiative_abandoned",
            Self::ConflictDetected => "conflict_detected",
            Self::ConflictResolved => "conflict_resolved",
            Self::ProductionWrite => "production_write",
            Self::ArtifactProposed => "artifact_proposed",
        }
    }
}

/// Event before it is sealed into the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor: UserId,
    pub artifact: Option<ArtifactRef>,
    pub initiative_id: Option<InitiativeId>,
    pub admin_override: bool,
    pub detail: String,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction, actor: UserId) -> Self {
        Self {
            action,
            actor,
            artifact: None,
            initiative_id: None,
            admin_override: false,
            detail: String::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn artifact(mut self, artifact: ArtifactRef) -> Self {
        self.artifact = Some(artifact);
        self
    }

    #[inline]
    #[must_use]
    pub fn initiative(mut self, initiative: &InitiativeId) -> Self {
        self.initiative_id = Some(initiative.clone());
        self
    }

    #[inline]
    #[must_use]
    pub fn admin_override(mut self, used: bool) -> Self {
        self.admin_override = used;
        self
    }

    #[inline]
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Sealed audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub actor: UserId,
    pub artifact: Option<ArtifactRef>,
    pub initiative_id: Option<InitiativeId>,
    pub admin_override: bool,
    pub detail: String,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEvent {
    /// Seal `entry` after `prev`
    #[must_use]
    pub fn seal(entry: AuditEntry, prev: Option<&AuditEvent>, timestamp: DateTime<Utc>) -> Self {
        let mut event = Self {
            sequence: prev.map_or(1, |p| p.sequence + 1),
            timestamp,
            action: entry.action,
            actor: entry.actor,
            artifact: entry.artifact,
            initiative_id: entry.initiative_id,
            admin_override: entry.admin_override,
            detail: entry.detail,
            prev_hash: prev.map_or_else(|| GENESIS.to_string(), |p| p.hash.clone()),
            hash: String::new(),
        };
        event.hash = compute_hash(&event);
        event
    }
}

/// Verify back-links and hashes of a full chain, oldest first
///
/// # Errors
/// Returns [`AuditError::IntegrityViolation`] at the first bad event
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), AuditError> {
    let mut prev = GENESIS.to_string();
    for e in events {
        if e.prev_hash != prev || e.hash != compute_hash(e) {
            return Err(AuditError::IntegrityViolation(e.sequence));
        }
        prev.clone_from(&e.hash);
    }
    Ok(())
}

fn compute_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(event.timestamp.timestamp_millis().to_le_bytes());
    hasher.update(event.action.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(event.actor.0.to_le_bytes());
    if let Some(artifact) = &event.artifact {
        hasher.update(artifact.to_string().as_bytes());
    }
    hasher.update([0]);
    if let Some(initiative) = &event.initiative_id {
        hasher.update(initiative.as_str().as_bytes());
    }
    hasher.update([0]);
    hasher.update([u8::from(event.admin_override)]);
    hasher.update(event.detail.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eam_artifact::ArtifactKind;

    fn chain(n: usize) -> Vec<AuditEvent> {
        let mut events: Vec<AuditEvent> = Vec::new();
        for i in 0..n {
            let entry = AuditEntry::new(AuditAction::Checkout, UserId(1))
                .artifact(ArtifactRef::new(ArtifactKind::Application, 42))
                .initiative(&"I-100".into())
                .detail(format!("step {i}"));
            let event = AuditEvent::seal(entry, events.last(), Utc::now());
            events.push(event);
        }
        events
    }

    #[test]
    fn sealed_chain_verifies() {
        let events = chain(4);
        assert_eq!(events[0].prev_hash, GENESIS);
        assert_eq!(events[3].sequence, 4);
        assert!(verify_chain(&events).is_ok());
    }

    #[test]
    fn tampered_detail_breaks_chain() {
        let mut events = chain(3);
        events[1].detail = "rewritten".into();
        assert_eq!(verify_chain(&events), Err(AuditError::IntegrityViolation(2)));
    }

    #[test]
    fn removed_event_breaks_chain() {
        let mut events = chain(3);
        events.remove(1);
        assert_eq!(verify_chain(&events), Err(AuditError::IntegrityViolation(3)));
    }
}
