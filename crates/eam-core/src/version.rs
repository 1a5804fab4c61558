//! Baseline rows and initiative-scoped shadow versions

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRecord, ArtifactRef, FieldSet, InitiativeId, LifecycleState, UserId, VersionState};
use serde::{Deserialize, Serialize};

/// Production representation of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineEntry {
    pub artifact: ArtifactRef,
    pub record: ArtifactRecord,
    pub artifact_state: LifecycleState,
    /// Initiative that proposed this artifact, if any
    pub initiative_origin: Option<InitiativeId>,
    /// Bumped on every production write
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: UserId,
}

impl BaselineEntry {
    /// Placeholder proposed by `initiative`, not yet promoted
    #[inline]
    #[must_use]
    pub fn is_pending_from(&self, initiative: &InitiativeId) -> bool {
        self.artifact_state == LifecycleState::Pending
            && self.initiative_origin.as_ref() == Some(initiative)
    }
}

/// Initiative-scoped copy of an artifact produced by checkin
///
/// At most one exists per `(artifact, initiative_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowVersion {
    pub artifact: ArtifactRef,
    pub initiative_id: InitiativeId,
    pub data: ArtifactRecord,
    /// Baseline revision the shadow is relative to
    pub base_revision: u64,
    /// Cumulative fields changed relative to `base_revision`
    pub changed_fields: FieldSet,
    pub version_state: VersionState,
    pub version_number: u32,
    pub change_description: Option<String>,
    pub updated_by: UserId,
    pub updated_at: DateTime<Utc>,
}
