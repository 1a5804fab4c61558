//! Conflicts between production edits and initiative edits

use chrono::{DateTime, Utc};
use eam_artifact::{field_value, ArtifactRecord, ArtifactRef, FieldSet, InitiativeId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Conflict identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(pub String);

impl ConflictId {
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("CONF-{}", ulid::Ulid::new()))
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    KeepInitiative,
    AcceptProduction,
    Manual,
    AutoMerge,
}

/// One field both sides changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictField {
    pub field: String,
    pub base_value: Value,
    pub production_value: Value,
    pub initiative_value: Value,
}

/// Overlap between production and initiative edits on one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub id: ConflictId,
    pub initiative_id: InitiativeId,
    pub artifact: ArtifactRef,
    pub fields: Vec<ConflictField>,
    pub status: ConflictStatus,
    /// Production revision the conflict was detected against
    pub production_revision: u64,
    pub resolution: Option<ResolutionStrategy>,
    pub detected_at: DateTime<Utc>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ConflictStatus::Pending
    }

    #[must_use]
    pub fn field_names(&self) -> FieldSet {
        self.fields.iter().map(|f| f.field.clone()).collect()
    }
}

/// Resolution requested by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Resolution {
    /// Initiative values win
    KeepInitiative,
    /// Production values replace the initiative's for the conflicting fields
    AcceptProduction,
    /// Explicit values for the conflicting fields
    Manual { values: Map<String, Value> },
    /// Per-field merge strategies; refused while any field needs review
    /// unless `accept_review` is set
    AutoMerge {
        #[serde(default, rename = "acceptReview")]
        accept_review: bool,
    },
}

impl Resolution {
    #[must_use]
    pub fn strategy(&self) -> ResolutionStrategy {
        match self {
            Self::KeepInitiative => ResolutionStrategy::KeepInitiative,
            Self::AcceptProduction => ResolutionStrategy::AcceptProduction,
            Self::Manual { .. } => ResolutionStrategy::Manual,
            Self::AutoMerge { .. } => ResolutionStrategy::AutoMerge,
        }
    }
}

/// Three-way comparison of one artifact
///
/// Returns the fields changed on both sides since `base` whose final values
/// differ. Fields both sides set to the same value do not conflict.
#[must_use]
pub fn overlapping_fields(
    base: &ArtifactRecord,
    production: &ArtifactRecord,
    initiative: &ArtifactRecord,
    initiative_fields: &FieldSet,
) -> Vec<ConflictField> {
    let base = base.to_fields();
    let production = production.to_fields();
    let initiative = initiative.to_fields();
    let production_fields = eam_artifact::changed_fields(&base, &production);

    production_fields
        .intersection(initiative_fields)
        .filter_map(|field| {
            let production_value = field_value(&production, field);
            let initiative_value = field_value(&initiative, field);
            (production_value != initiative_value).then(|| ConflictField {
                field: field.clone(),
                base_value: field_value(&base, field),
                production_value,
                initiative_value,
            })
        })
        .collect()
}
