//! EAM Artifact System
//!
//! Typed architecture artifacts with per-kind partial updates.
//!
//! # Core Concepts
//!
//! - [`ArtifactKind`]: Closed set of versioned artifact kinds
//! - [`ArtifactType`]: Sealed adapter binding a kind to its record and patch types
//! - [`ArtifactRecord`]: Full record of any kind
//! - [`ArtifactChanges`]: Validated partial update of any kind
//! - [`FieldSet`]: camelCase field names produced by diffs and patches
//!
//! # Example
//!
//! ```rust,ignore
//! use eam_artifact::{ArtifactChanges, ArtifactKind, ArtifactRecord, ApplicationRecord};
//!
//! let mut record: ArtifactRecord = ApplicationRecord::new("AML-0042", "Billing").into();
//! let changes = ArtifactChanges::from_json(
//!     ArtifactKind::Application,
//!     serde_json::json!({"name": "Renamed App"}),
//! )?;
//! let changed = record.apply(&changes)?;
//! assert!(changed.contains("name"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod diff;
mod kind;
mod patch;
mod record;
mod records;
mod state;

pub use artifact::{ArtifactType, ValidationError};
pub use diff::{changed_fields, field_value, FieldSet};
pub use kind::{ArtifactId, ArtifactKind, ArtifactRef, InitiativeId, Reference, Relation, UserId};
pub use record::{ArtifactChanges, ArtifactRecord};
pub use records::{
    ApplicationArtifact, ApplicationPatch, ApplicationRecord, BusinessProcessArtifact,
    BusinessProcessPatch, BusinessProcessRecord, ChangeRequestArtifact, ChangeRequestPatch,
    ChangeRequestRecord, Criticality, InterfaceArtifact, InterfacePatch, InterfaceRecord,
    InternalActivityArtifact, InternalActivityPatch, InternalActivityRecord,
    TechnicalProcessArtifact, TechnicalProcessPatch, TechnicalProcessRecord,
};
pub use state::{LifecycleState, VersionState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
