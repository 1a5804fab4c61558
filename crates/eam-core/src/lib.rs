//! EAM Core - Check-out / Check-in Version Control
//!
//! Pessimistic locking and initiative-scoped versioning for enterprise
//! architecture artifacts.
//!
//! # Core Concepts
//!
//! - [`Lock`]: At most one active lock per artifact, expiring after a TTL
//! - [`ShadowVersion`]: Initiative-scoped copy of an artifact written by checkin
//! - [`Initiative`]: Named change effort whose shadows are promoted on completion
//! - [`derive_state`]: Pure per-viewer classification of an artifact
//! - [`ViewContext`]: Production-view filter deciding which data a read shows
//! - [`DependencyGraph`]: Artifacts linked through record cross-references
//! - [`Store`]: Transactional backend (in-memory or SQLite)
//! - [`VersionControl`]: The service tying it all together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eam_core::prelude::*;
//!
//! let vc = VersionControl::new(MemoryStore::new(), Arc::new(directory));
//! let lock = vc.checkout(alice, app, &"I-100".into())?;
//! let changes = ArtifactChanges::from_json(
//!     ArtifactKind::Application,
//!     serde_json::json!({"name": "Renamed App"}),
//! )?;
//! let commit = vc.checkin(alice, Checkin::new(app, "I-100", changes))?;
//! assert_eq!(commit.artifact.name, "Renamed App");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod audit;
mod clock;
mod config;
mod conflict;
mod dependency;
mod error;
mod history;
mod identity;
mod initiative;
mod lock;
mod merge;
mod service;
mod state;
pub mod store;
mod version;
mod view;

pub use audit::{verify_chain, AuditAction, AuditEntry, AuditEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VcConfig;
pub use conflict::{
    overlapping_fields, Conflict, ConflictField, ConflictId, ConflictStatus, Resolution,
    ResolutionStrategy,
};
pub use dependency::{
    build_graph, AffectedArtifact, ArtifactIndex, ChangeType, CrossInitiativeImpact, CycleSeverity,
    DependencyCycle, DependencyEdge, DependencyGraph, DependencyNode, DependencyType,
    ImpactAnalysis, ImpactReport, IndexedArtifact, OverlapKind, RiskLevel, Strength, MAX_AFFECTED,
    MAX_DEPTH,
};
pub use error::{AuditError, LockConflict, StoreError, VcError};
pub use history::{
    compare_records, ArtifactHistory, FieldChange, RevisionSummary, VersionComparison, VersionRef,
};
pub use identity::{Directory, PermissionPolicy, Role, UserRecord, UserSummary};
pub use initiative::{
    Initiative, InitiativeDetail, InitiativeStatus, NewInitiative, Participant, ParticipantRole,
    Priority,
};
pub use lock::{Lock, LockInfo};
pub use merge::{auto_merge, merge_field, strategy_for_field, FieldMerge, MergeStrategy};
pub use service::{
    ArtifactView, AutoResolved, Checkin, CommitResult, CompletionSummary, ReadSource, VersionControl,
    SYSTEM_USER,
};
pub use state::{
    count_by_state, derive_state, filter_by_state, ArtifactState, ArtifactStateView, StateInputs,
    Viewer,
};
pub use store::{MemoryStore, SqliteStore, Store, StoreBackend, StoreTx};
pub use version::{BaselineEntry, ShadowVersion};
pub use view::{is_pending, is_visible, ViewContext, ViewMode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used items
pub mod prelude {
    pub use crate::{
        ArtifactState, ArtifactView, Checkin, Conflict, Directory, Initiative, InitiativeStatus,
        Lock, MemoryStore, NewInitiative, ParticipantRole, Resolution, Role, SqliteStore, Store,
        UserRecord, VcConfig, VcError, VersionControl, ViewContext, ViewMode,
    };
    pub use eam_artifact::{
        ArtifactChanges, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, UserId,
    };
}
