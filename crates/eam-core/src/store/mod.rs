//! Persistent store
//!
//! Every service operation runs inside one [`Store::transaction`]: either all
//! of its writes commit or none do. Lock insertion is insert-or-fail, which
//! together with the transaction's isolation serialises concurrent checkouts
//! of the same artifact.
//!
//! ## Tables
//!
//! - `locks` - at most one row per artifact
//! - `baselines` - production rows, plus the revision history of each
//! - `shadows` - one row per (artifact, initiative)
//! - `initiatives`, `participants`
//! - `conflicts`
//! - `audit` - hash-chained event log

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactId, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, UserId};

use crate::audit::AuditEvent;
use crate::conflict::{Conflict, ConflictId};
use crate::error::{StoreError, VcError};
use crate::initiative::{Initiative, Participant};
use crate::lock::Lock;
use crate::version::{BaselineEntry, ShadowVersion};

/// Table access within one transaction
pub trait StoreTx {
    // -- locks ---------------------------------------------------------------

    /// Lock row for `artifact`, expired or not
    fn lock(&mut self, artifact: &ArtifactRef) -> Result<Option<Lock>, StoreError>;

    /// Insert a lock row
    ///
    /// # Errors
    /// Returns [`StoreError::LockExists`] if a row for the artifact exists
    fn insert_lock(&mut self, lock: &Lock) -> Result<(), StoreError>;

    fn delete_lock(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError>;

    /// All lock rows, optionally for one initiative
    fn locks(&mut self, initiative: Option<&InitiativeId>) -> Result<Vec<Lock>, StoreError>;

    /// Remove rows with `lock_expiry < now`
    fn delete_expired_locks(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    // -- baselines -----------------------------------------------------------

    fn baseline(&mut self, artifact: &ArtifactRef) -> Result<Option<BaselineEntry>, StoreError>;

    fn baselines(&mut self, kind: ArtifactKind) -> Result<Vec<BaselineEntry>, StoreError>;

    /// Upsert a baseline row and record `entry.record` as revision `entry.revision`
    fn put_baseline(&mut self, entry: &BaselineEntry) -> Result<(), StoreError>;

    fn delete_baseline(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError>;

    /// Record as it was at `revision`
    fn revision(
        &mut self,
        artifact: &ArtifactRef,
        revision: u64,
    ) -> Result<Option<ArtifactRecord>, StoreError>;

    /// Every recorded production revision of `artifact`, oldest first
    fn revisions(&mut self, artifact: &ArtifactRef) -> Result<Vec<BaselineEntry>, StoreError>;

    /// Allocate the next id for `kind`
    fn next_artifact_id(&mut self, kind: ArtifactKind) -> Result<ArtifactId, StoreError>;

    // -- shadows -------------------------------------------------------------

    fn shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<Option<ShadowVersion>, StoreError>;

    fn shadows_for_initiative(
        &mut self,
        initiative: &InitiativeId,
    ) -> Result<Vec<ShadowVersion>, StoreError>;

    fn shadows_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<ShadowVersion>, StoreError>;

    fn put_shadow(&mut self, shadow: &ShadowVersion) -> Result<(), StoreError>;

    fn delete_shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<bool, StoreError>;

    // -- initiatives ---------------------------------------------------------

    fn initiative(&mut self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError>;

    fn initiatives(&mut self) -> Result<Vec<Initiative>, StoreError>;

    fn put_initiative(&mut self, initiative: &Initiative) -> Result<(), StoreError>;

    fn participants(&mut self, id: &InitiativeId) -> Result<Vec<Participant>, StoreError>;

    fn participant(
        &mut self,
        id: &InitiativeId,
        user: UserId,
    ) -> Result<Option<Participant>, StoreError>;

    fn put_participant(&mut self, participant: &Participant) -> Result<(), StoreError>;

    // -- conflicts -----------------------------------------------------------

    fn conflict(&mut self, id: &ConflictId) -> Result<Option<Conflict>, StoreError>;

    fn conflicts(&mut self, initiative: &InitiativeId) -> Result<Vec<Conflict>, StoreError>;

    /// Conflicts touching `artifact` across all initiatives
    fn conflicts_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<Conflict>, StoreError>;

    fn put_conflict(&mut self, conflict: &Conflict) -> Result<(), StoreError>;

    fn delete_conflicts(&mut self, initiative: &InitiativeId) -> Result<usize, StoreError>;

    // -- audit ---------------------------------------------------------------

    fn last_audit(&mut self) -> Result<Option<AuditEvent>, StoreError>;

    fn append_audit(&mut self, event: &AuditEvent) -> Result<(), StoreError>;

    /// Events oldest first, optionally for one artifact
    fn audit(&mut self, artifact: Option<&ArtifactRef>) -> Result<Vec<AuditEvent>, StoreError>;
}

/// Transactional store
pub trait Store: Send + Sync {
    /// Run `f` in one transaction; commit on `Ok`, roll back on `Err`
    ///
    /// # Errors
    /// Returns `f`'s error, or a [`StoreError`] from begin/commit
    fn transaction<R, F>(&self, f: F) -> Result<R, VcError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, VcError>;
}

/// Backend chosen at startup
#[derive(Debug)]
pub enum StoreBackend {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store for StoreBackend {
    fn transaction<R, F>(&self, f: F) -> Result<R, VcError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, VcError>,
    {
        match self {
            Self::Memory(store) => store.transaction(f),
            Self::Sqlite(store) => store.transaction(f),
        }
    }
}

impl<S: Store> Store for std::sync::Arc<S> {
    fn transaction<R, F>(&self, f: F) -> Result<R, VcError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, VcError>,
    {
        (**self).transaction(f)
    }
}
