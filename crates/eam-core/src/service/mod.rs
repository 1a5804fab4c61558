//! Version-control service
//!
//! [`VersionControl`] owns a [`Store`], a [`PermissionPolicy`] and a
//! [`Clock`]. Each public operation validates its input, runs in a single
//! store transaction, and appends one or more audit events in that same
//! transaction.
//!
//! Operations are grouped by concern:
//! - `locks` - checkout, checkin, cancel, lock queries and cleanup
//! - `initiatives` - initiative lifecycle and promotion
//! - `conflicts` - divergence detection and resolution
//! - `artifacts` - production writes, proposals and contextual reads
//! - `history` - revision history and version comparison
//! - `dependencies` - dependency graphs and initiative impact reports

mod artifacts;
mod conflicts;
mod dependencies;
mod history;
mod initiatives;
mod locks;

pub use conflicts::AutoResolved;
pub use initiatives::CompletionSummary;
pub use locks::{Checkin, CommitResult};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eam_artifact::{
    ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, LifecycleState, UserId, VersionState,
};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, AuditEvent};
use crate::clock::{Clock, SystemClock};
use crate::config::VcConfig;
use crate::error::{LockConflict, VcError};
use crate::identity::PermissionPolicy;
use crate::initiative::{Initiative, ParticipantRole};
use crate::lock::{self, Lock};
use crate::state::{derive_state, ArtifactStateView, StateInputs, Viewer};
use crate::store::{Store, StoreTx};
use crate::version::BaselineEntry;
use crate::view::ViewContext;

/// Actor recorded for housekeeping performed without a caller
pub const SYSTEM_USER: UserId = UserId(0);

/// Where the data of an [`ArtifactView`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    Baseline,
    Shadow,
}

/// One artifact as seen by one viewer in one read context
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub name: String,
    pub data: ArtifactRecord,
    pub source: ReadSource,
    pub artifact_state: LifecycleState,
    pub version_state: VersionState,
    pub initiative_origin: Option<InitiativeId>,
    /// Production revision the data is based on
    pub revision: u64,
    pub lock: Option<Lock>,
    #[serde(flatten)]
    pub state: ArtifactStateView,
}

/// Version-control service
pub struct VersionControl<S: Store> {
    store: S,
    policy: Arc<dyn PermissionPolicy>,
    clock: Arc<dyn Clock>,
    config: VcConfig,
}

impl<S: Store> VersionControl<S> {
    /// Create a service with the system clock and default configuration
    pub fn new(store: S, policy: Arc<dyn PermissionPolicy>) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
            config: VcConfig::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: VcConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &VcConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> &dyn PermissionPolicy {
        self.policy.as_ref()
    }

    #[inline]
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn viewer(&self, user: UserId) -> Viewer {
        Viewer {
            user_id: user,
            is_admin: self.policy.is_admin(user),
        }
    }

    fn ensure_can_update(&self, actor: UserId, kind: ArtifactKind) -> Result<(), VcError> {
        if self.policy.can_update(actor, kind) {
            Ok(())
        } else {
            Err(VcError::denied(actor, format!("update {} artifacts", kind.label())))
        }
    }

    /// Participant with an editing role, or admin when participation is enforced
    fn ensure_editor(
        &self,
        tx: &mut dyn StoreTx,
        actor: UserId,
        initiative: &Initiative,
    ) -> Result<(), VcError> {
        if !self.config.require_participation || self.policy.is_admin(actor) {
            return Ok(());
        }
        match tx.participant(&initiative.initiative_id, actor)? {
            Some(p) if p.role.can_edit() => Ok(()),
            _ => Err(VcError::denied(
                actor,
                format!("edit artifacts in initiative {}", initiative.initiative_id),
            )),
        }
    }

    /// Lead or architect of the initiative, or admin
    fn ensure_manager(
        &self,
        tx: &mut dyn StoreTx,
        actor: UserId,
        initiative: &Initiative,
        action: &str,
    ) -> Result<(), VcError> {
        if self.policy.is_admin(actor) {
            return Ok(());
        }
        match tx.participant(&initiative.initiative_id, actor)? {
            Some(p) if p.role.can_manage() => Ok(()),
            _ => Err(VcError::denied(
                actor,
                format!("{action} initiative {}", initiative.initiative_id),
            )),
        }
    }

    /// Lead of the initiative, or admin
    fn ensure_lead(
        &self,
        tx: &mut dyn StoreTx,
        actor: UserId,
        initiative: &Initiative,
        action: &str,
    ) -> Result<(), VcError> {
        if self.policy.is_admin(actor) {
            return Ok(());
        }
        match tx.participant(&initiative.initiative_id, actor)? {
            Some(p) if p.role == ParticipantRole::Lead => Ok(()),
            _ => Err(VcError::denied(
                actor,
                format!("{action} initiative {}", initiative.initiative_id),
            )),
        }
    }

    fn lock_conflict(&self, lock: &Lock) -> VcError {
        LockConflict {
            artifact: lock.artifact,
            locked_by: lock.locked_by,
            locked_by_user: self.policy.user(lock.locked_by).map(|u| u.username),
            initiative_id: lock.initiative_id.clone(),
            expires_at: lock.lock_expiry,
        }
        .into()
    }

    /// Assemble the contextual view of one baseline row
    fn build_view(
        &self,
        tx: &mut dyn StoreTx,
        baseline: BaselineEntry,
        ctx: &ViewContext,
        viewer: Viewer,
        now: DateTime<Utc>,
    ) -> Result<ArtifactView, VcError> {
        let artifact = baseline.artifact;
        let lock = lock::active(tx.lock(&artifact)?, now);
        let holder = lock
            .as_ref()
            .and_then(|l| self.policy.user(l.locked_by))
            .map(|u| u.username);

        let shadows = tx.shadows_for_artifact(&artifact)?;
        let has_initiative_changes = match &ctx.initiative_id {
            Some(id) => shadows.iter().any(|s| &s.initiative_id == id),
            None => !shadows.is_empty(),
        };
        let shadow = ctx
            .shadow_source()
            .and_then(|id| shadows.into_iter().find(|s| &s.initiative_id == id));

        let has_conflicts = tx.conflicts_for_artifact(&artifact)?.iter().any(|c| {
            c.is_pending()
                && ctx
                    .initiative_id
                    .as_ref()
                    .map_or(true, |id| &c.initiative_id == id)
        });

        let (data, source, version_state, revision) = match shadow {
            Some(s) => (s.data, ReadSource::Shadow, s.version_state, s.base_revision),
            None => {
                let version_state = if baseline.artifact_state == LifecycleState::Pending {
                    VersionState::NewInInitiative
                } else {
                    VersionState::Production
                };
                (baseline.record, ReadSource::Baseline, version_state, baseline.revision)
            }
        };

        let state = derive_state(&StateInputs {
            lock_holder_name: holder.as_deref(),
            has_initiative_changes,
            has_conflicts,
            artifact_state: Some(baseline.artifact_state),
            version_state: Some(version_state),
            initiative_origin: baseline.initiative_origin.as_ref(),
            ..StateInputs::new(artifact, viewer, now).with_lock(lock.as_ref())
        });

        Ok(ArtifactView {
            artifact,
            name: data.display_name(),
            data,
            source,
            artifact_state: baseline.artifact_state,
            version_state,
            initiative_origin: baseline.initiative_origin,
            revision,
            lock,
            state,
        })
    }
}

impl<S: Store> std::fmt::Debug for VersionControl<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionControl")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Seal `entry` onto the end of the audit chain
fn audit(tx: &mut dyn StoreTx, entry: AuditEntry, now: DateTime<Utc>) -> Result<(), VcError> {
    let prev = tx.last_audit()?;
    let event = AuditEvent::seal(entry, prev.as_ref(), now);
    tx.append_audit(&event)?;
    Ok(())
}

fn load_initiative(tx: &mut dyn StoreTx, id: &InitiativeId) -> Result<Initiative, VcError> {
    tx.initiative(id)?
        .ok_or_else(|| VcError::InitiativeNotFound(id.clone()))
}

fn load_baseline(tx: &mut dyn StoreTx, artifact: &ArtifactRef) -> Result<BaselineEntry, VcError> {
    tx.baseline(artifact)?
        .ok_or(VcError::ArtifactNotFound(*artifact))
}

#[cfg(test)]
mod tests;
