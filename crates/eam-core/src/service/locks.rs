//! Checkout, checkin and lock housekeeping

use chrono::{DateTime, Utc};
use eam_artifact::{
    ArtifactChanges, ArtifactRef, FieldSet, InitiativeId, LifecycleState, UserId, ValidationError,
    VersionState,
};
use serde::Serialize;

use super::conflicts::{reconcile, record_conflict, settle_conflicts, Reconciled};
use super::{audit, load_baseline, load_initiative, ArtifactView, VersionControl, SYSTEM_USER};
use crate::audit::{AuditAction, AuditEntry};
use crate::conflict::{Conflict, ResolutionStrategy};
use crate::error::{StoreError, VcError};
use crate::lock::{self, Lock, LockInfo};
use crate::store::{Store, StoreTx};
use crate::version::ShadowVersion;
use crate::view::ViewContext;

/// Checkin request
#[derive(Debug, Clone, PartialEq)]
pub struct Checkin {
    pub artifact: ArtifactRef,
    pub initiative_id: InitiativeId,
    pub changes: ArtifactChanges,
    pub change_description: Option<String>,
    /// Admin acting on another user's lock
    pub admin_override: bool,
}

impl Checkin {
    #[must_use]
    pub fn new(
        artifact: ArtifactRef,
        initiative_id: impl Into<InitiativeId>,
        changes: impl Into<ArtifactChanges>,
    ) -> Self {
        Self {
            artifact,
            initiative_id: initiative_id.into(),
            changes: changes.into(),
            change_description: None,
            admin_override: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.change_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_admin_override(mut self) -> Self {
        self.admin_override = true;
        self
    }
}

/// Outcome of a checkin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    /// Artifact as seen in the initiative after the commit
    pub artifact: ArtifactView,
    pub shadow: ShadowVersion,
    /// Fields this checkin changed
    pub changed_fields: FieldSet,
    /// Set when production moved underneath the initiative on the same fields
    pub conflict: Option<Conflict>,
}

impl<S: Store> VersionControl<S> {
    /// Acquire the lock on `artifact` for `initiative`
    ///
    /// Re-entrant: the holder checking out again under the same initiative
    /// gets its existing lock back unchanged.
    ///
    /// # Errors
    /// - [`VcError::PermissionDenied`] without update rights or participation
    /// - [`VcError::InitiativeNotFound`] / [`VcError::InitiativeClosed`]
    /// - [`VcError::ArtifactNotFound`]
    /// - [`VcError::LockConflict`] when someone else holds an active lock
    pub fn checkout(
        &self,
        actor: UserId,
        artifact: ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<Lock, VcError> {
        self.ensure_can_update(actor, artifact.kind)?;
        let now = self.now();

        let (lock, acquired) = self.store.transaction(|tx| {
            let found = load_initiative(tx, initiative)?;
            found.ensure_open()?;
            self.ensure_editor(tx, actor, &found)?;
            let baseline = load_baseline(tx, &artifact)?;
            if baseline.artifact_state == LifecycleState::Pending
                && !baseline.is_pending_from(initiative)
            {
                return Err(ValidationError::InvalidField {
                    field: "artifactId",
                    reason: format!("{artifact} is pending in another initiative"),
                }
                .into());
            }

            if let Some(existing) = tx.lock(&artifact)? {
                if existing.is_active(now) {
                    if existing.is_held_by(actor, initiative) {
                        return Ok((existing, false));
                    }
                    return Err(self.lock_conflict(&existing));
                }
                tx.delete_lock(&artifact)?;
            }

            let base_revision = tx
                .shadow(&artifact, initiative)?
                .map_or(baseline.revision, |s| s.base_revision);
            let lock = Lock {
                artifact,
                initiative_id: initiative.clone(),
                locked_by: actor,
                locked_at: now,
                lock_expiry: now
                    .checked_add_signed(self.config.lock_ttl())
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                base_revision,
            };

            match tx.insert_lock(&lock) {
                Ok(()) => {}
                Err(StoreError::LockExists(_)) => {
                    return Err(match tx.lock(&artifact)? {
                        Some(holder) => self.lock_conflict(&holder),
                        None => StoreError::Busy.into(),
                    });
                }
                Err(e) => return Err(e.into()),
            }

            audit(
                tx,
                AuditEntry::new(AuditAction::Checkout, actor)
                    .artifact(artifact)
                    .initiative(initiative)
                    .detail(format!("base revision {base_revision}")),
                now,
            )?;
            Ok((lock, true))
        })?;

        if acquired {
            tracing::info!("Checked out {} for {} by user {}", artifact, initiative, actor);
        } else {
            tracing::debug!("Re-entrant checkout of {} by user {}", artifact, actor);
        }
        Ok(lock)
    }

    /// Commit changes into the initiative's shadow version and release the lock
    ///
    /// # Errors
    /// - [`VcError::Validation`] for empty, malformed or mismatched changes
    /// - [`VcError::PermissionDenied`] for a non-admin override
    /// - [`VcError::StaleLock`] when the caller no longer holds an active lock,
    ///   whether it expired, was released, or was taken by someone else since
    pub fn checkin(&self, actor: UserId, request: Checkin) -> Result<CommitResult, VcError> {
        let Checkin {
            artifact,
            initiative_id,
            changes,
            change_description,
            admin_override,
        } = request;

        changes.validate()?;
        if changes.kind() != artifact.kind {
            return Err(ValidationError::KindMismatch {
                expected: artifact.kind,
                actual: changes.kind(),
            }
            .into());
        }
        self.ensure_can_update(actor, artifact.kind)?;
        let viewer = self.viewer(actor);
        if admin_override && !viewer.is_admin {
            return Err(VcError::denied(actor, "override another user's lock"));
        }
        let now = self.now();

        let result = self.store.transaction(|tx| {
            let initiative = load_initiative(tx, &initiative_id)?;
            initiative.ensure_open()?;
            let lock = self.owned_lock(tx, actor, artifact, &initiative_id, admin_override, now)?;
            let baseline = load_baseline(tx, &artifact)?;
            let prior = tx.shadow(&artifact, &initiative_id)?;

            let base_revision = prior.as_ref().map_or(lock.base_revision, |s| s.base_revision);
            let base_record = tx
                .revision(&artifact, base_revision)?
                .unwrap_or_else(|| baseline.record.clone());
            let mut working = prior
                .as_ref()
                .map_or_else(|| base_record.clone(), |s| s.data.clone());
            let changed_fields = working.apply(&changes)?;

            let version_state = if baseline.is_pending_from(&initiative_id) {
                VersionState::NewInInitiative
            } else {
                VersionState::ModifiedInInitiative
            };
            let mut shadow = ShadowVersion {
                artifact,
                initiative_id: initiative_id.clone(),
                changed_fields: base_record.diff(&working),
                data: working,
                base_revision,
                version_state,
                version_number: prior.as_ref().map_or(1, |s| s.version_number + 1),
                change_description: change_description
                    .clone()
                    .or_else(|| prior.as_ref().and_then(|s| s.change_description.clone())),
                updated_by: actor,
                updated_at: now,
            };

            let conflict = match reconcile(tx, &shadow, &baseline, self.config.auto_rebase)? {
                Reconciled::Conflicted(fields) => Some(record_conflict(
                    tx,
                    &shadow,
                    fields,
                    baseline.revision,
                    actor,
                    now,
                )?),
                Reconciled::Rebased(rebased) => {
                    shadow = rebased;
                    None
                }
                Reconciled::Current => None,
            };
            if conflict.is_none() {
                settle_conflicts(tx, &initiative_id, &artifact, actor, None, now)?;
            }

            tx.put_shadow(&shadow)?;
            tx.delete_lock(&artifact)?;

            let fields: Vec<&str> = changed_fields.iter().map(String::as_str).collect();
            audit(
                tx,
                AuditEntry::new(AuditAction::Checkin, actor)
                    .artifact(artifact)
                    .initiative(&initiative_id)
                    .admin_override(lock.locked_by != actor)
                    .detail(format!("v{} fields [{}]", shadow.version_number, fields.join(", "))),
                now,
            )?;

            let view = self.build_view(
                tx,
                baseline,
                &ViewContext::initiative(initiative_id.clone()),
                viewer,
                now,
            )?;
            Ok(CommitResult {
                artifact: view,
                shadow,
                changed_fields,
                conflict,
            })
        })?;

        match &result.conflict {
            Some(conflict) => tracing::warn!(
                "Checkin of {} in {} conflicts with production on {} field(s)",
                artifact,
                initiative_id,
                conflict.fields.len()
            ),
            None => tracing::info!(
                "Checked in {} for {} (v{})",
                artifact,
                initiative_id,
                result.shadow.version_number
            ),
        }
        Ok(result)
    }

    /// Release the lock without committing and roll back the initiative's
    /// shadow version
    ///
    /// A pending placeholder proposed by the initiative is removed as well;
    /// an existing production baseline is never touched.
    ///
    /// # Errors
    /// Same lock-ownership errors as [`VersionControl::checkin`]
    pub fn cancel_checkout(
        &self,
        actor: UserId,
        artifact: ArtifactRef,
        initiative: &InitiativeId,
        admin_override: bool,
    ) -> Result<(), VcError> {
        if admin_override && !self.policy.is_admin(actor) {
            return Err(VcError::denied(actor, "override another user's lock"));
        }
        let now = self.now();

        self.store.transaction(|tx| {
            let lock = self.owned_lock(tx, actor, artifact, initiative, admin_override, now)?;
            tx.delete_lock(&artifact)?;
            let rolled_back = tx.delete_shadow(&artifact, initiative)?;
            settle_conflicts(
                tx,
                initiative,
                &artifact,
                actor,
                Some(ResolutionStrategy::AcceptProduction),
                now,
            )?;

            let mut detail = if rolled_back {
                "shadow version discarded".to_string()
            } else {
                "lock released".to_string()
            };
            if let Some(baseline) = tx.baseline(&artifact)? {
                if baseline.is_pending_from(initiative) {
                    tx.delete_baseline(&artifact)?;
                    detail.push_str(", pending artifact removed");
                }
            }

            audit(
                tx,
                AuditEntry::new(AuditAction::CancelCheckout, actor)
                    .artifact(artifact)
                    .initiative(initiative)
                    .admin_override(lock.locked_by != actor)
                    .detail(detail),
                now,
            )
        })?;

        tracing::info!("Cancelled checkout of {} in {}", artifact, initiative);
        Ok(())
    }

    /// Active locks, optionally for one initiative
    ///
    /// # Errors
    /// Returns error on store failure
    pub fn query_locks(&self, initiative: Option<&InitiativeId>) -> Result<Vec<LockInfo>, VcError> {
        let now = self.now();
        self.store.transaction(|tx| {
            let locks = tx.locks(initiative)?;
            let mut out = Vec::with_capacity(locks.len());
            for lock in locks.into_iter().filter(|l| l.is_active(now)) {
                let artifact_name = tx.baseline(&lock.artifact)?.map(|b| b.record.display_name());
                out.push(LockInfo {
                    user: self.policy.user(lock.locked_by),
                    artifact_name,
                    lock,
                });
            }
            Ok(out)
        })
    }

    /// Drop the lock on `artifact` without touching any shadow version
    ///
    /// Returns the released lock, or `None` if nothing active was held.
    ///
    /// # Errors
    /// [`VcError::PermissionDenied`] unless the caller holds the lock or is admin
    pub fn release_lock(&self, actor: UserId, artifact: ArtifactRef) -> Result<Option<Lock>, VcError> {
        let now = self.now();
        let is_admin = self.policy.is_admin(actor);

        let released = self.store.transaction(|tx| {
            let Some(existing) = tx.lock(&artifact)? else {
                return Ok(None);
            };
            if !existing.is_active(now) {
                tx.delete_lock(&artifact)?;
                return Ok(None);
            }
            if existing.locked_by != actor && !is_admin {
                return Err(VcError::denied(actor, format!("release the lock on {artifact}")));
            }
            tx.delete_lock(&artifact)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::ReleaseLock, actor)
                    .artifact(artifact)
                    .initiative(&existing.initiative_id)
                    .admin_override(existing.locked_by != actor),
                now,
            )?;
            Ok(Some(existing))
        })?;

        if released.is_some() {
            tracing::info!("Released lock on {} (user {})", artifact, actor);
        }
        Ok(released)
    }

    /// Delete expired lock rows and locks of closed or missing initiatives
    ///
    /// Reads already ignore expired locks; this only reclaims the rows.
    ///
    /// # Errors
    /// Returns error on store failure
    pub fn purge_expired_locks(&self) -> Result<usize, VcError> {
        let now = self.now();
        let purged = self.store.transaction(|tx| {
            let mut purged = tx.delete_expired_locks(now)?;
            for lock in tx.locks(None)? {
                let open = tx
                    .initiative(&lock.initiative_id)?
                    .is_some_and(|i| i.status.is_open());
                if !open && tx.delete_lock(&lock.artifact)? {
                    purged += 1;
                }
            }
            if purged > 0 {
                audit(
                    tx,
                    AuditEntry::new(AuditAction::LocksPurged, SYSTEM_USER)
                        .detail(format!("{purged} lock(s) purged")),
                    now,
                )?;
            }
            Ok(purged)
        })?;

        if purged > 0 {
            tracing::info!("Purged {} stale lock(s)", purged);
        }
        Ok(purged)
    }

    /// The active lock the caller may act on for checkin or cancel
    fn owned_lock(
        &self,
        tx: &mut dyn StoreTx,
        actor: UserId,
        artifact: ArtifactRef,
        initiative: &InitiativeId,
        admin_override: bool,
        now: DateTime<Utc>,
    ) -> Result<Lock, VcError> {
        match lock::active(tx.lock(&artifact)?, now) {
            Some(l) if l.is_held_by(actor, initiative) => Ok(l),
            Some(l) if admin_override && &l.initiative_id == initiative => Ok(l),
            Some(l) => {
                tracing::debug!(
                    "{} no longer holds {} in {}, held by user {} in {}",
                    actor,
                    artifact,
                    initiative,
                    l.locked_by,
                    l.initiative_id
                );
                Err(VcError::StaleLock {
                    artifact,
                    initiative: initiative.clone(),
                })
            }
            None => Err(VcError::StaleLock {
                artifact,
                initiative: initiative.clone(),
            }),
        }
    }
}
