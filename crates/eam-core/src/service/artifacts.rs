//! Production writes, initiative proposals and contextual reads

use eam_artifact::{
    ArtifactChanges, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, LifecycleState,
    UserId, ValidationError, VersionState,
};

use super::{audit, load_baseline, load_initiative, ArtifactView, VersionControl};
use crate::audit::{AuditAction, AuditEntry, AuditEvent};
use crate::error::VcError;
use crate::lock;
use crate::state::{filter_by_state, ArtifactState};
use crate::store::Store;
use crate::version::{BaselineEntry, ShadowVersion};
use crate::view::{is_visible, ViewContext};

impl<S: Store> VersionControl<S> {
    /// Create an artifact directly in production
    ///
    /// # Errors
    /// - [`VcError::PermissionDenied`] without update rights on the kind
    /// - [`VcError::Validation`] if the record does not validate
    pub fn create_artifact(&self, actor: UserId, record: ArtifactRecord) -> Result<ArtifactView, VcError> {
        self.ensure_can_update(actor, record.kind())?;
        record.validate()?;
        let now = self.now();
        let viewer = self.viewer(actor);

        let view = self.store.transaction(|tx| {
            let artifact = ArtifactRef::new(record.kind(), tx.next_artifact_id(record.kind())?);
            let entry = BaselineEntry {
                artifact,
                record,
                artifact_state: LifecycleState::Active,
                initiative_origin: None,
                revision: 1,
                updated_at: now,
                updated_by: actor,
            };
            tx.put_baseline(&entry)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::ProductionWrite, actor)
                    .artifact(artifact)
                    .detail(format!("created {}", entry.record.display_name())),
                now,
            )?;
            self.build_view(tx, entry, &ViewContext::production(), viewer, now)
        })?;

        tracing::info!("Created {} ({})", view.artifact, view.name);
        Ok(view)
    }

    /// Propose a new artifact inside an initiative
    ///
    /// Stores a pending placeholder baseline (hidden from production views)
    /// and the initiative's shadow holding the proposed data.
    ///
    /// # Errors
    /// - [`VcError::PermissionDenied`] without update rights or participation
    /// - [`VcError::InitiativeNotFound`] / [`VcError::InitiativeClosed`]
    /// - [`VcError::Validation`] if the record does not validate
    pub fn propose_artifact(
        &self,
        actor: UserId,
        initiative: &InitiativeId,
        record: ArtifactRecord,
    ) -> Result<ArtifactView, VcError> {
        self.ensure_can_update(actor, record.kind())?;
        record.validate()?;
        let now = self.now();
        let viewer = self.viewer(actor);

        let view = self.store.transaction(|tx| {
            let found = load_initiative(tx, initiative)?;
            found.ensure_open()?;
            self.ensure_editor(tx, actor, &found)?;

            let artifact = ArtifactRef::new(record.kind(), tx.next_artifact_id(record.kind())?);
            let placeholder = BaselineEntry {
                artifact,
                record: record.clone(),
                artifact_state: LifecycleState::Pending,
                initiative_origin: Some(initiative.clone()),
                revision: 1,
                updated_at: now,
                updated_by: actor,
            };
            tx.put_baseline(&placeholder)?;
            tx.put_shadow(&ShadowVersion {
                artifact,
                initiative_id: initiative.clone(),
                changed_fields: record.to_fields().keys().cloned().collect(),
                data: record,
                base_revision: 1,
                version_state: VersionState::NewInInitiative,
                version_number: 1,
                change_description: None,
                updated_by: actor,
                updated_at: now,
            })?;
            audit(
                tx,
                AuditEntry::new(AuditAction::ArtifactProposed, actor)
                    .artifact(artifact)
                    .initiative(initiative)
                    .detail(placeholder.record.display_name()),
                now,
            )?;
            self.build_view(
                tx,
                placeholder,
                &ViewContext::initiative(initiative.clone()),
                viewer,
                now,
            )
        })?;

        tracing::info!("Proposed {} in {}", view.artifact, initiative);
        Ok(view)
    }

    /// Write straight to the production baseline (last writer wins)
    ///
    /// Bypasses locks; initiatives holding shadows of the artifact see the
    /// change as divergence at their next checkin or conflict detection.
    ///
    /// # Errors
    /// - [`VcError::PermissionDenied`] without update rights on the kind
    /// - [`VcError::Validation`] for invalid changes or a pending artifact
    /// - [`VcError::ArtifactNotFound`]
    pub fn update_production(
        &self,
        actor: UserId,
        artifact: ArtifactRef,
        changes: &ArtifactChanges,
    ) -> Result<ArtifactView, VcError> {
        changes.validate()?;
        if changes.kind() != artifact.kind {
            return Err(ValidationError::KindMismatch {
                expected: artifact.kind,
                actual: changes.kind(),
            }
            .into());
        }
        self.ensure_can_update(actor, artifact.kind)?;
        let now = self.now();
        let viewer = self.viewer(actor);

        let view = self.store.transaction(|tx| {
            let mut entry = load_baseline(tx, &artifact)?;
            if entry.artifact_state == LifecycleState::Pending {
                return Err(ValidationError::InvalidField {
                    field: "artifactState",
                    reason: "pending artifacts change through their initiative".to_string(),
                }
                .into());
            }
            let changed = entry.record.apply(changes)?;
            if !changed.is_empty() {
                if let Some(held) = lock::active(tx.lock(&artifact)?, now) {
                    tracing::warn!(
                        "Production write to {} while checked out by user {} in {}",
                        artifact,
                        held.locked_by,
                        held.initiative_id
                    );
                }
                entry.revision += 1;
                entry.updated_at = now;
                entry.updated_by = actor;
                tx.put_baseline(&entry)?;

                let fields: Vec<&str> = changed.iter().map(String::as_str).collect();
                audit(
                    tx,
                    AuditEntry::new(AuditAction::ProductionWrite, actor)
                        .artifact(artifact)
                        .detail(format!("r{} fields [{}]", entry.revision, fields.join(", "))),
                    now,
                )?;
            }
            self.build_view(tx, entry, &ViewContext::production(), viewer, now)
        })?;

        tracing::info!("Production write to {} (r{})", artifact, view.revision);
        Ok(view)
    }

    /// One artifact as seen by `viewer` in `ctx`
    ///
    /// # Errors
    /// [`VcError::ArtifactNotFound`], or store failure
    pub fn read_artifact(
        &self,
        viewer: UserId,
        artifact: ArtifactRef,
        ctx: &ViewContext,
    ) -> Result<ArtifactView, VcError> {
        let now = self.now();
        let viewer = self.viewer(viewer);
        self.store.transaction(|tx| {
            let baseline = load_baseline(tx, &artifact)?;
            self.build_view(tx, baseline, ctx, viewer, now)
        })
    }

    /// Artifacts of `kind` visible in `ctx`, optionally narrowed to `states`
    ///
    /// # Errors
    /// Returns error on store failure
    pub fn list_artifacts(
        &self,
        viewer: UserId,
        kind: ArtifactKind,
        ctx: &ViewContext,
        states: &[ArtifactState],
    ) -> Result<Vec<ArtifactView>, VcError> {
        let now = self.now();
        let viewer = self.viewer(viewer);
        let views = self.store.transaction(|tx| {
            let mut views = Vec::new();
            for baseline in tx.baselines(kind)? {
                let view = self.build_view(tx, baseline, ctx, viewer, now)?;
                if is_visible(ctx.view_mode, view.artifact_state, view.version_state) {
                    views.push(view);
                }
            }
            Ok(views)
        })?;
        Ok(filter_by_state(views, states, |v| v.state.state))
    }

    /// Audit events oldest first, optionally for one artifact
    ///
    /// # Errors
    /// Returns error on store failure
    pub fn audit_trail(&self, artifact: Option<&ArtifactRef>) -> Result<Vec<AuditEvent>, VcError> {
        self.store.transaction(|tx| Ok(tx.audit(artifact)?))
    }

    /// Verify the whole audit chain; returns the number of events checked
    ///
    /// # Errors
    /// [`VcError::Audit`] at the first broken link
    pub fn verify_audit(&self) -> Result<usize, VcError> {
        let events = self.audit_trail(None)?;
        crate::audit::verify_chain(&events)?;
        Ok(events.len())
    }
}
