//! Initiative lifecycle

use eam_artifact::{ArtifactKind, ArtifactRef, InitiativeId, LifecycleState, UserId, ValidationError};
use serde::Serialize;

use super::conflicts::{reconcile, Reconciled};
use super::{audit, load_initiative, VersionControl};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::VcError;
use crate::initiative::{
    Initiative, InitiativeDetail, InitiativeStatus, NewInitiative, Participant, ParticipantRole,
};
use crate::store::Store;
use crate::version::{BaselineEntry, ShadowVersion};

/// Outcome of completing an initiative
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub initiative: Initiative,
    /// Artifacts whose shadow became the production baseline
    pub promoted: Vec<ArtifactRef>,
    pub released_locks: usize,
}

impl<S: Store> VersionControl<S> {
    /// Create an initiative in `Active` status with the creator as lead
    ///
    /// # Errors
    /// - [`VcError::PermissionDenied`] for read-only users
    /// - [`VcError::Validation`] for a blank name or a taken id
    pub fn create_initiative(
        &self,
        actor: UserId,
        request: NewInitiative,
    ) -> Result<Initiative, VcError> {
        let may_write = self.policy.is_admin(actor)
            || ArtifactKind::ALL
                .iter()
                .any(|kind| self.policy.can_update(actor, *kind));
        if !may_write {
            return Err(VcError::denied(actor, "create initiatives"));
        }
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField { field: "name" }.into());
        }
        let now = self.now();

        let initiative = Initiative {
            initiative_id: request.initiative_id.unwrap_or_else(InitiativeId::generate),
            name,
            description: request.description,
            business_justification: request.business_justification,
            priority: request.priority,
            status: InitiativeStatus::Active,
            target_completion_date: request.target_completion_date,
            created_by: actor,
            created_at: now,
            completed_at: None,
        };

        self.store.transaction(|tx| {
            if tx.initiative(&initiative.initiative_id)?.is_some() {
                return Err(ValidationError::InvalidField {
                    field: "initiativeId",
                    reason: format!("{} already exists", initiative.initiative_id),
                }
                .into());
            }
            tx.put_initiative(&initiative)?;
            tx.put_participant(&Participant {
                initiative_id: initiative.initiative_id.clone(),
                user_id: actor,
                role: ParticipantRole::Lead,
                added_at: now,
            })?;
            audit(
                tx,
                AuditEntry::new(AuditAction::InitiativeCreated, actor)
                    .initiative(&initiative.initiative_id)
                    .detail(initiative.name.clone()),
                now,
            )
        })?;

        tracing::info!("Created initiative {} ({})", initiative.initiative_id, initiative.name);
        Ok(initiative)
    }

    /// # Errors
    /// [`VcError::InitiativeNotFound`], or store failure
    pub fn get_initiative(&self, id: &InitiativeId) -> Result<InitiativeDetail, VcError> {
        self.store.transaction(|tx| {
            let initiative = load_initiative(tx, id)?;
            let participants = tx.participants(id)?;
            Ok(InitiativeDetail {
                initiative,
                participants,
            })
        })
    }

    /// Initiatives, optionally with one status, newest first
    ///
    /// # Errors
    /// Returns error on store failure
    pub fn list_initiatives(
        &self,
        status: Option<InitiativeStatus>,
    ) -> Result<Vec<Initiative>, VcError> {
        let mut list = self.store.transaction(|tx| Ok(tx.initiatives()?))?;
        list.retain(|i| status.map_or(true, |s| i.status == s));
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    /// Move an initiative to `status`
    ///
    /// `Completed` and `Abandoned` go through [`VersionControl::complete_initiative`]
    /// and [`VersionControl::abandon_initiative`].
    ///
    /// # Errors
    /// - [`VcError::IllegalTransition`]
    /// - [`VcError::PermissionDenied`] unless lead, architect or admin
    pub fn set_initiative_status(
        &self,
        actor: UserId,
        id: &InitiativeId,
        status: InitiativeStatus,
    ) -> Result<Initiative, VcError> {
        match status {
            InitiativeStatus::Completed => return Ok(self.complete_initiative(actor, id)?.initiative),
            InitiativeStatus::Abandoned => return self.abandon_initiative(actor, id),
            _ => {}
        }
        let now = self.now();

        let updated = self.store.transaction(|tx| {
            let mut initiative = load_initiative(tx, id)?;
            self.ensure_manager(tx, actor, &initiative, "change status of")?;
            initiative.status.validate_transition(status)?;
            let from = initiative.status;
            initiative.status = status;
            tx.put_initiative(&initiative)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::InitiativeStatus, actor)
                    .initiative(id)
                    .detail(format!("{from} -> {status}")),
                now,
            )?;
            Ok(initiative)
        })?;

        tracing::info!("Initiative {} is now {}", id, status);
        Ok(updated)
    }

    /// Add or re-role a participant
    ///
    /// # Errors
    /// - [`VcError::InitiativeClosed`]
    /// - [`VcError::PermissionDenied`] unless lead, architect or admin
    pub fn add_participant(
        &self,
        actor: UserId,
        id: &InitiativeId,
        user: UserId,
        role: ParticipantRole,
    ) -> Result<Participant, VcError> {
        let now = self.now();
        let participant = self.store.transaction(|tx| {
            let initiative = load_initiative(tx, id)?;
            initiative.ensure_open()?;
            self.ensure_manager(tx, actor, &initiative, "add participants to")?;

            let participant = Participant {
                initiative_id: id.clone(),
                user_id: user,
                role,
                added_at: now,
            };
            tx.put_participant(&participant)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::ParticipantAdded, actor)
                    .initiative(id)
                    .detail(format!("user {user} as {role:?}")),
                now,
            )?;
            Ok(participant)
        })?;

        tracing::debug!("Added user {} to {} as {:?}", user, id, role);
        Ok(participant)
    }

    /// Shadow versions of `id`
    ///
    /// # Errors
    /// [`VcError::InitiativeNotFound`], or store failure
    pub fn initiative_changes(&self, id: &InitiativeId) -> Result<Vec<ShadowVersion>, VcError> {
        self.store.transaction(|tx| {
            load_initiative(tx, id)?;
            Ok(tx.shadows_for_initiative(id)?)
        })
    }

    /// Promote every shadow of `id` into production and close the initiative
    ///
    /// Conflict detection runs first and is persisted; completion is refused
    /// while any conflict is pending. Promotion bumps each baseline's
    /// revision, turns pending artifacts active, and releases the
    /// initiative's locks, all in one transaction.
    ///
    /// # Errors
    /// - [`VcError::UnresolvedConflicts`]
    /// - [`VcError::IllegalTransition`] from `Draft`
    /// - [`VcError::PermissionDenied`] unless lead or admin
    pub fn complete_initiative(
        &self,
        actor: UserId,
        id: &InitiativeId,
    ) -> Result<CompletionSummary, VcError> {
        self.store.transaction(|tx| {
            let initiative = load_initiative(tx, id)?;
            initiative.ensure_open()?;
            self.ensure_lead(tx, actor, &initiative, "complete")?;
            initiative.status.validate_transition(InitiativeStatus::Completed)
        })?;

        let pending = self.detect_conflicts(actor, id)?;
        if !pending.is_empty() {
            return Err(VcError::UnresolvedConflicts {
                initiative: id.clone(),
                count: pending.len(),
            });
        }
        let now = self.now();

        let summary = self.store.transaction(|tx| {
            let mut initiative = load_initiative(tx, id)?;
            initiative.ensure_open()?;
            initiative.status.validate_transition(InitiativeStatus::Completed)?;

            let mut promoted = Vec::new();
            for shadow in tx.shadows_for_initiative(id)? {
                let artifact = shadow.artifact;
                let Some(baseline) = tx.baseline(&artifact)? else {
                    tracing::warn!("Skipping promotion of {}: baseline missing", artifact);
                    tx.delete_shadow(&artifact, id)?;
                    continue;
                };
                let shadow = match reconcile(tx, &shadow, &baseline, true)? {
                    Reconciled::Current => shadow,
                    Reconciled::Rebased(rebased) => rebased,
                    Reconciled::Conflicted(_) => {
                        return Err(VcError::UnresolvedConflicts {
                            initiative: id.clone(),
                            count: 1,
                        });
                    }
                };

                let artifact_state = if baseline.artifact_state == LifecycleState::Pending {
                    LifecycleState::Active
                } else {
                    baseline.artifact_state
                };
                tx.put_baseline(&BaselineEntry {
                    artifact,
                    record: shadow.data,
                    artifact_state,
                    initiative_origin: None,
                    revision: baseline.revision + 1,
                    updated_at: now,
                    updated_by: actor,
                })?;
                tx.delete_shadow(&artifact, id)?;
                promoted.push(artifact);
            }

            let mut released_locks = 0;
            for lock in tx.locks(Some(id))? {
                if tx.delete_lock(&lock.artifact)? {
                    released_locks += 1;
                }
            }

            initiative.status = InitiativeStatus::Completed;
            initiative.completed_at = Some(now);
            tx.put_initiative(&initiative)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::InitiativeCompleted, actor)
                    .initiative(id)
                    .detail(format!(
                        "{} artifact(s) promoted, {released_locks} lock(s) released",
                        promoted.len()
                    )),
                now,
            )?;
            Ok(CompletionSummary {
                initiative,
                promoted,
                released_locks,
            })
        })?;

        tracing::info!(
            "Completed initiative {}: {} artifact(s) promoted",
            id,
            summary.promoted.len()
        );
        Ok(summary)
    }

    /// Discard every shadow, lock, conflict and pending artifact of `id`
    ///
    /// Production baselines are left exactly as they were.
    ///
    /// # Errors
    /// - [`VcError::InitiativeClosed`]
    /// - [`VcError::PermissionDenied`] unless lead or admin
    pub fn abandon_initiative(&self, actor: UserId, id: &InitiativeId) -> Result<Initiative, VcError> {
        let now = self.now();
        let initiative = self.store.transaction(|tx| {
            let mut initiative = load_initiative(tx, id)?;
            initiative.ensure_open()?;
            self.ensure_lead(tx, actor, &initiative, "abandon")?;
            initiative.status.validate_transition(InitiativeStatus::Abandoned)?;

            let mut discarded = 0;
            for shadow in tx.shadows_for_initiative(id)? {
                tx.delete_shadow(&shadow.artifact, id)?;
                discarded += 1;
            }
            let mut removed = 0;
            for kind in ArtifactKind::ALL {
                for baseline in tx.baselines(kind)? {
                    if baseline.is_pending_from(id) && tx.delete_baseline(&baseline.artifact)? {
                        removed += 1;
                    }
                }
            }
            for lock in tx.locks(Some(id))? {
                tx.delete_lock(&lock.artifact)?;
            }
            tx.delete_conflicts(id)?;

            initiative.status = InitiativeStatus::Abandoned;
            initiative.completed_at = Some(now);
            tx.put_initiative(&initiative)?;
            audit(
                tx,
                AuditEntry::new(AuditAction::InitiativeAbandoned, actor)
                    .initiative(id)
                    .detail(format!(
                        "{discarded} shadow version(s) discarded, {removed} pending artifact(s) removed"
                    )),
                now,
            )?;
            Ok(initiative)
        })?;

        tracing::info!("Abandoned initiative {}", id);
        Ok(initiative)
    }
}
