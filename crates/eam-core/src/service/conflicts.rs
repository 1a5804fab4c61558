//! Divergence between initiative shadows and production

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRef, FieldSet, InitiativeId, UserId, ValidationError};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{audit, load_baseline, load_initiative, VersionControl};
use crate::audit::{AuditAction, AuditEntry};
use crate::conflict::{
    overlapping_fields, Conflict, ConflictField, ConflictId, ConflictStatus, Resolution,
    ResolutionStrategy,
};
use crate::error::VcError;
use crate::merge::{auto_merge, FieldMerge};
use crate::store::{Store, StoreTx};
use crate::version::{BaselineEntry, ShadowVersion};

/// Conflict settled by automatic merge, with the per-field outcomes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoResolved {
    pub conflict: Conflict,
    pub merges: Vec<FieldMerge>,
}

/// Shadow compared against the current baseline
pub(super) enum Reconciled {
    /// Based on the current revision, or left alone
    Current,
    /// Replayed onto the current revision
    Rebased(ShadowVersion),
    /// Production changed the same fields to different values
    Conflicted(Vec<ConflictField>),
}

/// Three-way compare `shadow` with `baseline` and rebase when fields don't overlap
pub(super) fn reconcile(
    tx: &mut dyn StoreTx,
    shadow: &ShadowVersion,
    baseline: &BaselineEntry,
    auto_rebase: bool,
) -> Result<Reconciled, VcError> {
    if shadow.base_revision == baseline.revision {
        return Ok(Reconciled::Current);
    }
    let Some(base) = tx.revision(&shadow.artifact, shadow.base_revision)? else {
        tracing::warn!(
            "Revision {} of {} missing, treating shadow as current",
            shadow.base_revision,
            shadow.artifact
        );
        return Ok(Reconciled::Current);
    };

    let overlaps = overlapping_fields(&base, &baseline.record, &shadow.data, &shadow.changed_fields);
    if !overlaps.is_empty() {
        return Ok(Reconciled::Conflicted(overlaps));
    }
    if !auto_rebase {
        return Ok(Reconciled::Current);
    }

    let data = baseline.record.overlay(&shadow.data, &shadow.changed_fields)?;
    Ok(Reconciled::Rebased(ShadowVersion {
        changed_fields: baseline.record.diff(&data),
        data,
        base_revision: baseline.revision,
        ..shadow.clone()
    }))
}

/// Open or refresh the pending conflict for `shadow`'s artifact
pub(super) fn record_conflict(
    tx: &mut dyn StoreTx,
    shadow: &ShadowVersion,
    fields: Vec<ConflictField>,
    production_revision: u64,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Conflict, VcError> {
    let existing = tx
        .conflicts(&shadow.initiative_id)?
        .into_iter()
        .find(|c| c.artifact == shadow.artifact && c.is_pending());

    let conflict = match existing {
        Some(mut c) => {
            c.fields = fields;
            c.production_revision = production_revision;
            c.detected_at = now;
            c
        }
        None => Conflict {
            id: ConflictId::generate(),
            initiative_id: shadow.initiative_id.clone(),
            artifact: shadow.artifact,
            fields,
            status: ConflictStatus::Pending,
            production_revision,
            resolution: None,
            detected_at: now,
            resolved_by: None,
            resolved_at: None,
        },
    };
    tx.put_conflict(&conflict)?;

    let names: Vec<&str> = conflict.fields.iter().map(|f| f.field.as_str()).collect();
    audit(
        tx,
        AuditEntry::new(AuditAction::ConflictDetected, actor)
            .artifact(conflict.artifact)
            .initiative(&conflict.initiative_id)
            .detail(format!("{} on [{}]", conflict.id, names.join(", "))),
        now,
    )?;
    Ok(conflict)
}

/// Close pending conflicts of one artifact in one initiative
///
/// `strategy` is `None` when the conflict went away on its own.
pub(super) fn settle_conflicts(
    tx: &mut dyn StoreTx,
    initiative: &InitiativeId,
    artifact: &ArtifactRef,
    actor: UserId,
    strategy: Option<ResolutionStrategy>,
    now: DateTime<Utc>,
) -> Result<usize, VcError> {
    let mut settled = 0;
    for mut conflict in tx.conflicts(initiative)? {
        if &conflict.artifact != artifact || !conflict.is_pending() {
            continue;
        }
        conflict.status = ConflictStatus::Resolved;
        conflict.resolution = strategy;
        conflict.resolved_by = Some(actor);
        conflict.resolved_at = Some(now);
        tx.put_conflict(&conflict)?;
        settled += 1;
    }
    Ok(settled)
}

impl<S: Store> VersionControl<S> {
    /// Compare every shadow of `initiative` against production
    ///
    /// Non-overlapping divergence is rebased when auto-rebase is on; overlaps
    /// open (or refresh) a conflict. Returns the initiative's pending conflicts.
    ///
    /// # Errors
    /// [`VcError::InitiativeNotFound`], or store failure
    pub fn detect_conflicts(
        &self,
        actor: UserId,
        initiative: &InitiativeId,
    ) -> Result<Vec<Conflict>, VcError> {
        let now = self.now();
        let pending = self.store.transaction(|tx| {
            load_initiative(tx, initiative)?;
            for shadow in tx.shadows_for_initiative(initiative)? {
                let Some(baseline) = tx.baseline(&shadow.artifact)? else {
                    continue;
                };
                match reconcile(tx, &shadow, &baseline, self.config.auto_rebase)? {
                    Reconciled::Current => {}
                    Reconciled::Rebased(rebased) => {
                        tx.put_shadow(&rebased)?;
                        settle_conflicts(tx, initiative, &shadow.artifact, actor, None, now)?;
                    }
                    Reconciled::Conflicted(fields) => {
                        record_conflict(tx, &shadow, fields, baseline.revision, actor, now)?;
                    }
                }
            }
            let pending: Vec<Conflict> = tx
                .conflicts(initiative)?
                .into_iter()
                .filter(Conflict::is_pending)
                .collect();
            Ok(pending)
        })?;

        if !pending.is_empty() {
            tracing::warn!("Initiative {} has {} pending conflict(s)", initiative, pending.len());
        }
        Ok(pending)
    }

    /// Conflicts of `initiative`, pending and resolved
    ///
    /// # Errors
    /// [`VcError::InitiativeNotFound`], or store failure
    pub fn list_conflicts(&self, initiative: &InitiativeId) -> Result<Vec<Conflict>, VcError> {
        self.store.transaction(|tx| {
            load_initiative(tx, initiative)?;
            Ok(tx.conflicts(initiative)?)
        })
    }

    /// Settle a pending conflict and rebase the shadow onto current production
    ///
    /// # Errors
    /// - [`VcError::ConflictNotFound`]
    /// - [`VcError::Validation`] if already resolved, manual values name
    ///   fields outside the conflict or do not validate, or an automatic
    ///   merge needs review that was not accepted
    /// - [`VcError::PermissionDenied`] unless an editing participant or admin
    pub fn resolve_conflict(
        &self,
        actor: UserId,
        id: &ConflictId,
        resolution: Resolution,
    ) -> Result<Conflict, VcError> {
        self.settle(actor, id, None, resolution).map(|(conflict, _)| conflict)
    }

    /// Resolve a conflict of `initiative` with per-field merge strategies
    ///
    /// With `accept_review` unset the call fails, leaving the conflict
    /// pending, when any field's merge needs review.
    ///
    /// # Errors
    /// As [`Self::resolve_conflict`]; [`VcError::ConflictNotFound`] also when
    /// the conflict belongs to another initiative
    pub fn auto_resolve_conflict(
        &self,
        actor: UserId,
        initiative: &InitiativeId,
        id: &ConflictId,
        accept_review: bool,
    ) -> Result<AutoResolved, VcError> {
        let (conflict, merges) =
            self.settle(actor, id, Some(initiative), Resolution::AutoMerge { accept_review })?;
        Ok(AutoResolved { conflict, merges })
    }

    fn settle(
        &self,
        actor: UserId,
        id: &ConflictId,
        scope: Option<&InitiativeId>,
        resolution: Resolution,
    ) -> Result<(Conflict, Vec<FieldMerge>), VcError> {
        let now = self.now();
        let (resolved, merges) = self.store.transaction(|tx| {
            let mut conflict = tx
                .conflict(id)?
                .filter(|c| scope.map_or(true, |i| &c.initiative_id == i))
                .ok_or_else(|| VcError::ConflictNotFound(id.0.clone()))?;
            if !conflict.is_pending() {
                return Err(ValidationError::InvalidField {
                    field: "conflictId",
                    reason: format!("{id} is already resolved"),
                }
                .into());
            }
            let initiative = load_initiative(tx, &conflict.initiative_id)?;
            initiative.ensure_open()?;
            self.ensure_editor(tx, actor, &initiative)?;

            let conflict_fields = conflict.field_names();
            let mut merges = Vec::new();
            let values = match &resolution {
                Resolution::KeepInitiative | Resolution::AcceptProduction => None,
                Resolution::Manual { values } => {
                    if let Some(stray) = values.keys().find(|k| !conflict_fields.contains(*k)) {
                        return Err(ValidationError::InvalidField {
                            field: "values",
                            reason: format!("`{stray}` is not a conflicting field"),
                        }
                        .into());
                    }
                    Some(values.clone())
                }
                Resolution::AutoMerge { accept_review } => {
                    merges = auto_merge(conflict.artifact.kind, &conflict.fields);
                    let review: Vec<&str> = merges
                        .iter()
                        .filter(|m| m.requires_review)
                        .map(|m| m.field.as_str())
                        .collect();
                    if !review.is_empty() && !accept_review {
                        return Err(ValidationError::InvalidField {
                            field: "strategy",
                            reason: format!("merge of [{}] needs review", review.join(", ")),
                        }
                        .into());
                    }
                    Some(
                        merges
                            .iter()
                            .map(|m| (m.field.clone(), m.value.clone()))
                            .collect::<Map<String, Value>>(),
                    )
                }
            };

            let baseline = load_baseline(tx, &conflict.artifact)?;
            if let Some(shadow) = tx.shadow(&conflict.artifact, &conflict.initiative_id)? {
                let kept: FieldSet = match resolution {
                    Resolution::KeepInitiative => shadow.changed_fields.clone(),
                    _ => shadow
                        .changed_fields
                        .difference(&conflict_fields)
                        .cloned()
                        .collect(),
                };
                let mut data = baseline.record.overlay(&shadow.data, &kept)?;
                if let Some(values) = &values {
                    data = data.with_values(values)?;
                }
                tx.put_shadow(&ShadowVersion {
                    changed_fields: baseline.record.diff(&data),
                    data,
                    base_revision: baseline.revision,
                    version_number: shadow.version_number + 1,
                    updated_by: actor,
                    updated_at: now,
                    ..shadow
                })?;
            }

            conflict.status = ConflictStatus::Resolved;
            conflict.resolution = Some(resolution.strategy());
            conflict.resolved_by = Some(actor);
            conflict.resolved_at = Some(now);
            tx.put_conflict(&conflict)?;

            let mut detail = format!("{} via {:?}", conflict.id, resolution.strategy());
            if !merges.is_empty() {
                let applied: Vec<String> = merges
                    .iter()
                    .map(|m| format!("{}={:?}", m.field, m.strategy))
                    .collect();
                detail.push_str(&format!(" [{}]", applied.join(", ")));
            }
            audit(
                tx,
                AuditEntry::new(AuditAction::ConflictResolved, actor)
                    .artifact(conflict.artifact)
                    .initiative(&conflict.initiative_id)
                    .detail(detail),
                now,
            )?;
            Ok((conflict, merges))
        })?;

        tracing::info!("Resolved conflict {} on {}", resolved.id, resolved.artifact);
        Ok((resolved, merges))
    }
}
