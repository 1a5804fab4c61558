//! Dependency graph and impact report reads

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactKind, ArtifactRef, InitiativeId, LifecycleState};

use super::{load_initiative, VersionControl};
use crate::dependency::{
    build_graph, ArtifactIndex, ChangeType, CrossInitiativeImpact, DependencyGraph,
    ImpactReport, IndexedArtifact, OverlapKind, MAX_DEPTH,
};
use crate::error::VcError;
use crate::store::{Store, StoreTx};

/// Production records plus the initiative's own proposals, overlaid with
/// its shadows
fn initiative_index(
    tx: &mut dyn StoreTx,
    initiative: &InitiativeId,
) -> Result<(ArtifactIndex, BTreeMap<ArtifactRef, ChangeType>), VcError> {
    let mut entries = Vec::new();
    let mut proposed = BTreeSet::new();
    for kind in ArtifactKind::ALL {
        for baseline in tx.baselines(kind)? {
            let own_proposal = baseline.is_pending_from(initiative);
            if baseline.artifact_state == LifecycleState::Pending && !own_proposal {
                continue;
            }
            if own_proposal {
                proposed.insert(baseline.artifact);
            }
            entries.push(IndexedArtifact {
                artifact: baseline.artifact,
                record: baseline.record,
                revision: if own_proposal { 0 } else { baseline.revision },
                modified: own_proposal,
            });
        }
    }

    let mut changes = BTreeMap::new();
    for shadow in tx.shadows_for_initiative(initiative)? {
        let change = if proposed.contains(&shadow.artifact) {
            ChangeType::Proposed
        } else {
            ChangeType::Modified
        };
        changes.insert(shadow.artifact, change);
        let revision = if change == ChangeType::Proposed { 0 } else { shadow.base_revision };
        entries.push(IndexedArtifact {
            artifact: shadow.artifact,
            record: shadow.data,
            revision,
            modified: true,
        });
    }
    Ok((entries.into_iter().collect(), changes))
}

/// Locks and shadows other open initiatives hold on `touched`
fn overlaps(
    tx: &mut dyn StoreTx,
    initiative: &InitiativeId,
    touched: &BTreeSet<ArtifactRef>,
    index: &ArtifactIndex,
    now: DateTime<Utc>,
) -> Result<Vec<CrossInitiativeImpact>, VcError> {
    let mut found = BTreeSet::new();
    for lock in tx.locks(None)? {
        if &lock.initiative_id != initiative
            && lock.is_active(now)
            && touched.contains(&lock.artifact)
        {
            found.insert((lock.initiative_id, lock.artifact, OverlapKind::Locked));
        }
    }
    for other in tx.initiatives()? {
        if &other.initiative_id == initiative || !other.status.is_open() {
            continue;
        }
        for shadow in tx.shadows_for_initiative(&other.initiative_id)? {
            if touched.contains(&shadow.artifact) {
                found.insert((
                    other.initiative_id.clone(),
                    shadow.artifact,
                    OverlapKind::Modified,
                ));
            }
        }
    }
    Ok(found
        .into_iter()
        .map(|(initiative_id, artifact, overlap)| CrossInitiativeImpact {
            initiative_id,
            name: index.name_of(&artifact),
            artifact,
            overlap,
        })
        .collect())
}

impl<S: Store> VersionControl<S> {
    /// Artifacts linked to `artifact` as seen from `initiative`
    ///
    /// The walk follows record cross-references in both directions, up to
    /// three hops, using the initiative's shadow data where it has one.
    ///
    /// # Errors
    /// [`VcError::InitiativeNotFound`]; [`VcError::ArtifactNotFound`] if the
    /// artifact is not visible from the initiative
    pub fn dependency_graph(
        &self,
        initiative: &InitiativeId,
        artifact: ArtifactRef,
    ) -> Result<DependencyGraph, VcError> {
        let graph = self.store.transaction(|tx| {
            load_initiative(tx, initiative)?;
            let (index, _) = initiative_index(tx, initiative)?;
            build_graph(&index, artifact, MAX_DEPTH).ok_or(VcError::ArtifactNotFound(artifact))
        })?;
        tracing::debug!(
            "Dependency graph of {} in {}: {} node(s), {} cycle(s)",
            artifact,
            initiative,
            graph.nodes.len(),
            graph.cycles.len()
        );
        Ok(graph)
    }

    /// Impact of every change `initiative` carries, with overlaps against
    /// other open initiatives
    ///
    /// # Errors
    /// [`VcError::InitiativeNotFound`], or store failure
    pub fn impact_report(&self, initiative: &InitiativeId) -> Result<ImpactReport, VcError> {
        let now = self.now();
        let report = self.store.transaction(|tx| {
            load_initiative(tx, initiative)?;
            let (index, changes) = initiative_index(tx, initiative)?;
            let graphs: Vec<(ChangeType, DependencyGraph)> = changes
                .iter()
                .filter_map(|(artifact, change)| {
                    build_graph(&index, *artifact, MAX_DEPTH).map(|g| (*change, g))
                })
                .collect();
            let touched: BTreeSet<ArtifactRef> = graphs
                .iter()
                .flat_map(|(_, g)| g.nodes.iter().map(|n| n.artifact))
                .collect();
            let cross = overlaps(tx, initiative, &touched, &index, now)?;
            Ok(ImpactReport::build(initiative.clone(), &graphs, cross))
        })?;
        tracing::info!(
            "Impact report for {}: {} change(s), {} impact(s), risk {:?}",
            initiative,
            report.changed_artifacts,
            report.total_impacts,
            report.risk_level
        );
        Ok(report)
    }
}
