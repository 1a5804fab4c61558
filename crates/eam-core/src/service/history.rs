//! Revision history and version comparison reads

use eam_artifact::{ArtifactRecord, ArtifactRef, InitiativeId, ValidationError};

use super::{load_baseline, VersionControl};
use crate::error::VcError;
use crate::history::{compare_records, ArtifactHistory, VersionComparison, VersionRef};
use crate::store::{Store, StoreTx};

fn resolve_version(
    tx: &mut dyn StoreTx,
    artifact: &ArtifactRef,
    version: &VersionRef,
) -> Result<ArtifactRecord, VcError> {
    let found = match version {
        VersionRef::Current => return Ok(load_baseline(tx, artifact)?.record),
        VersionRef::Revision(r) => tx.revision(artifact, *r)?,
        VersionRef::Shadow(initiative) => tx.shadow(artifact, initiative)?.map(|s| s.data),
    };
    found.ok_or_else(|| {
        ValidationError::InvalidField {
            field: "version",
            reason: format!("{artifact} has no version {version}"),
        }
        .into()
    })
}

impl<S: Store> VersionControl<S> {
    /// Production revisions of `artifact`, oldest first, with its shadows
    ///
    /// With `initiative` only that initiative's shadow is included.
    ///
    /// # Errors
    /// [`VcError::ArtifactNotFound`], or store failure
    pub fn artifact_history(
        &self,
        artifact: ArtifactRef,
        initiative: Option<&InitiativeId>,
    ) -> Result<ArtifactHistory, VcError> {
        self.store.transaction(|tx| {
            load_baseline(tx, &artifact)?;
            let entries = tx.revisions(&artifact)?;
            let shadows = match initiative {
                Some(id) => tx.shadow(&artifact, id)?.into_iter().collect(),
                None => tx.shadows_for_artifact(&artifact)?,
            };
            Ok(ArtifactHistory::new(artifact, entries, shadows))
        })
    }

    /// Field-level difference between two versions of `artifact`
    ///
    /// # Errors
    /// [`VcError::ArtifactNotFound`]; [`VcError::Validation`] when either
    /// version does not exist
    pub fn compare_versions(
        &self,
        artifact: ArtifactRef,
        from: VersionRef,
        to: VersionRef,
    ) -> Result<VersionComparison, VcError> {
        self.store.transaction(|tx| {
            load_baseline(tx, &artifact)?;
            let before = resolve_version(tx, &artifact, &from)?;
            let after = resolve_version(tx, &artifact, &to)?;
            Ok(VersionComparison {
                artifact,
                changes: compare_records(&before, &after),
                from,
                to,
            })
        })
    }
}
