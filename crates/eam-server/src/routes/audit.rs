use std::sync::Arc;

use axum::extract::State;
use eam_core::{AuditEvent, Store, VersionComparison, VersionControl, VersionRef};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{Json, Query};
use crate::routes::artifact_ref;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditQuery {
    artifact_type: Option<String>,
    artifact_id: Option<i64>,
}

/// Whole chain, or the events touching one artifact
pub(crate) async fn trail<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let artifact = match (query.artifact_type, query.artifact_id) {
        (Some(kind), Some(id)) => Some(artifact_ref(&kind, id)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "artifactType and artifactId must be given together",
            ))
        }
    };
    let events = crate::blocking(&vc, move |vc| vc.audit_trail(artifact.as_ref())).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompareQuery {
    artifact_type: String,
    artifact_id: i64,
    from: VersionRef,
    to: Option<VersionRef>,
}

/// Field differences between two versions; `to` defaults to production
pub(crate) async fn compare_versions<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<VersionComparison>, ApiError> {
    let artifact = artifact_ref(&query.artifact_type, query.artifact_id)?;
    let to = query.to.unwrap_or(VersionRef::Current);
    let comparison =
        crate::blocking(&vc, move |vc| vc.compare_versions(artifact, query.from, to)).await?;
    Ok(Json(comparison))
}
