//! Conflict listing, detection and resolution

use std::sync::Arc;

use axum::extract::State;
use eam_artifact::InitiativeId;
use eam_core::{AutoResolved, Conflict, ConflictId, Resolution, Store, VersionControl};
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

pub(crate) async fn list<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    let id = InitiativeId::from(id);
    let conflicts = crate::blocking(&vc, move |vc| vc.list_conflicts(&id)).await?;
    Ok(Json(conflicts))
}

/// Compare the initiative's shadows with production; returns pending conflicts
pub(crate) async fn detect<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    let id = InitiativeId::from(id);
    let pending = crate::blocking(&vc, move |vc| vc.detect_conflicts(user, &id)).await?;
    Ok(Json(pending))
}

pub(crate) async fn resolve<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
    Json(resolution): Json<Resolution>,
) -> Result<Json<Conflict>, ApiError> {
    let id = ConflictId(id);
    let resolved =
        crate::blocking(&vc, move |vc| vc.resolve_conflict(user, &id, resolution)).await?;
    Ok(Json(resolved))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AutoResolveQuery {
    #[serde(default)]
    accept_review: bool,
}

/// Per-field automatic merge; 400 while any field needs review unless
/// `acceptReview=true`
pub(crate) async fn auto_resolve<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path((id, conflict_id)): Path<(String, String)>,
    Query(query): Query<AutoResolveQuery>,
) -> Result<Json<AutoResolved>, ApiError> {
    let initiative = InitiativeId::from(id);
    let conflict_id = ConflictId(conflict_id);
    let outcome = crate::blocking(&vc, move |vc| {
        vc.auto_resolve_conflict(user, &initiative, &conflict_id, query.accept_review)
    })
    .await?;
    Ok(Json(outcome))
}
