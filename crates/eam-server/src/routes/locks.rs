//! Checkout, checkin, cancel and lock listing

use std::sync::Arc;

use axum::extract::State;
use eam_artifact::{ArtifactChanges, ArtifactRef, InitiativeId};
use eam_core::{Checkin, CommitResult, Lock, LockInfo, Store, VersionControl};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::routes::artifact_ref;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutRequest {
    #[serde(flatten)]
    artifact: ArtifactRef,
    initiative_id: InitiativeId,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutResponse {
    lock: Lock,
}

pub(crate) async fn checkout<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let lock = crate::blocking(&vc, move |vc| {
        vc.checkout(user, req.artifact, &req.initiative_id)
    })
    .await?;
    Ok(Json(CheckoutResponse { lock }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckinRequest {
    #[serde(flatten)]
    artifact: ArtifactRef,
    initiative_id: InitiativeId,
    changes: Value,
    #[serde(default)]
    change_description: Option<String>,
    #[serde(default)]
    admin_override: bool,
}

impl CheckinRequest {
    fn into_checkin(self) -> Result<Checkin, ApiError> {
        let changes = ArtifactChanges::from_json(self.artifact.kind, self.changes)
            .map_err(eam_core::VcError::from)?;
        let mut checkin = Checkin::new(self.artifact, self.initiative_id, changes);
        if let Some(description) = self.change_description {
            checkin = checkin.with_description(description);
        }
        if self.admin_override {
            checkin = checkin.with_admin_override();
        }
        Ok(checkin)
    }
}

pub(crate) async fn checkin<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Json(req): Json<CheckinRequest>,
) -> Result<Json<CommitResult>, ApiError> {
    let checkin = req.into_checkin()?;
    let result = crate::blocking(&vc, move |vc| vc.checkin(user, checkin)).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CancelRequest {
    #[serde(flatten)]
    artifact: ArtifactRef,
    initiative_id: InitiativeId,
    #[serde(default)]
    admin_override: bool,
}

pub(crate) async fn cancel_checkout<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Value>, ApiError> {
    crate::blocking(&vc, move |vc| {
        vc.cancel_checkout(user, req.artifact, &req.initiative_id, req.admin_override)
    })
    .await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocksQuery {
    initiative_id: Option<InitiativeId>,
}

pub(crate) async fn query_locks<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Query(query): Query<LocksQuery>,
) -> Result<Json<Vec<LockInfo>>, ApiError> {
    let locks = crate::blocking(&vc, move |vc| {
        vc.query_locks(query.initiative_id.as_ref())
    })
    .await?;
    Ok(Json(locks))
}

#[derive(Debug, Serialize)]
pub(crate) struct ReleaseResponse {
    released: Option<Lock>,
}

pub(crate) async fn release_lock<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path((artifact_type, artifact_id)): Path<(String, i64)>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let artifact = artifact_ref(&artifact_type, artifact_id)?;
    let released = crate::blocking(&vc, move |vc| vc.release_lock(user, artifact)).await?;
    Ok(Json(ReleaseResponse { released }))
}
