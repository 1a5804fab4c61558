//! Initiative lifecycle routes

use std::sync::Arc;

use axum::extract::State;
use eam_artifact::{InitiativeId, UserId};
use eam_core::{
    CompletionSummary, DependencyGraph, ImpactReport, Initiative, InitiativeDetail,
    InitiativeStatus, NewInitiative, Participant, ParticipantRole, ShadowVersion, Store,
    VersionControl,
};
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::routes::artifact_ref;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<InitiativeStatus>,
}

pub(crate) async fn list<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Initiative>>, ApiError> {
    let list = crate::blocking(&vc, move |vc| vc.list_initiatives(query.status)).await?;
    Ok(Json(list))
}

pub(crate) async fn create<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Json(req): Json<NewInitiative>,
) -> Result<Json<Initiative>, ApiError> {
    let created = crate::blocking(&vc, move |vc| vc.create_initiative(user, req)).await?;
    Ok(Json(created))
}

pub(crate) async fn get_one<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path(id): Path<String>,
) -> Result<Json<InitiativeDetail>, ApiError> {
    let id = InitiativeId::from(id);
    let detail = crate::blocking(&vc, move |vc| vc.get_initiative(&id)).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: InitiativeStatus,
}

/// `completed` and `abandoned` run the full completion / abandonment
pub(crate) async fn set_status<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Initiative>, ApiError> {
    let id = InitiativeId::from(id);
    let updated =
        crate::blocking(&vc, move |vc| vc.set_initiative_status(user, &id, req.status)).await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipantRequest {
    user_id: UserId,
    role: ParticipantRole,
}

pub(crate) async fn add_participant<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
    Json(req): Json<ParticipantRequest>,
) -> Result<Json<Participant>, ApiError> {
    let id = InitiativeId::from(id);
    let participant = crate::blocking(&vc, move |vc| {
        vc.add_participant(user, &id, req.user_id, req.role)
    })
    .await?;
    Ok(Json(participant))
}

pub(crate) async fn changes<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ShadowVersion>>, ApiError> {
    let id = InitiativeId::from(id);
    let shadows = crate::blocking(&vc, move |vc| vc.initiative_changes(&id)).await?;
    Ok(Json(shadows))
}

/// Artifacts linked to one artifact, as the initiative sees them
pub(crate) async fn dependencies<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path((id, artifact_type, artifact_id)): Path<(String, String, i64)>,
) -> Result<Json<DependencyGraph>, ApiError> {
    let id = InitiativeId::from(id);
    let artifact = artifact_ref(&artifact_type, artifact_id)?;
    let graph = crate::blocking(&vc, move |vc| vc.dependency_graph(&id, artifact)).await?;
    Ok(Json(graph))
}

pub(crate) async fn impact_report<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ImpactReport>, ApiError> {
    let id = InitiativeId::from(id);
    let report = crate::blocking(&vc, move |vc| vc.impact_report(&id)).await?;
    Ok(Json(report))
}

pub(crate) async fn complete<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<CompletionSummary>, ApiError> {
    let id = InitiativeId::from(id);
    let summary = crate::blocking(&vc, move |vc| vc.complete_initiative(user, &id)).await?;
    Ok(Json(summary))
}

pub(crate) async fn abandon<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<Initiative>, ApiError> {
    let id = InitiativeId::from(id);
    let abandoned = crate::blocking(&vc, move |vc| vc.abandon_initiative(user, &id)).await?;
    Ok(Json(abandoned))
}
