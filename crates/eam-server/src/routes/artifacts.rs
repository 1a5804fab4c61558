//! Artifact reads and writes through the production-view filter

use std::sync::Arc;

use axum::extract::State;
use eam_artifact::{ArtifactChanges, ArtifactRecord, InitiativeId};
use eam_core::{
    ArtifactHistory, ArtifactState, ArtifactView, Store, VcError, VersionControl, ViewContext,
    ViewMode,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::routes::{artifact_ref, parse_kind};

/// Read context from the query string
///
/// Without an initiative the production view is on by default; inside an
/// initiative the working view (shadows, all artifacts) is the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewQuery {
    initiative_id: Option<InitiativeId>,
    production_view: Option<bool>,
    view_mode: Option<ViewMode>,
    /// Comma-separated derived states
    state: Option<String>,
}

impl ViewQuery {
    fn context(&self) -> ViewContext {
        let production_view = self
            .production_view
            .unwrap_or(self.initiative_id.is_none());
        let view_mode = self.view_mode.unwrap_or(if production_view {
            ViewMode::Production
        } else {
            ViewMode::All
        });
        ViewContext {
            initiative_id: self.initiative_id.clone(),
            production_view,
            view_mode,
        }
    }

    fn states(&self) -> Result<Vec<ArtifactState>, ApiError> {
        let Some(raw) = self.state.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ArtifactState>().map_err(ApiError::bad_request))
            .collect()
    }
}

pub(crate) async fn list<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(artifact_type): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Vec<ArtifactView>>, ApiError> {
    let kind = parse_kind(&artifact_type)?;
    let ctx = query.context();
    let states = query.states()?;
    let views =
        crate::blocking(&vc, move |vc| vc.list_artifacts(user, kind, &ctx, &states)).await?;
    Ok(Json(views))
}

pub(crate) async fn read<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path((artifact_type, artifact_id)): Path<(String, i64)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ArtifactView>, ApiError> {
    let artifact = artifact_ref(&artifact_type, artifact_id)?;
    let ctx = query.context();
    let view = crate::blocking(&vc, move |vc| vc.read_artifact(user, artifact, &ctx)).await?;
    Ok(Json(view))
}

/// Direct production write of a new artifact
pub(crate) async fn create<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(artifact_type): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ArtifactView>, ApiError> {
    let kind = parse_kind(&artifact_type)?;
    let record = ArtifactRecord::from_json(kind, body).map_err(VcError::from)?;
    let view = crate::blocking(&vc, move |vc| vc.create_artifact(user, record)).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProposeRequest {
    initiative_id: InitiativeId,
    data: Value,
}

/// New artifact visible only inside the initiative until completion
pub(crate) async fn propose<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path(artifact_type): Path<String>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<ArtifactView>, ApiError> {
    let kind = parse_kind(&artifact_type)?;
    let record = ArtifactRecord::from_json(kind, req.data).map_err(VcError::from)?;
    let view = crate::blocking(&vc, move |vc| {
        vc.propose_artifact(user, &req.initiative_id, record)
    })
    .await?;
    Ok(Json(view))
}

pub(crate) async fn update<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Caller(user): Caller,
    Path((artifact_type, artifact_id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<ArtifactView>, ApiError> {
    let artifact = artifact_ref(&artifact_type, artifact_id)?;
    let changes = ArtifactChanges::from_json(artifact.kind, body).map_err(VcError::from)?;
    let view =
        crate::blocking(&vc, move |vc| vc.update_production(user, artifact, &changes)).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryQuery {
    initiative_id: Option<InitiativeId>,
}

/// Production revisions plus shadows, optionally of one initiative
pub(crate) async fn versions<S: Store + 'static>(
    State(vc): State<Arc<VersionControl<S>>>,
    Path((artifact_type, artifact_id)): Path<(String, i64)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ArtifactHistory>, ApiError> {
    let artifact = artifact_ref(&artifact_type, artifact_id)?;
    let history = crate::blocking(&vc, move |vc| {
        vc.artifact_history(artifact, query.initiative_id.as_ref())
    })
    .await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_follow_initiative_presence() {
        let ctx = ViewQuery::default().context();
        assert_eq!(ctx, ViewContext::production());

        let ctx = ViewQuery {
            initiative_id: Some("I-100".into()),
            ..ViewQuery::default()
        }
        .context();
        assert_eq!(ctx, ViewContext::initiative("I-100"));
    }

    #[test]
    fn explicit_toggle_wins() {
        let ctx = ViewQuery {
            initiative_id: Some("I-100".into()),
            production_view: Some(true),
            view_mode: Some(ViewMode::All),
            state: None,
        }
        .context();
        assert!(ctx.production_view);
        assert_eq!(ctx.view_mode, ViewMode::All);
        assert_eq!(ctx.shadow_source().map(InitiativeId::as_str), Some("I-100"));
    }

    #[test]
    fn state_list_parses_and_rejects_unknown() {
        let query = ViewQuery {
            state: Some("production, checked_out_me".into()),
            ..ViewQuery::default()
        };
        assert_eq!(
            query.states().unwrap(),
            vec![ArtifactState::Production, ArtifactState::CheckedOutMe]
        );

        let bad = ViewQuery {
            state: Some("sideways".into()),
            ..ViewQuery::default()
        };
        assert!(bad.states().is_err());
    }
}
