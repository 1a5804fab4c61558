//! Route handlers
//!
//! Handlers decode the request, run the service call on the blocking pool
//! and serialize the result. All bodies are camelCase JSON.

pub(crate) mod artifacts;
pub(crate) mod audit;
pub(crate) mod conflicts;
pub(crate) mod initiatives;
pub(crate) mod locks;

use axum::Json;
use eam_artifact::{ArtifactId, ArtifactKind, ArtifactRef};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub(crate) struct Health {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: crate::VERSION,
    })
}

/// Parse an artifact kind path segment
pub(crate) fn parse_kind(raw: &str) -> Result<ArtifactKind, ApiError> {
    raw.parse::<ArtifactKind>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Artifact addressed by `/{artifactType}/{artifactId}`
pub(crate) fn artifact_ref(kind: &str, id: i64) -> Result<ArtifactRef, ApiError> {
    Ok(ArtifactRef::new(parse_kind(kind)?, ArtifactId(id)))
}
