//! HTTP error mapping
//!
//! Every failure is returned as `{ "error", "code", "retryable" }`; lock
//! conflicts add the holder payload under `conflict` so clients can render a
//! resolution dialog.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eam_core::VcError;
use serde_json::{json, Value};

/// Error returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Vc(#[from] VcError),

    /// Request could not be interpreted
    #[error("{0}")]
    BadRequest(String),

    /// Caller identity missing
    #[error("{0}")]
    Unauthorized(String),

    /// Worker task failed
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Vc(err) => vc_status(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::Vc(err) => {
                let mut body = json!({
                    "error": err.to_string(),
                    "code": err.code(),
                    "retryable": err.is_retryable(),
                });
                if let VcError::LockConflict(conflict) = err {
                    body["conflict"] = json!(conflict);
                }
                body
            }
            Self::BadRequest(message) => error_body(message, "bad_request"),
            Self::Unauthorized(message) => error_body(message, "unauthorized"),
            Self::Internal(message) => error_body(message, "internal_error"),
        }
    }
}

fn error_body(message: &str, code: &str) -> Value {
    json!({ "error": message, "code": code, "retryable": false })
}

fn vc_status(err: &VcError) -> StatusCode {
    match err {
        VcError::LockConflict(_)
        | VcError::InitiativeClosed { .. }
        | VcError::IllegalTransition { .. }
        | VcError::UnresolvedConflicts { .. } => StatusCode::CONFLICT,
        VcError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        VcError::StaleLock { .. } => StatusCode::PRECONDITION_FAILED,
        VcError::Validation(_) => StatusCode::BAD_REQUEST,
        VcError::InitiativeNotFound(_)
        | VcError::ArtifactNotFound(_)
        | VcError::ConflictNotFound(_) => StatusCode::NOT_FOUND,
        VcError::Store(_) | VcError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}
