//! Caller identity
//!
//! The identity provider sits in front of this service and forwards the
//! authenticated user id in [`USER_HEADER`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use eam_artifact::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[axum::async_trait]
impl<St: Send + Sync> FromRequestParts<St> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER} header")))?;
        let id = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| ApiError::bad_request(format!("invalid {USER_HEADER} header")))?;
        Ok(Self(UserId(id)))
    }
}
