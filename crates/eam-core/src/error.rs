//! Error types for EAM Core
//!
//! Provides error handling for:
//! - Lock contention (structured conflict payload)
//! - Permission and lock-ownership failures
//! - Payload validation
//! - Initiative lifecycle violations
//! - Storage failures

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRef, InitiativeId, UserId, ValidationError};
use serde::Serialize;

use crate::initiative::InitiativeStatus;

/// Main version-control error type
#[derive(Debug, thiserror::Error)]
pub enum VcError {
    /// Artifact already locked by another user or initiative
    #[error("{0}")]
    LockConflict(Box<LockConflict>),

    /// Caller lacks the right to perform the action
    #[error("user {user} may not {action}")]
    PermissionDenied { user: UserId, action: String },

    /// Caller no longer holds the lock it is acting on
    #[error("no active lock on {artifact} for initiative {initiative}")]
    StaleLock {
        artifact: ArtifactRef,
        initiative: InitiativeId,
    },

    /// Malformed or invalid payload
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Initiative does not exist
    #[error("initiative not found: {0}")]
    InitiativeNotFound(InitiativeId),

    /// Initiative is completed or abandoned
    #[error("initiative {id} is {status}")]
    InitiativeClosed {
        id: InitiativeId,
        status: InitiativeStatus,
    },

    /// Artifact does not exist
    #[error("artifact not found: {0}")]
    ArtifactNotFound(ArtifactRef),

    /// Conflict record does not exist
    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    /// Completion blocked by pending conflicts
    #[error("initiative {initiative} has {count} unresolved conflict(s)")]
    UnresolvedConflicts {
        initiative: InitiativeId,
        count: usize,
    },

    /// Status change not allowed from the current status
    #[error("illegal initiative transition: {from} -> {to}")]
    IllegalTransition {
        from: InitiativeStatus,
        to: InitiativeStatus,
    },

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Audit chain does not verify
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}

impl VcError {
    /// Check if error is transient and may be retried by the caller
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Busy))
    }

    /// Check if error needs a human decision (wait, override or abandon)
    #[inline]
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(
            self,
            Self::LockConflict(_) | Self::UnresolvedConflicts { .. }
        )
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::LockConflict(_) => "lock_conflict",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::StaleLock { .. } => "stale_lock",
            Self::Validation(_) => "validation_error",
            Self::InitiativeNotFound(_) => "initiative_not_found",
            Self::InitiativeClosed { .. } => "initiative_closed",
            Self::ArtifactNotFound(_) => "artifact_not_found",
            Self::ConflictNotFound(_) => "conflict_not_found",
            Self::UnresolvedConflicts { .. } => "unresolved_conflicts",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Store(_) => "store_error",
            Self::Audit(_) => "audit_integrity",
        }
    }

    pub(crate) fn denied(user: UserId, action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            user,
            action: action.into(),
        }
    }
}

impl From<LockConflict> for VcError {
    fn from(conflict: LockConflict) -> Self {
        Self::LockConflict(Box::new(conflict))
    }
}

/// Who holds the lock that blocked the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConflict {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub locked_by: UserId,
    pub locked_by_user: Option<String>,
    pub initiative_id: InitiativeId,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Display for LockConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let holder = self
            .locked_by_user
            .clone()
            .unwrap_or_else(|| format!("user {}", self.locked_by));
        write!(
            f,
            "{} is checked out by {} in initiative {} until {}",
            self.artifact,
            holder,
            self.initiative_id,
            self.expires_at.to_rfc3339()
        )
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Insert-or-fail lock row already present
    #[error("lock row already exists for {0}")]
    LockExists(ArtifactRef),

    /// Database busy or locked
    #[error("store busy")]
    Busy,

    /// Row could not be decoded
    #[error("corrupt {table} row: {message}")]
    Corrupt { table: &'static str, message: String },

    /// Other backend failure
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Busy
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for VcError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

/// Audit chain verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// Event hash or back-link does not match
    #[error("audit chain broken at sequence {0}")]
    IntegrityViolation(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use eam_artifact::ArtifactKind;

    fn conflict() -> LockConflict {
        LockConflict {
            artifact: ArtifactRef::new(ArtifactKind::Application, 42),
            locked_by: UserId(1),
            locked_by_user: Some("alice".into()),
            initiative_id: InitiativeId::from("I-100"),
            expires_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    #[test]
    fn lock_conflict_requires_human() {
        let err = VcError::from(conflict());
        assert!(err.requires_human());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "lock_conflict");
        assert!(err.to_string().contains("alice"));
        assert!(err.to_string().contains("I-100"));
    }

    #[test]
    fn busy_store_is_retryable() {
        let err = VcError::Store(StoreError::Busy);
        assert!(err.is_retryable());
        assert!(!err.requires_human());
    }

    #[test]
    fn conflict_payload_is_flat_camel_case() {
        let json = serde_json::to_value(conflict()).unwrap();
        assert_eq!(json["artifactType"], "application");
        assert_eq!(json["artifactId"], 42);
        assert_eq!(json["lockedBy"], 1);
        assert_eq!(json["lockedByUser"], "alice");
        assert_eq!(json["initiativeId"], "I-100");
    }
}
