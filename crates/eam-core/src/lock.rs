//! Artifact locks

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRef, InitiativeId, UserId};
use serde::{Deserialize, Serialize};

use crate::identity::UserSummary;

/// Exclusive intent to modify one artifact within one initiative
///
/// # Invariants
/// - At most one row per artifact exists in the store
/// - A lock with `now > lock_expiry` is treated as absent everywhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub initiative_id: InitiativeId,
    pub locked_by: UserId,
    pub locked_at: DateTime<Utc>,
    pub lock_expiry: DateTime<Utc>,
    /// Baseline revision the holder started from
    pub base_revision: u64,
}

impl Lock {
    /// Whether the lock still counts at `now`
    #[inline]
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now <= self.lock_expiry
    }

    /// Whether `user` holds this lock under `initiative`
    #[inline]
    #[must_use]
    pub fn is_held_by(&self, user: UserId, initiative: &InitiativeId) -> bool {
        self.locked_by == user && &self.initiative_id == initiative
    }
}

/// Drop a lock row that has expired
#[inline]
#[must_use]
pub fn active(lock: Option<Lock>, now: DateTime<Utc>) -> Option<Lock> {
    lock.filter(|l| l.is_active(now))
}

/// Lock listing entry with resolved holder and artifact identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub lock: Lock,
    pub user: Option<UserSummary>,
    pub artifact_name: Option<String>,
}
