//! Derived artifact state
//!
//! [`derive_state`] is the single classification used for row styling,
//! badges and the "Version State" list filter. It is pure: same inputs, same
//! output, no I/O.
//!
//! Precedence, first match wins:
//! 1. unresolved conflicts → [`ArtifactState::Conflicted`]
//! 2. active lock held by the viewer, or viewer is admin → [`ArtifactState::CheckedOutMe`]
//! 3. active lock held by someone else → [`ArtifactState::CheckedOutOther`]
//! 4. any initiative marker → [`ArtifactState::InitiativeChanges`]
//! 5. otherwise → [`ArtifactState::Production`]

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactRef, InitiativeId, LifecycleState, UserId, VersionState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::lock::Lock;

/// Presentational state of an artifact for one viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Production,
    CheckedOutMe,
    CheckedOutOther,
    InitiativeChanges,
    Conflicted,
}

impl ArtifactState {
    pub const ALL: [ArtifactState; 5] = [
        Self::Production,
        Self::CheckedOutMe,
        Self::CheckedOutOther,
        Self::InitiativeChanges,
        Self::Conflicted,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::CheckedOutMe => "checked_out_me",
            Self::CheckedOutOther => "checked_out_other",
            Self::InitiativeChanges => "initiative_changes",
            Self::Conflicted => "conflicted",
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown artifact state: {s}"))
    }
}

/// Who is looking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Everything [`derive_state`] looks at
#[derive(Debug, Clone)]
pub struct StateInputs<'a> {
    pub artifact: ArtifactRef,
    pub lock: Option<&'a Lock>,
    pub lock_holder_name: Option<&'a str>,
    pub viewer: Viewer,
    pub now: DateTime<Utc>,
    pub has_initiative_changes: bool,
    pub has_conflicts: bool,
    pub artifact_state: Option<LifecycleState>,
    pub version_state: Option<VersionState>,
    pub initiative_origin: Option<&'a InitiativeId>,
}

impl<'a> StateInputs<'a> {
    /// Inputs for an artifact with no lock and no initiative markers
    #[must_use]
    pub fn new(artifact: ArtifactRef, viewer: Viewer, now: DateTime<Utc>) -> Self {
        Self {
            artifact,
            lock: None,
            lock_holder_name: None,
            viewer,
            now,
            has_initiative_changes: false,
            has_conflicts: false,
            artifact_state: None,
            version_state: None,
            initiative_origin: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_lock(mut self, lock: Option<&'a Lock>) -> Self {
        self.lock = lock;
        self
    }
}

/// Derived state plus the flags the presentation layer renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStateView {
    pub state: ArtifactState,
    pub is_checked_out: bool,
    pub is_checked_out_by_me: bool,
    pub is_locked_by_other: bool,
    pub has_initiative_changes: bool,
    pub has_conflicts: bool,
    pub is_production_baseline: bool,
    pub locked_by: Option<UserId>,
    pub locked_by_name: Option<String>,
    pub lock_expiry: Option<DateTime<Utc>>,
}

/// Classify an artifact for one viewer
#[must_use]
pub fn derive_state(inputs: &StateInputs<'_>) -> ArtifactStateView {
    let lock = inputs
        .lock
        .filter(|l| l.artifact == inputs.artifact && l.is_active(inputs.now));

    let is_checked_out = lock.is_some();
    let is_owner = lock.is_some_and(|l| l.locked_by == inputs.viewer.user_id);
    let is_checked_out_by_me = is_checked_out && (is_owner || inputs.viewer.is_admin);
    let is_locked_by_other = is_checked_out && !is_checked_out_by_me;

    let initiative_marked = inputs.has_initiative_changes
        || inputs.version_state.is_some_and(VersionState::is_initiative)
        || inputs.artifact_state == Some(LifecycleState::Pending)
        || inputs.initiative_origin.is_some();

    let state = if inputs.has_conflicts {
        ArtifactState::Conflicted
    } else if is_checked_out_by_me {
        ArtifactState::CheckedOutMe
    } else if is_locked_by_other {
        ArtifactState::CheckedOutOther
    } else if initiative_marked {
        ArtifactState::InitiativeChanges
    } else {
        ArtifactState::Production
    };

    ArtifactStateView {
        state,
        is_checked_out,
        is_checked_out_by_me,
        is_locked_by_other,
        has_initiative_changes: initiative_marked,
        has_conflicts: inputs.has_conflicts,
        is_production_baseline: state == ArtifactState::Production,
        locked_by: lock.map(|l| l.locked_by),
        locked_by_name: lock.and(inputs.lock_holder_name).map(str::to_string),
        lock_expiry: lock.map(|l| l.lock_expiry),
    }
}

/// Keep items whose state is in `wanted`; an empty filter keeps everything
pub fn filter_by_state<T>(
    items: impl IntoIterator<Item = T>,
    wanted: &[ArtifactState],
    state_of: impl Fn(&T) -> ArtifactState,
) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| wanted.is_empty() || wanted.contains(&state_of(item)))
        .collect()
}

/// Count items per state (every state present, zero when unused)
pub fn count_by_state<T>(
    items: &[T],
    state_of: impl Fn(&T) -> ArtifactState,
) -> BTreeMap<ArtifactState, usize> {
    let mut counts: BTreeMap<ArtifactState, usize> =
        ArtifactState::ALL.into_iter().map(|s| (s, 0)).collect();
    for item in items {
        *counts.entry(state_of(item)).or_default() += 1;
    }
    counts
}
