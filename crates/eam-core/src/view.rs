//! Initiative production-view filter
//!
//! Decides (a) whether an artifact is visible under a [`ViewMode`] and
//! (b) whether a shadow version supersedes the baseline for a read. Both are
//! independent of [`crate::state::derive_state`].

use eam_artifact::{InitiativeId, LifecycleState, VersionState};
use serde::{Deserialize, Serialize};

/// Which artifacts a list shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Promoted artifacts only
    #[default]
    Production,
    /// Artifacts proposed by initiatives only
    Pending,
    All,
}

/// Pending: proposed by an initiative and not yet promoted
#[inline]
#[must_use]
pub fn is_pending(artifact_state: LifecycleState, version_state: VersionState) -> bool {
    artifact_state == LifecycleState::Pending || version_state == VersionState::NewInInitiative
}

/// Visibility under `mode`
#[must_use]
pub fn is_visible(mode: ViewMode, artifact_state: LifecycleState, version_state: VersionState) -> bool {
    let pending = is_pending(artifact_state, version_state);
    match mode {
        ViewMode::Production => !pending && artifact_state != LifecycleState::Draft,
        ViewMode::Pending => pending,
        ViewMode::All => true,
    }
}

/// Read context of one request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewContext {
    /// Initiative the user is working in
    #[serde(default)]
    pub initiative_id: Option<InitiativeId>,
    /// Production-view toggle
    #[serde(default)]
    pub production_view: bool,
    #[serde(default)]
    pub view_mode: ViewMode,
}

impl ViewContext {
    /// Plain production read
    #[must_use]
    pub fn production() -> Self {
        Self {
            initiative_id: None,
            production_view: true,
            view_mode: ViewMode::Production,
        }
    }

    /// Working view of `initiative`
    #[must_use]
    pub fn initiative(initiative: impl Into<InitiativeId>) -> Self {
        Self {
            initiative_id: Some(initiative.into()),
            production_view: false,
            view_mode: ViewMode::All,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_production_view(mut self, on: bool) -> Self {
        self.production_view = on;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = mode;
        self
    }

    /// Initiative whose shadow versions supersede the baseline, if any
    ///
    /// Shadows apply for "this initiative, non-production view" and for
    /// "production view including pending artifacts".
    #[must_use]
    pub fn shadow_source(&self) -> Option<&InitiativeId> {
        let initiative = self.initiative_id.as_ref()?;
        let shadows_apply =
            !self.production_view || self.view_mode != ViewMode::Production;
        shadows_apply.then_some(initiative)
    }
}
