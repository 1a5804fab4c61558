//! Versioning attributes carried by baseline and shadow rows

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a baseline row (`artifactState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Active,
    Inactive,
    /// Proposed by an initiative, not yet promoted
    Pending,
    Draft,
}

impl LifecycleState {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a read came from relative to production (`versionState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    #[default]
    Production,
    NewInInitiative,
    ModifiedInInitiative,
}

impl VersionState {
    /// Whether the row carries initiative work
    #[inline]
    #[must_use]
    pub const fn is_initiative(self) -> bool {
        matches!(self, Self::NewInInitiative | Self::ModifiedInInitiative)
    }
}
