//! Initiatives and their participants
//!
//! # Lifecycle
//!
//! ```text
//! Draft ──► Active ◄──► Review
//!   │         │           │
//!   │         ├──► Completed (terminal)
//!   └─────────┴──► Abandoned (terminal)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use eam_artifact::{InitiativeId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VcError;

/// Initiative status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiativeStatus {
    Draft,
    Active,
    Review,
    Completed,
    Abandoned,
}

impl InitiativeStatus {
    /// Accepts checkouts and checkins
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Draft | Self::Active | Self::Review)
    }

    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_open()
    }

    /// Statuses reachable from `self`
    #[must_use]
    pub fn allowed_transitions(self) -> Vec<Self> {
        match self {
            Self::Draft => vec![Self::Active, Self::Abandoned],
            Self::Active => vec![Self::Review, Self::Completed, Self::Abandoned],
            Self::Review => vec![Self::Active, Self::Completed, Self::Abandoned],
            Self::Completed | Self::Abandoned => vec![],
        }
    }

    /// # Errors
    /// Returns [`VcError::IllegalTransition`] if `to` is not reachable
    pub fn validate_transition(self, to: Self) -> Result<(), VcError> {
        if self.allowed_transitions().contains(&to) {
            Ok(())
        } else {
            Err(VcError::IllegalTransition { from: self, to })
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for InitiativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business priority of an initiative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Named batch of proposed artifact changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub initiative_id: InitiativeId,
    pub name: String,
    pub description: Option<String>,
    pub business_justification: Option<String>,
    pub priority: Priority,
    pub status: InitiativeStatus,
    pub target_completion_date: Option<NaiveDate>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Initiative {
    /// # Errors
    /// Returns [`VcError::InitiativeClosed`] if the initiative is terminal
    pub fn ensure_open(&self) -> Result<(), VcError> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(VcError::InitiativeClosed {
                id: self.initiative_id.clone(),
                status: self.status,
            })
        }
    }
}

/// Request to create an initiative
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInitiative {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub initiative_id: Option<InitiativeId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub business_justification: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub target_completion_date: Option<NaiveDate>,
}

impl NewInitiative {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<InitiativeId>) -> Self {
        self.initiative_id = Some(id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_completion_date = Some(date);
        self
    }
}

/// Role of a user within one initiative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Lead,
    Architect,
    Developer,
    Reviewer,
    Viewer,
}

impl ParticipantRole {
    /// May check out artifacts under the initiative
    #[inline]
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Lead | Self::Architect | Self::Developer)
    }

    /// May add participants and change status
    #[inline]
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Lead | Self::Architect)
    }
}

/// Membership of a user in an initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub initiative_id: InitiativeId,
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub added_at: DateTime<Utc>,
}

/// Initiative with its participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeDetail {
    #[serde(flatten)]
    pub initiative: Initiative,
    pub participants: Vec<Participant>,
}
