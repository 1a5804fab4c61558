//! Artifact identity: kinds, ids and references

use crate::artifact::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of versioned artifact kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Application,
    Interface,
    BusinessProcess,
    ChangeRequest,
    TechnicalProcess,
    InternalActivity,
}

impl ArtifactKind {
    /// Every kind, in declaration order
    pub const ALL: [ArtifactKind; 6] = [
        Self::Application,
        Self::Interface,
        Self::BusinessProcess,
        Self::ChangeRequest,
        Self::TechnicalProcess,
        Self::InternalActivity,
    ];

    /// Stable wire identifier
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Interface => "interface",
            Self::BusinessProcess => "business_process",
            Self::ChangeRequest => "change_request",
            Self::TechnicalProcess => "technical_process",
            Self::InternalActivity => "internal_activity",
        }
    }

    /// Human-readable label
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Interface => "Interface",
            Self::BusinessProcess => "Business Process",
            Self::ChangeRequest => "Change Request",
            Self::TechnicalProcess => "Technical Process",
            Self::InternalActivity => "Internal Activity",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ValidationError;

    /// Accepts both `business_process` and `business-process` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Numeric artifact identifier within a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub i64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArtifactId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// User identifier as issued by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Initiative identifier (`INIT-<ulid>` when generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitiativeId(String);

impl InitiativeId {
    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("INIT-{}", ulid::Ulid::new()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InitiativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InitiativeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InitiativeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// `(artifactType, artifactId)` pair addressing one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    #[serde(rename = "artifactType")]
    pub kind: ArtifactKind,
    #[serde(rename = "artifactId")]
    pub id: ArtifactId,
}

impl ArtifactRef {
    #[inline]
    #[must_use]
    pub fn new(kind: ArtifactKind, id: impl Into<ArtifactId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Role of a record field pointing at another artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Interface to the application that provides it
    Provider,
    /// Interface to the application that consumes it
    Consumer,
    /// Process or activity to the application it runs in
    Host,
    /// Internal activity to the business process it belongs to
    Process,
}

/// Cross-reference held by one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Wire name of the referencing field
    pub field: &'static str,
    pub relation: Relation,
    pub target: ArtifactRef,
}

impl Reference {
    #[inline]
    #[must_use]
    pub fn new(field: &'static str, relation: Relation, kind: ArtifactKind, id: i64) -> Self {
        Self {
            field,
            relation,
            target: ArtifactRef::new(kind, id),
        }
    }
}
