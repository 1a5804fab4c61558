//! Artifact type trait and validation
//!
//! Defines the [`ArtifactType`] trait that binds an [`ArtifactKind`] to its
//! record and partial-update types. This is a sealed trait - only the kinds
//! defined within this crate can implement it.

use crate::kind::{ArtifactKind, Reference};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Per-kind adapter between typed records and the version-control core
///
/// One implementation exists per [`ArtifactKind`] variant.
///
/// # Contract
/// - `apply` must only report fields whose value actually changed
/// - reported field names are the camelCase wire names
/// - `validate_patch` checks supplied values in isolation; `validate_record`
///   checks the merged result
///
/// # Example
/// ```rust,ignore
/// let mut record = app.clone();
/// let patch = ApplicationPatch { name: Some("Renamed App".into()), ..Default::default() };
/// ApplicationArtifact::validate_patch(&patch)?;
/// let changed = ApplicationArtifact::apply(&mut record, &patch);
/// assert_eq!(changed, vec!["name"]);
/// ```
pub trait ArtifactType: Send + Sync + 'static + Debug + private::Sealed {
    /// Full baseline representation
    type Record: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Typed partial update; absent fields are left unchanged
    type Patch: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Kind handled by this adapter
    const KIND: ArtifactKind;

    /// Short name shown in lock dialogs and audit entries
    fn display_name(record: &Self::Record) -> String;

    /// Validate a complete record
    ///
    /// # Errors
    /// Returns error if a required field is empty or a value is out of range
    fn validate_record(record: &Self::Record) -> Result<(), ValidationError>;

    /// Validate the values supplied by a partial update
    ///
    /// # Errors
    /// Returns error if a supplied value is invalid
    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError>;

    /// Merge `patch` onto `record`, returning the fields that changed
    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str>;

    /// Whether the patch carries no field at all
    fn patch_is_empty(patch: &Self::Patch) -> bool;

    /// Other artifacts this record points at
    fn references(_record: &Self::Record) -> Vec<Reference> {
        Vec::new()
    }
}

/// Sealed trait - prevents external implementations
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Errors raised while decoding or validating artifact payloads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Artifact type string not recognised
    #[error("unknown artifact type: {0}")]
    UnknownKind(String),

    /// Payload targets a different kind
    #[error("expected {expected} payload, got {actual}")]
    KindMismatch {
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    /// Payload could not be decoded (unknown field, wrong type)
    #[error("malformed {kind} payload: {message}")]
    Malformed { kind: ArtifactKind, message: String },

    /// Required field missing or blank
    #[error("field `{field}` is required")]
    MissingField { field: &'static str },

    /// Field value rejected
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Partial update carries no field
    #[error("no changes supplied")]
    EmptyChanges,
}

const MAX_TEXT_LEN: usize = 4096;

static LEVEL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^L[1-5]$").ok());

/// Required text: non-blank and bounded
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    check_len(field, value)
}

/// Optional text: bounded when present
pub(crate) fn check_text(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    value.map_or(Ok(()), |v| check_len(field, v))
}

fn check_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_TEXT_LEN {
        return Err(ValidationError::InvalidField {
            field,
            reason: format!("longer than {MAX_TEXT_LEN} bytes"),
        });
    }
    Ok(())
}

/// Process hierarchy level `L1`..`L5`
pub(crate) fn check_level(value: &str) -> Result<(), ValidationError> {
    let valid = LEVEL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "level",
            reason: format!("expected L1..L5, got `{value}`"),
        })
    }
}

/// Percentage in `0..=100`
pub(crate) fn check_percentage(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(ValidationError::InvalidField {
            field,
            reason: format!("{v} is outside 0..=100"),
        }),
        _ => Ok(()),
    }
}

/// Strictly positive integer
pub(crate) fn check_positive(field: &'static str, value: Option<i32>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 1 => Err(ValidationError::InvalidField {
            field,
            reason: format!("{v} must be at least 1"),
        }),
        _ => Ok(()),
    }
}

/// Reference to another artifact must be a positive id
pub(crate) fn check_reference(field: &'static str, value: Option<i64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 1 => Err(ValidationError::InvalidField {
            field,
            reason: format!("{v} is not a valid artifact id"),
        }),
        _ => Ok(()),
    }
}
