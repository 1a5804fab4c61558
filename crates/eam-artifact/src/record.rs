//! Kind-tagged records and changes
//!
//! [`ArtifactRecord`] and [`ArtifactChanges`] are closed unions over every
//! kind; all per-kind behaviour is routed to the matching [`ArtifactType`]
//! adapter.

use crate::artifact::{ArtifactType, ValidationError};
use crate::diff::{changed_fields, FieldSet};
use crate::kind::{ArtifactKind, Reference};
use crate::records::{
    ApplicationArtifact, ApplicationPatch, ApplicationRecord, BusinessProcessArtifact,
    BusinessProcessPatch, BusinessProcessRecord, ChangeRequestArtifact, ChangeRequestPatch,
    ChangeRequestRecord, InterfaceArtifact, InterfacePatch, InterfaceRecord,
    InternalActivityArtifact, InternalActivityPatch, InternalActivityRecord,
    TechnicalProcessArtifact, TechnicalProcessPatch, TechnicalProcessRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Route one expression to the adapter of the matching variant
///
/// `$adapter` is bound to the adapter type inside `$body`.
macro_rules! dispatch {
    ($value:expr, $enum:ident, $inner:pat, $adapter:ident => $body:expr) => {
        match $value {
            $enum::Application($inner) => {
                type $adapter = ApplicationArtifact;
                $body
            }
            $enum::Interface($inner) => {
                type $adapter = InterfaceArtifact;
                $body
            }
            $enum::BusinessProcess($inner) => {
                type $adapter = BusinessProcessArtifact;
                $body
            }
            $enum::ChangeRequest($inner) => {
                type $adapter = ChangeRequestArtifact;
                $body
            }
            $enum::TechnicalProcess($inner) => {
                type $adapter = TechnicalProcessArtifact;
                $body
            }
            $enum::InternalActivity($inner) => {
                type $adapter = InternalActivityArtifact;
                $body
            }
        }
    };
}

/// Full record of any kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifactType", content = "data", rename_all = "snake_case")]
pub enum ArtifactRecord {
    Application(ApplicationRecord),
    Interface(InterfaceRecord),
    BusinessProcess(BusinessProcessRecord),
    ChangeRequest(ChangeRequestRecord),
    TechnicalProcess(TechnicalProcessRecord),
    InternalActivity(InternalActivityRecord),
}

impl ArtifactRecord {
    /// Decode an untagged JSON object as a record of `kind`
    ///
    /// # Errors
    /// Returns [`ValidationError::Malformed`] if the payload does not decode,
    /// or the record's own validation error
    pub fn from_json(kind: ArtifactKind, value: Value) -> Result<Self, ValidationError> {
        fn decode<T: ArtifactType>(value: Value) -> Result<T::Record, ValidationError> {
            let record: T::Record =
                serde_json::from_value(value).map_err(|e| ValidationError::Malformed {
                    kind: T::KIND,
                    message: e.to_string(),
                })?;
            T::validate_record(&record)?;
            Ok(record)
        }

        Ok(match kind {
            ArtifactKind::Application => Self::Application(decode::<ApplicationArtifact>(value)?),
            ArtifactKind::Interface => Self::Interface(decode::<InterfaceArtifact>(value)?),
            ArtifactKind::BusinessProcess => {
                Self::BusinessProcess(decode::<BusinessProcessArtifact>(value)?)
            }
            ArtifactKind::ChangeRequest => {
                Self::ChangeRequest(decode::<ChangeRequestArtifact>(value)?)
            }
            ArtifactKind::TechnicalProcess => {
                Self::TechnicalProcess(decode::<TechnicalProcessArtifact>(value)?)
            }
            ArtifactKind::InternalActivity => {
                Self::InternalActivity(decode::<InternalActivityArtifact>(value)?)
            }
        })
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        dispatch!(self, ArtifactRecord, _, T => T::KIND)
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        dispatch!(self, ArtifactRecord, r, T => T::display_name(r))
    }

    /// Artifacts this record points at through its id fields
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        dispatch!(self, ArtifactRecord, r, T => T::references(r))
    }

    /// # Errors
    /// Returns error if the record violates its kind's field rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        dispatch!(self, ArtifactRecord, r, T => T::validate_record(r))
    }

    /// Untagged field map (camelCase keys, `null` for unset optionals)
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let value = dispatch!(self, ArtifactRecord, r, _T => serde_json::to_value(r));
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Merge `changes` onto this record
    ///
    /// # Errors
    /// Returns [`ValidationError::KindMismatch`] if `changes` targets another
    /// kind, or the merged record's validation error
    pub fn apply(&mut self, changes: &ArtifactChanges) -> Result<FieldSet, ValidationError> {
        fn merge<T: ArtifactType>(
            record: &mut T::Record,
            patch: &T::Patch,
        ) -> Result<FieldSet, ValidationError> {
            let mut merged = record.clone();
            let changed = T::apply(&mut merged, patch);
            T::validate_record(&merged)?;
            *record = merged;
            Ok(changed.into_iter().map(str::to_string).collect())
        }

        let mismatch = ValidationError::KindMismatch {
            expected: self.kind(),
            actual: changes.kind(),
        };
        match (self, changes) {
            (Self::Application(r), ArtifactChanges::Application(p)) => {
                merge::<ApplicationArtifact>(r, p)
            }
            (Self::Interface(r), ArtifactChanges::Interface(p)) => merge::<InterfaceArtifact>(r, p),
            (Self::BusinessProcess(r), ArtifactChanges::BusinessProcess(p)) => {
                merge::<BusinessProcessArtifact>(r, p)
            }
            (Self::ChangeRequest(r), ArtifactChanges::ChangeRequest(p)) => {
                merge::<ChangeRequestArtifact>(r, p)
            }
            (Self::TechnicalProcess(r), ArtifactChanges::TechnicalProcess(p)) => {
                merge::<TechnicalProcessArtifact>(r, p)
            }
            (Self::InternalActivity(r), ArtifactChanges::InternalActivity(p)) => {
                merge::<InternalActivityArtifact>(r, p)
            }
            _ => Err(mismatch),
        }
    }

    /// Fields whose value differs between `self` and `other`
    #[must_use]
    pub fn diff(&self, other: &ArtifactRecord) -> FieldSet {
        changed_fields(&self.to_fields(), &other.to_fields())
    }

    /// Copy of `self` with `fields` taken from `source`
    ///
    /// Used to replay an initiative's edits onto a newer baseline.
    ///
    /// # Errors
    /// Returns error if the kinds differ or the result does not validate
    pub fn overlay(&self, source: &ArtifactRecord, fields: &FieldSet) -> Result<Self, ValidationError> {
        if self.kind() != source.kind() {
            return Err(ValidationError::KindMismatch {
                expected: self.kind(),
                actual: source.kind(),
            });
        }
        let mut target = self.to_fields();
        let from = source.to_fields();
        for field in fields {
            if let Some(value) = from.get(field) {
                target.insert(field.clone(), value.clone());
            }
        }
        Self::from_json(self.kind(), Value::Object(target))
    }

    /// Copy of `self` with individual field values replaced
    ///
    /// # Errors
    /// Returns error if the result does not decode or validate
    pub fn with_values(&self, values: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut target = self.to_fields();
        for (field, value) in values {
            target.insert(field.clone(), value.clone());
        }
        Self::from_json(self.kind(), Value::Object(target))
    }
}

/// Validated partial update of any kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArtifactChanges {
    Application(ApplicationPatch),
    Interface(InterfacePatch),
    BusinessProcess(BusinessProcessPatch),
    ChangeRequest(ChangeRequestPatch),
    TechnicalProcess(TechnicalProcessPatch),
    InternalActivity(InternalActivityPatch),
}

impl ArtifactChanges {
    /// Decode and validate an untagged JSON object as changes for `kind`
    ///
    /// # Errors
    /// - [`ValidationError::Malformed`] on unknown fields or wrong types
    /// - [`ValidationError::EmptyChanges`] when nothing is set
    /// - the kind's field validation error
    pub fn from_json(kind: ArtifactKind, value: Value) -> Result<Self, ValidationError> {
        fn decode<T: ArtifactType>(value: Value) -> Result<T::Patch, ValidationError> {
            let patch: T::Patch =
                serde_json::from_value(value).map_err(|e| ValidationError::Malformed {
                    kind: T::KIND,
                    message: e.to_string(),
                })?;
            Ok(patch)
        }

        let changes = match kind {
            ArtifactKind::Application => Self::Application(decode::<ApplicationArtifact>(value)?),
            ArtifactKind::Interface => Self::Interface(decode::<InterfaceArtifact>(value)?),
            ArtifactKind::BusinessProcess => {
                Self::BusinessProcess(decode::<BusinessProcessArtifact>(value)?)
            }
            ArtifactKind::ChangeRequest => {
                Self::ChangeRequest(decode::<ChangeRequestArtifact>(value)?)
            }
            ArtifactKind::TechnicalProcess => {
                Self::TechnicalProcess(decode::<TechnicalProcessArtifact>(value)?)
            }
            ArtifactKind::InternalActivity => {
                Self::InternalActivity(decode::<InternalActivityArtifact>(value)?)
            }
        };
        changes.validate()?;
        Ok(changes)
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        dispatch!(self, ArtifactChanges, _, T => T::KIND)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        dispatch!(self, ArtifactChanges, p, T => T::patch_is_empty(p))
    }

    /// Validate supplied values, rejecting empty updates
    ///
    /// # Errors
    /// Returns error if the update is empty or a value is invalid
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyChanges);
        }
        dispatch!(self, ArtifactChanges, p, T => T::validate_patch(p))
    }

    /// Field names carried by this update
    #[must_use]
    pub fn fields(&self) -> FieldSet {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
            _ => FieldSet::new(),
        }
    }
}

impl From<ApplicationRecord> for ArtifactRecord {
    fn from(record: ApplicationRecord) -> Self {
        Self::Application(record)
    }
}

impl From<InterfaceRecord> for ArtifactRecord {
    fn from(record: InterfaceRecord) -> Self {
        Self::Interface(record)
    }
}

impl From<BusinessProcessRecord> for ArtifactRecord {
    fn from(record: BusinessProcessRecord) -> Self {
        Self::BusinessProcess(record)
    }
}

impl From<ChangeRequestRecord> for ArtifactRecord {
    fn from(record: ChangeRequestRecord) -> Self {
        Self::ChangeRequest(record)
    }
}

impl From<TechnicalProcessRecord> for ArtifactRecord {
    fn from(record: TechnicalProcessRecord) -> Self {
        Self::TechnicalProcess(record)
    }
}

impl From<InternalActivityRecord> for ArtifactRecord {
    fn from(record: InternalActivityRecord) -> Self {
        Self::InternalActivity(record)
    }
}

impl From<ApplicationPatch> for ArtifactChanges {
    fn from(patch: ApplicationPatch) -> Self {
        Self::Application(patch)
    }
}

impl From<InterfacePatch> for ArtifactChanges {
    fn from(patch: InterfacePatch) -> Self {
        Self::Interface(patch)
    }
}

impl From<BusinessProcessPatch> for ArtifactChanges {
    fn from(patch: BusinessProcessPatch) -> Self {
        Self::BusinessProcess(patch)
    }
}

impl From<ChangeRequestPatch> for ArtifactChanges {
    fn from(patch: ChangeRequestPatch) -> Self {
        Self::ChangeRequest(patch)
    }
}

impl From<TechnicalProcessPatch> for ArtifactChanges {
    fn from(patch: TechnicalProcessPatch) -> Self {
        Self::TechnicalProcess(patch)
    }
}

impl From<InternalActivityPatch> for ArtifactChanges {
    fn from(patch: InternalActivityPatch) -> Self {
        Self::InternalActivity(patch)
    }
}
