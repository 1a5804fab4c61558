//! Concrete artifact records and their adapters
//!
//! One record struct, one patch struct and one [`ArtifactType`] marker per
//! [`ArtifactKind`].

use crate::artifact::{
    check_level, check_percentage, check_positive, check_reference, check_text, private,
    require_text, ArtifactType, ValidationError,
};
use crate::kind::{ArtifactKind, Reference, Relation};
use crate::patch::artifact_patch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Business criticality / priority scale shared by several kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

fn default_status() -> String {
    "active".to_string()
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Application in the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApplicationRecord {
    pub aml_number: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lob: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub criticality: Option<Criticality>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub tmf_domain: Option<String>,
}

impl ApplicationRecord {
    /// Minimal active application
    #[must_use]
    pub fn new(aml_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            aml_number: aml_number.into(),
            name: name.into(),
            description: None,
            lob: None,
            os: None,
            deployment: None,
            uptime: None,
            purpose: None,
            status: default_status(),
            criticality: None,
            team: None,
            tmf_domain: None,
        }
    }
}

artifact_patch! {
    /// Partial update of an [`ApplicationRecord`]
    ApplicationPatch for ApplicationRecord {
        required {
            aml_number: String => "amlNumber",
            name: String => "name",
            status: String => "status",
        }
        optional {
            description: String => "description",
            lob: String => "lob",
            os: String => "os",
            deployment: String => "deployment",
            uptime: f64 => "uptime",
            purpose: String => "purpose",
            criticality: Criticality => "criticality",
            team: String => "team",
            tmf_domain: String => "tmfDomain",
        }
    }
}

/// Adapter for applications
#[derive(Debug, Clone, Copy)]
pub struct ApplicationArtifact;

impl private::Sealed for ApplicationArtifact {}

impl ArtifactType for ApplicationArtifact {
    type Record = ApplicationRecord;
    type Patch = ApplicationPatch;
    const KIND: ArtifactKind = ArtifactKind::Application;

    fn display_name(record: &Self::Record) -> String {
        record.name.clone()
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        require_text("amlNumber", &record.aml_number)?;
        require_text("name", &record.name)?;
        require_text("status", &record.status)?;
        check_text("description", record.description.as_deref())?;
        check_text("purpose", record.purpose.as_deref())?;
        check_percentage("uptime", record.uptime)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        if let Some(v) = &patch.aml_number {
            require_text("amlNumber", v)?;
        }
        if let Some(v) = &patch.name {
            require_text("name", v)?;
        }
        if let Some(v) = &patch.status {
            require_text("status", v)?;
        }
        if let Some(v) = &patch.description {
            check_text("description", v.as_deref())?;
        }
        if let Some(v) = &patch.purpose {
            check_text("purpose", v.as_deref())?;
        }
        if let Some(v) = patch.uptime {
            check_percentage("uptime", v)?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Integration between two applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InterfaceRecord {
    pub iml_number: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider_application_id: Option<i64>,
    #[serde(default)]
    pub consumer_application_id: Option<i64>,
    pub interface_type: String,
    #[serde(default)]
    pub middleware: Option<String>,
    pub version: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub data_flow: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

artifact_patch! {
    /// Partial update of an [`InterfaceRecord`]
    InterfacePatch for InterfaceRecord {
        required {
            iml_number: String => "imlNumber",
            interface_type: String => "interfaceType",
            version: String => "version",
            status: String => "status",
        }
        optional {
            description: String => "description",
            provider_application_id: i64 => "providerApplicationId",
            consumer_application_id: i64 => "consumerApplicationId",
            middleware: String => "middleware",
            protocol: String => "protocol",
            data_flow: String => "dataFlow",
            frequency: String => "frequency",
        }
    }
}

/// Adapter for interfaces
#[derive(Debug, Clone, Copy)]
pub struct InterfaceArtifact;

impl private::Sealed for InterfaceArtifact {}

impl ArtifactType for InterfaceArtifact {
    type Record = InterfaceRecord;
    type Patch = InterfacePatch;
    const KIND: ArtifactKind = ArtifactKind::Interface;

    fn display_name(record: &Self::Record) -> String {
        record.iml_number.clone()
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        require_text("imlNumber", &record.iml_number)?;
        require_text("interfaceType", &record.interface_type)?;
        require_text("version", &record.version)?;
        require_text("status", &record.status)?;
        check_text("description", record.description.as_deref())?;
        check_reference("providerApplicationId", record.provider_application_id)?;
        check_reference("consumerApplicationId", record.consumer_application_id)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        for (field, value) in [
            ("imlNumber", &patch.iml_number),
            ("interfaceType", &patch.interface_type),
            ("version", &patch.version),
            ("status", &patch.status),
        ] {
            if let Some(v) = value {
                require_text(field, v)?;
            }
        }
        if let Some(v) = &patch.description {
            check_text("description", v.as_deref())?;
        }
        if let Some(v) = patch.provider_application_id {
            check_reference("providerApplicationId", v)?;
        }
        if let Some(v) = patch.consumer_application_id {
            check_reference("consumerApplicationId", v)?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }

    fn references(record: &Self::Record) -> Vec<Reference> {
        let app = ArtifactKind::Application;
        [
            ("providerApplicationId", Relation::Provider, record.provider_application_id),
            ("consumerApplicationId", Relation::Consumer, record.consumer_application_id),
        ]
        .into_iter()
        .filter_map(|(field, relation, id)| id.map(|id| Reference::new(field, relation, app, id)))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Business process
// ---------------------------------------------------------------------------

/// Business process in the capability hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BusinessProcessRecord {
    pub business_process: String,
    pub lob: String,
    pub product: String,
    pub version: String,
    pub level: String,
    #[serde(default)]
    pub domain_owner: Option<String>,
    #[serde(default)]
    pub it_owner: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

artifact_patch! {
    /// Partial update of a [`BusinessProcessRecord`]
    BusinessProcessPatch for BusinessProcessRecord {
        required {
            business_process: String => "businessProcess",
            lob: String => "lob",
            product: String => "product",
            version: String => "version",
            level: String => "level",
            status: String => "status",
        }
        optional {
            domain_owner: String => "domainOwner",
            it_owner: String => "itOwner",
        }
    }
}

/// Adapter for business processes
#[derive(Debug, Clone, Copy)]
pub struct BusinessProcessArtifact;

impl private::Sealed for BusinessProcessArtifact {}

impl ArtifactType for BusinessProcessArtifact {
    type Record = BusinessProcessRecord;
    type Patch = BusinessProcessPatch;
    const KIND: ArtifactKind = ArtifactKind::BusinessProcess;

    fn display_name(record: &Self::Record) -> String {
        format!("{} [{}]", record.business_process, record.level)
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        require_text("businessProcess", &record.business_process)?;
        require_text("lob", &record.lob)?;
        require_text("product", &record.product)?;
        require_text("version", &record.version)?;
        require_text("status", &record.status)?;
        check_level(&record.level)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        for (field, value) in [
            ("businessProcess", &patch.business_process),
            ("lob", &patch.lob),
            ("product", &patch.product),
            ("version", &patch.version),
            ("status", &patch.status),
        ] {
            if let Some(v) = value {
                require_text(field, v)?;
            }
        }
        if let Some(level) = &patch.level {
            check_level(level)?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Change request
// ---------------------------------------------------------------------------

/// Change request tracked against the architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeRequestRecord {
    pub cr_number: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub priority: Option<Criticality>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

artifact_patch! {
    /// Partial update of a [`ChangeRequestRecord`]
    ChangeRequestPatch for ChangeRequestRecord {
        required {
            cr_number: String => "crNumber",
            title: String => "title",
            status: String => "status",
        }
        optional {
            description: String => "description",
            reason: String => "reason",
            priority: Criticality => "priority",
            owner: String => "owner",
            target_date: NaiveDate => "targetDate",
        }
    }
}

/// Adapter for change requests
#[derive(Debug, Clone, Copy)]
pub struct ChangeRequestArtifact;

impl private::Sealed for ChangeRequestArtifact {}

impl ArtifactType for ChangeRequestArtifact {
    type Record = ChangeRequestRecord;
    type Patch = ChangeRequestPatch;
    const KIND: ArtifactKind = ArtifactKind::ChangeRequest;

    fn display_name(record: &Self::Record) -> String {
        format!("{}: {}", record.cr_number, record.title)
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        require_text("crNumber", &record.cr_number)?;
        require_text("title", &record.title)?;
        require_text("status", &record.status)?;
        check_text("description", record.description.as_deref())?;
        check_text("reason", record.reason.as_deref())
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        for (field, value) in [
            ("crNumber", &patch.cr_number),
            ("title", &patch.title),
            ("status", &patch.status),
        ] {
            if let Some(v) = value {
                require_text(field, v)?;
            }
        }
        if let Some(v) = &patch.description {
            check_text("description", v.as_deref())?;
        }
        if let Some(v) = &patch.reason {
            check_text("reason", v.as_deref())?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Technical process
// ---------------------------------------------------------------------------

/// Scheduled job or batch process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TechnicalProcessRecord {
    pub name: String,
    pub job_name: String,
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency: String,
    #[serde(default)]
    pub schedule: Option<String>,
    pub criticality: Criticality,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub owner: Option<String>,
}

artifact_patch! {
    /// Partial update of a [`TechnicalProcessRecord`]
    TechnicalProcessPatch for TechnicalProcessRecord {
        required {
            name: String => "name",
            job_name: String => "jobName",
            frequency: String => "frequency",
            criticality: Criticality => "criticality",
            status: String => "status",
        }
        optional {
            application_id: i64 => "applicationId",
            description: String => "description",
            schedule: String => "schedule",
            owner: String => "owner",
        }
    }
}

/// Adapter for technical processes
#[derive(Debug, Clone, Copy)]
pub struct TechnicalProcessArtifact;

impl private::Sealed for TechnicalProcessArtifact {}

impl ArtifactType for TechnicalProcessArtifact {
    type Record = TechnicalProcessRecord;
    type Patch = TechnicalProcessPatch;
    const KIND: ArtifactKind = ArtifactKind::TechnicalProcess;

    fn display_name(record: &Self::Record) -> String {
        record.name.clone()
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        require_text("name", &record.name)?;
        require_text("jobName", &record.job_name)?;
        require_text("frequency", &record.frequency)?;
        require_text("status", &record.status)?;
        check_reference("applicationId", record.application_id)?;
        check_text("description", record.description.as_deref())
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &patch.name),
            ("jobName", &patch.job_name),
            ("frequency", &patch.frequency),
            ("status", &patch.status),
        ] {
            if let Some(v) = value {
                require_text(field, v)?;
            }
        }
        if let Some(v) = patch.application_id {
            check_reference("applicationId", v)?;
        }
        if let Some(v) = &patch.description {
            check_text("description", v.as_deref())?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }

    fn references(record: &Self::Record) -> Vec<Reference> {
        record
            .application_id
            .map(|id| Reference::new("applicationId", Relation::Host, ArtifactKind::Application, id))
            .into_iter()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Internal activity
// ---------------------------------------------------------------------------

/// Step performed inside one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InternalActivityRecord {
    pub application_id: i64,
    pub activity_name: String,
    pub activity_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<i32>,
    #[serde(default)]
    pub business_process_id: Option<i64>,
}

artifact_patch! {
    /// Partial update of an [`InternalActivityRecord`]
    InternalActivityPatch for InternalActivityRecord {
        required {
            application_id: i64 => "applicationId",
            activity_name: String => "activityName",
            activity_type: String => "activityType",
        }
        optional {
            description: String => "description",
            sequence_number: i32 => "sequenceNumber",
            business_process_id: i64 => "businessProcessId",
        }
    }
}

/// Adapter for internal activities
#[derive(Debug, Clone, Copy)]
pub struct InternalActivityArtifact;

impl private::Sealed for InternalActivityArtifact {}

impl ArtifactType for InternalActivityArtifact {
    type Record = InternalActivityRecord;
    type Patch = InternalActivityPatch;
    const KIND: ArtifactKind = ArtifactKind::InternalActivity;

    fn display_name(record: &Self::Record) -> String {
        record.activity_name.clone()
    }

    fn validate_record(record: &Self::Record) -> Result<(), ValidationError> {
        check_reference("applicationId", Some(record.application_id))?;
        require_text("activityName", &record.activity_name)?;
        require_text("activityType", &record.activity_type)?;
        check_text("description", record.description.as_deref())?;
        check_positive("sequenceNumber", record.sequence_number)?;
        check_reference("businessProcessId", record.business_process_id)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError> {
        if let Some(v) = patch.application_id {
            check_reference("applicationId", Some(v))?;
        }
        if let Some(v) = &patch.activity_name {
            require_text("activityName", v)?;
        }
        if let Some(v) = &patch.activity_type {
            require_text("activityType", v)?;
        }
        if let Some(v) = &patch.description {
            check_text("description", v.as_deref())?;
        }
        if let Some(v) = patch.sequence_number {
            check_positive("sequenceNumber", v)?;
        }
        if let Some(v) = patch.business_process_id {
            check_reference("businessProcessId", v)?;
        }
        Ok(())
    }

    fn apply(record: &mut Self::Record, patch: &Self::Patch) -> Vec<&'static str> {
        patch.apply_to(record)
    }

    fn patch_is_empty(patch: &Self::Patch) -> bool {
        patch.is_empty()
    }

    fn references(record: &Self::Record) -> Vec<Reference> {
        let mut refs = vec![Reference::new(
            "applicationId",
            Relation::Host,
            ArtifactKind::Application,
            record.application_id,
        )];
        if let Some(id) = record.business_process_id {
            refs.push(Reference::new(
                "businessProcessId",
                Relation::Process,
                ArtifactKind::BusinessProcess,
                id,
            ));
        }
        refs
    }
}
