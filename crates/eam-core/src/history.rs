//! Revision history and version comparison

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use eam_artifact::{field_value, ArtifactRecord, ArtifactRef, FieldSet, InitiativeId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::{BaselineEntry, ShadowVersion};

/// One production revision and what it changed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSummary {
    pub revision: u64,
    pub name: String,
    pub data: ArtifactRecord,
    /// Fields that differ from the previous recorded revision
    pub changed_fields: FieldSet,
    pub updated_at: DateTime<Utc>,
    pub updated_by: UserId,
}

/// Production revisions of one artifact plus its initiative shadows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHistory {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    /// Oldest first
    pub revisions: Vec<RevisionSummary>,
    pub shadows: Vec<ShadowVersion>,
}

impl ArtifactHistory {
    /// Summarise `entries` (oldest first) against their predecessors
    #[must_use]
    pub fn new(artifact: ArtifactRef, entries: Vec<BaselineEntry>, shadows: Vec<ShadowVersion>) -> Self {
        let mut revisions: Vec<RevisionSummary> = Vec::with_capacity(entries.len());
        for entry in entries {
            let changed_fields = match revisions.last() {
                Some(prev) => prev.data.diff(&entry.record),
                None => FieldSet::new(),
            };
            revisions.push(RevisionSummary {
                revision: entry.revision,
                name: entry.record.display_name(),
                data: entry.record,
                changed_fields,
                updated_at: entry.updated_at,
                updated_by: entry.updated_by,
            });
        }
        Self {
            artifact,
            revisions,
            shadows,
        }
    }
}

/// Which version of an artifact to compare
///
/// Written as `current`, a revision number (`3` or `r3`), or
/// `initiative:<id>` for that initiative's shadow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum VersionRef {
    Current,
    Revision(u64),
    Shadow(InitiativeId),
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Revision(r) => write!(f, "r{r}"),
            Self::Shadow(id) => write!(f, "initiative:{id}"),
        }
    }
}

impl FromStr for VersionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") || s.eq_ignore_ascii_case("production") {
            return Ok(Self::Current);
        }
        if let Some(id) = s.strip_prefix("initiative:") {
            if id.is_empty() {
                return Err("initiative version needs an id".into());
            }
            return Ok(Self::Shadow(InitiativeId::from(id)));
        }
        s.strip_prefix('r')
            .unwrap_or(s)
            .parse::<u64>()
            .map(Self::Revision)
            .map_err(|_| format!("unknown version `{s}`"))
    }
}

impl From<VersionRef> for String {
    fn from(v: VersionRef) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for VersionRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One field that differs between two versions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

/// Field-level difference between two versions of one artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub from: VersionRef,
    pub to: VersionRef,
    pub changes: Vec<FieldChange>,
}

/// Changed fields between `from` and `to`, in field-name order
#[must_use]
pub fn compare_records(from: &ArtifactRecord, to: &ArtifactRecord) -> Vec<FieldChange> {
    let before = from.to_fields();
    let after = to.to_fields();
    from.diff(to)
        .into_iter()
        .map(|field| FieldChange {
            from: field_value(&before, &field),
            to: field_value(&after, &field),
            field,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use eam_artifact::{ApplicationRecord, ArtifactKind, LifecycleState};
    use serde_json::json;

    fn entry(revision: u64, name: &str, team: Option<&str>) -> BaselineEntry {
        let mut record = ApplicationRecord::new("AML-0042", name);
        record.team = team.map(str::to_string);
        BaselineEntry {
            artifact: ArtifactRef::new(ArtifactKind::Application, 42),
            record: record.into(),
            artifact_state: LifecycleState::Active,
            initiative_origin: None,
            revision,
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_by: UserId(9),
        }
    }

    #[test]
    fn version_ref_parses_and_prints() {
        assert_eq!("current".parse::<VersionRef>().unwrap(), VersionRef::Current);
        assert_eq!("3".parse::<VersionRef>().unwrap(), VersionRef::Revision(3));
        assert_eq!("r3".parse::<VersionRef>().unwrap(), VersionRef::Revision(3));
        assert_eq!(
            "initiative:I-100".parse::<VersionRef>().unwrap(),
            VersionRef::Shadow("I-100".into())
        );
        assert!("initiative:".parse::<VersionRef>().is_err());
        assert!("latest".parse::<VersionRef>().is_err());
        assert_eq!(
            serde_json::to_value(VersionRef::Shadow("I-100".into())).unwrap(),
            json!("initiative:I-100")
        );
    }

    #[test]
    fn history_marks_fields_changed_per_revision() {
        let history = ArtifactHistory::new(
            ArtifactRef::new(ArtifactKind::Application, 42),
            vec![
                entry(1, "Billing", None),
                entry(2, "Billing", Some("Core")),
                entry(3, "Billing Hub", Some("Core")),
            ],
            Vec::new(),
        );
        let changed: Vec<Vec<&str>> = history
            .revisions
            .iter()
            .map(|r| r.changed_fields.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(changed, vec![vec![], vec!["team"], vec!["name"]]);
        assert_eq!(history.revisions[2].name, "Billing Hub");
    }

    #[test]
    fn compare_lists_both_values() {
        let a = entry(1, "Billing", None).record;
        let b = entry(2, "Billing Hub", Some("Core")).record;
        let changes = compare_records(&a, &b);
        assert_eq!(
            changes,
            vec![
                FieldChange {
                    field: "name".into(),
                    from: json!("Billing"),
                    to: json!("Billing Hub"),
                },
                FieldChange {
                    field: "team".into(),
                    from: Value::Null,
                    to: json!("Core"),
                },
            ]
        );
        assert!(compare_records(&a, &a).is_empty());
    }
}
