//! Per-field automatic merge of conflicting values
//!
//! [`strategy_for_field`] picks a [`MergeStrategy`] from the field name and
//! the shape of its value; [`merge_field`] applies it to one
//! [`ConflictField`]. Every outcome carries a confidence in `0.0..=1.0` and
//! whether a person should still review it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use eam_artifact::ArtifactKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::conflict::ConflictField;

/// How one conflicting field is merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Join both texts unless one already contains the other
    Concatenate,
    /// Most recent date wins
    Latest,
    /// Highest version components, patch bumped when both sides agree
    Increment,
    /// Mean of two numbers
    Average,
    /// Most active status wins
    StateMachine,
    /// Keep additions and removals from both sides
    ArrayMerge,
    /// Three-way merge of object keys
    ObjectMerge,
    /// TM Forum domain classification
    TmfDomain,
    /// Interface contract field, always reviewed
    InterfaceContract,
    /// No automatic rule, production value kept for review
    Manual,
}

/// Merge result for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMerge {
    pub field: String,
    pub strategy: MergeStrategy,
    pub value: Value,
    pub confidence: f64,
    pub explanation: String,
    pub requires_review: bool,
}

const CONTRACT_FIELDS: [&str; 4] = ["interfaceType", "protocol", "dataFlow", "middleware"];

const STATUS_PRECEDENCE: [&str; 7] = [
    "active",
    "in_progress",
    "under_review",
    "maintenance",
    "inactive",
    "deprecated",
    "decommissioned",
];

const APPROVAL_PRECEDENCE: [&str; 5] = ["approved", "pending", "under_review", "rejected", "draft"];

const TMF_DOMAINS: [&str; 6] = ["enterprise", "customer", "product", "service", "resource", "partner"];

static VERSION_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok());

/// Strategy for `field` of a `kind` artifact whose value looks like `sample`
#[must_use]
pub fn strategy_for_field(kind: ArtifactKind, field: &str, sample: &Value) -> MergeStrategy {
    if field == "status" || field.contains("Status") {
        return MergeStrategy::StateMachine;
    }
    if field == "version" || field.contains("Version") {
        return MergeStrategy::Increment;
    }
    if field.contains("Date") || field.contains("At") {
        return MergeStrategy::Latest;
    }
    if matches!(field, "description" | "documentation" | "notes") {
        return MergeStrategy::Concatenate;
    }
    if field.starts_with("tmf") {
        return MergeStrategy::TmfDomain;
    }
    if kind == ArtifactKind::Interface && CONTRACT_FIELDS.contains(&field) {
        return MergeStrategy::InterfaceContract;
    }
    match sample {
        Value::Array(_) => MergeStrategy::ArrayMerge,
        Value::Object(_) => MergeStrategy::ObjectMerge,
        Value::Number(_) => MergeStrategy::Average,
        _ => MergeStrategy::Manual,
    }
}

/// Merge every field of a conflict
#[must_use]
pub fn auto_merge(kind: ArtifactKind, fields: &[ConflictField]) -> Vec<FieldMerge> {
    fields.iter().map(|f| merge_field(kind, f)).collect()
}

/// Merge one conflicting field with the strategy chosen for it
#[must_use]
pub fn merge_field(kind: ArtifactKind, field: &ConflictField) -> FieldMerge {
    let sample = if field.production_value.is_null() {
        &field.initiative_value
    } else {
        &field.production_value
    };
    let strategy = strategy_for_field(kind, &field.field, sample);
    let sides = Sides {
        field: &field.field,
        base: &field.base_value,
        production: &field.production_value,
        initiative: &field.initiative_value,
    };
    let merged = match strategy {
        MergeStrategy::Concatenate => sides.concatenate(),
        MergeStrategy::Latest => sides.latest(),
        MergeStrategy::Increment => sides.increment(),
        MergeStrategy::Average => sides.average(),
        MergeStrategy::StateMachine => sides.state_machine(),
        MergeStrategy::ArrayMerge => sides.array_merge(),
        MergeStrategy::ObjectMerge => sides.object_merge(),
        MergeStrategy::TmfDomain => sides.tmf_domain(),
        MergeStrategy::InterfaceContract => Merged::review(
            sides.initiative.clone(),
            0.5,
            "Interface contract field changed on both sides",
        ),
        MergeStrategy::Manual => Merged {
            value: sides.production.clone(),
            confidence: 0.0,
            explanation: "No automatic strategy for this field".into(),
            requires_review: true,
        },
    };
    FieldMerge {
        field: field.field.clone(),
        strategy,
        value: merged.value,
        confidence: merged.confidence,
        explanation: merged.explanation,
        requires_review: merged.requires_review,
    }
}

struct Merged {
    value: Value,
    confidence: f64,
    explanation: String,
    requires_review: bool,
}

impl Merged {
    fn clean(value: Value, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            explanation: explanation.into(),
            requires_review: false,
        }
    }

    fn review(value: Value, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            explanation: explanation.into(),
            requires_review: true,
        }
    }
}

/// The three values of one conflicting field
struct Sides<'a> {
    field: &'a str,
    base: &'a Value,
    production: &'a Value,
    initiative: &'a Value,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn parse_instant(value: &Value) -> Option<NaiveDateTime> {
    let raw = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Semver {
    major: u64,
    minor: u64,
    patch: u64,
}

fn parse_version(value: &Value) -> Option<Semver> {
    let pattern = VERSION_PATTERN.as_ref()?;
    let caps = pattern.captures(value.as_str()?)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    Some(Semver {
        major: part(1)?,
        minor: part(2)?,
        patch: part(3).unwrap_or(0),
    })
}

impl Sides<'_> {
    fn concatenate(&self) -> Merged {
        match (is_blank(self.production), is_blank(self.initiative)) {
            (true, true) => return Merged::clean(Value::Null, 1.0, "Both values are empty"),
            (true, false) => {
                return Merged::clean(self.initiative.clone(), 1.0, "Only the initiative has a value")
            }
            (false, true) => {
                return Merged::clean(self.production.clone(), 1.0, "Only production has a value")
            }
            (false, false) => {}
        }
        let (Some(production), Some(initiative)) = (self.production.as_str(), self.initiative.as_str())
        else {
            return Merged::review(self.production.clone(), 0.0, "Values are not text");
        };
        if production.contains(initiative) {
            return Merged::clean(
                self.production.clone(),
                0.9,
                "Production already contains the initiative text",
            );
        }
        if initiative.contains(production) {
            return Merged::clean(
                self.initiative.clone(),
                0.9,
                "Initiative already contains the production text",
            );
        }
        Merged::review(
            Value::String(format!("{production}\n\n--- Merged from Initiative ---\n{initiative}")),
            0.7,
            "Concatenated both values",
        )
    }

    fn latest(&self) -> Merged {
        let (Some(production), Some(initiative)) =
            (parse_instant(self.production), parse_instant(self.initiative))
        else {
            return Merged::review(self.initiative.clone(), 0.5, "Invalid date format");
        };
        if production > initiative {
            Merged::clean(self.production.clone(), 1.0, "Production value is more recent")
        } else {
            Merged::clean(self.initiative.clone(), 1.0, "Initiative value is more recent")
        }
    }

    fn increment(&self) -> Merged {
        let (Some(base), Some(production), Some(initiative)) = (
            parse_version(self.base),
            parse_version(self.production),
            parse_version(self.initiative),
        ) else {
            return Merged::review(self.initiative.clone(), 0.5, "Unable to parse version format");
        };

        if production.major > base.major && initiative.major > base.major {
            let major = production.major.max(initiative.major);
            return Merged::review(
                Value::String(format!("{major}.0.0")),
                0.5,
                "Both sides incremented the major version",
            );
        }

        let mut merged = Semver {
            major: production.major.max(initiative.major),
            minor: production.minor.max(initiative.minor),
            patch: production.patch.max(initiative.patch),
        };
        if production == initiative {
            merged.patch += 1;
        }
        Merged::clean(
            Value::String(format!("{}.{}.{}", merged.major, merged.minor, merged.patch)),
            0.8,
            "Took the highest version components",
        )
    }

    fn average(&self) -> Merged {
        let (Some(production), Some(initiative)) = (self.production.as_f64(), self.initiative.as_f64())
        else {
            return Merged::review(self.production.clone(), 0.0, "Values are not numeric");
        };
        let spread = production.abs().max(initiative.abs());
        let percent_diff = if spread == 0.0 {
            0.0
        } else {
            (production - initiative).abs() / spread
        };

        let value = match (self.production.as_i64(), self.initiative.as_i64()) {
            (Some(a), Some(b)) => Value::from(a / 2 + b / 2 + (a % 2 + b % 2) / 2),
            _ => match Number::from_f64((production + initiative) / 2.0) {
                Some(n) => Value::Number(n),
                None => return Merged::review(self.production.clone(), 0.0, "Average is not finite"),
            },
        };
        Merged {
            value,
            confidence: if percent_diff < 0.1 { 0.9 } else { 0.6 },
            explanation: format!("Averaged values ({:.0}% difference)", percent_diff * 100.0),
            requires_review: percent_diff > 0.2,
        }
    }

    fn state_machine(&self) -> Merged {
        let states: &[&str] = if self.field == "approvalStatus" {
            &APPROVAL_PRECEDENCE
        } else {
            &STATUS_PRECEDENCE
        };
        let rank = |v: &Value| v.as_str().and_then(|s| states.iter().position(|x| *x == s));
        let (Some(production), Some(initiative)) = (rank(self.production), rank(self.initiative))
        else {
            return Merged::review(self.production.clone(), 0.5, "Unknown status value");
        };
        let (value, source) = if production < initiative {
            (self.production.clone(), "production")
        } else {
            (self.initiative.clone(), "initiative")
        };
        Merged {
            value,
            confidence: 0.8,
            explanation: format!("Selected the {source} status as the more active state"),
            requires_review: production.abs_diff(initiative) > 2,
        }
    }

    fn array_merge(&self) -> Merged {
        let (Some(production), Some(initiative)) = (self.production.as_array(), self.initiative.as_array())
        else {
            return Merged::review(self.production.clone(), 0.0, "Values are not arrays");
        };
        let empty = Vec::new();
        let base = self.base.as_array().unwrap_or(&empty);

        let removed = |side: &Vec<Value>, item: &Value| !side.contains(item);
        let mut merged: Vec<Value> = base
            .iter()
            .filter(|item| !removed(production, item) && !removed(initiative, item))
            .cloned()
            .collect();
        for item in production.iter().chain(initiative) {
            if !base.contains(item) && !merged.contains(item) {
                merged.push(item.clone());
            }
        }
        Merged::clean(Value::Array(merged), 0.8, "Kept additions and removals from both sides")
    }

    fn object_merge(&self) -> Merged {
        let (Some(production), Some(initiative)) =
            (self.production.as_object(), self.initiative.as_object())
        else {
            return Merged::review(self.production.clone(), 0.0, "Values are not objects");
        };
        let empty = Map::new();
        let base = self.base.as_object().unwrap_or(&empty);

        let mut keys: Vec<&String> = base.keys().chain(production.keys()).chain(initiative.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut merged = Map::new();
        let mut conflicts = Vec::new();
        for key in keys {
            let b = base.get(key).unwrap_or(&Value::Null);
            let p = production.get(key).unwrap_or(&Value::Null);
            let i = initiative.get(key).unwrap_or(&Value::Null);
            let value = if p == i || b == i {
                p
            } else if b == p {
                i
            } else {
                conflicts.push(key.as_str());
                p
            };
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }

        if conflicts.is_empty() {
            Merged::clean(Value::Object(merged), 1.0, "Objects merged without conflicts")
        } else {
            Merged::review(
                Value::Object(merged),
                0.6,
                format!("Both sides changed keys: {}", conflicts.join(", ")),
            )
        }
    }

    fn tmf_domain(&self) -> Merged {
        let rank = |v: &Value| {
            v.as_str()
                .and_then(|s| TMF_DOMAINS.iter().position(|d| *d == s))
                .unwrap_or(usize::MAX)
        };
        let production = rank(self.production);
        let initiative = rank(self.initiative);
        if production < initiative && initiative != usize::MAX {
            return Merged::review(
                self.production.clone(),
                0.7,
                "Production holds the higher-level domain",
            );
        }
        Merged {
            value: self.initiative.clone(),
            confidence: 0.8,
            explanation: "Initiative domain classification selected".into(),
            requires_review: production.abs_diff(initiative) > 2,
        }
    }
}
