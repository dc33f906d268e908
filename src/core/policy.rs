use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

pub const RELEASE_FIELD: &str = "Release";
pub const DISPLAY_NAME_FIELD: &str = "Display Name";
pub const DEFAULT_SEPARATOR: &str = "|";

/// Which rows get published and which count as duplicates.
///
/// Dedup keys join field values with `separator`, missing fields as empty
/// strings. A value containing the separator can therefore collide with a
/// different split of fields; that is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPolicy {
    /// Rows are kept only when this column is `"true"` (or JSON `true`).
    pub release_field: Option<String>,
    /// Ordered fields forming the dedup key. Empty disables dedup.
    pub dedup_fields: Vec<String>,
    /// Rows where this column is blank skip dedup and are always kept.
    pub bypass_field: Option<String>,
    pub separator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    /// Release filter, dedup by `Location`, rows without a `Display Name` always kept.
    #[default]
    #[serde(alias = "default")]
    Location,
    Composite,
    #[serde(alias = "display-name-context")]
    DisplayNameContext,
    #[serde(alias = "none")]
    Passthrough,
}

impl PolicyPreset {
    pub fn policy(self) -> RecordPolicy {
        let release = Some(RELEASE_FIELD.to_string());
        let fields = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match self {
            PolicyPreset::Location => RecordPolicy {
                release_field: release,
                dedup_fields: fields(&["Location"]),
                bypass_field: Some(DISPLAY_NAME_FIELD.to_string()),
                separator: DEFAULT_SEPARATOR.to_string(),
            },
            PolicyPreset::Composite => RecordPolicy {
                release_field: release,
                dedup_fields: fields(&[
                    "Context",
                    DISPLAY_NAME_FIELD,
                    "Alt",
                    "Location",
                    "Credit/Institutions",
                ]),
                bypass_field: None,
                separator: DEFAULT_SEPARATOR.to_string(),
            },
            PolicyPreset::DisplayNameContext => RecordPolicy {
                release_field: release,
                dedup_fields: fields(&[DISPLAY_NAME_FIELD, "Context"]),
                bypass_field: None,
                separator: DEFAULT_SEPARATOR.to_string(),
            },
            PolicyPreset::Passthrough => RecordPolicy {
                release_field: None,
                dedup_fields: Vec::new(),
                bypass_field: None,
                separator: DEFAULT_SEPARATOR.to_string(),
            },
        }
    }
}

impl FromStr for PolicyPreset {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "location" | "default" => Ok(PolicyPreset::Location),
            "composite" => Ok(PolicyPreset::Composite),
            "display_name_context" => Ok(PolicyPreset::DisplayNameContext),
            "passthrough" | "none" => Ok(PolicyPreset::Passthrough),
            other => Err(EtlError::InvalidConfigValueError {
                field: "policy.preset".to_string(),
                value: other.to_string(),
                reason: "Expected one of: location, composite, display_name_context, passthrough"
                    .to_string(),
            }),
        }
    }
}

impl Default for RecordPolicy {
    fn default() -> Self {
        PolicyPreset::default().policy()
    }
}

impl RecordPolicy {
    pub fn is_released(&self, record: &Record) -> bool {
        let Some(field) = &self.release_field else {
            return true;
        };

        match record.get(field) {
            Some(Value::String(s)) => s == "true",
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    pub fn dedup_key(&self, record: &Record) -> String {
        self.dedup_fields
            .iter()
            .map(|field| record.text(field))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn bypasses_dedup(&self, record: &Record) -> bool {
        self.bypass_field
            .as_deref()
            .is_some_and(|field| record.is_blank(field))
    }

    /// Release filter first, then first-seen dedup. Relative order is preserved.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut seen = HashSet::new();

        records
            .into_iter()
            .filter(|record| self.is_released(record))
            .filter(|record| {
                if self.dedup_fields.is_empty() || self.bypasses_dedup(record) {
                    return true;
                }
                seen.insert(self.dedup_key(record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::csv_parser::parse_csv;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_release_filter() {
        let policy = PolicyPreset::Location.policy();
        assert!(policy.is_released(&record(&[("Release", "true")])));
        assert!(!policy.is_released(&record(&[("Release", "false")])));
        assert!(!policy.is_released(&record(&[("Release", "TRUE")])));
        assert!(!policy.is_released(&record(&[("Other", "true")])));

        let mut data = serde_json::Map::new();
        data.insert("Release".to_string(), Value::Bool(true));
        assert!(policy.is_released(&Record::from(data)));
    }

    #[test]
    fn test_dedup_keeps_first_seen_in_order() {
        let policy = RecordPolicy {
            release_field: None,
            dedup_fields: vec!["Location".to_string()],
            bypass_field: None,
            separator: DEFAULT_SEPARATOR.to_string(),
        };
        let r1 = record(&[("id", "1"), ("Location", "Tokyo")]);
        let r2 = record(&[("id", "2"), ("Location", "Osaka")]);
        let r3 = record(&[("id", "3"), ("Location", "Tokyo")]);

        let kept = policy.apply(vec![r1.clone(), r2.clone(), r3]);
        assert_eq!(kept, vec![r1, r2]);
    }

    #[test]
    fn test_blank_display_name_bypasses_dedup() {
        let twin = record(&[("Release", "true"), ("Display Name", " "), ("Location", "Kyoto")]);

        let kept = PolicyPreset::Location.policy().apply(vec![twin.clone(), twin.clone()]);
        assert_eq!(kept.len(), 2);

        let kept = PolicyPreset::Composite.policy().apply(vec![twin.clone(), twin]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_missing_location_counts_as_empty_key() {
        let a = record(&[("Release", "true"), ("Display Name", "A")]);
        let b = record(&[("Release", "true"), ("Display Name", "B"), ("Location", "")]);

        let kept = PolicyPreset::Location.policy().apply(vec![a.clone(), b]);
        assert_eq!(kept, vec![a]);
    }

    #[test]
    fn test_composite_key_joins_with_separator() {
        let policy = PolicyPreset::DisplayNameContext.policy();
        let r = record(&[("Display Name", "Sign"), ("Context", "Hall")]);
        assert_eq!(policy.dedup_key(&r), "Sign|Hall");

        // 分隔符碰撞是已知限制
        let left = record(&[("Display Name", "a|b"), ("Context", "c")]);
        let right = record(&[("Display Name", "a"), ("Context", "b|c")]);
        assert_eq!(policy.dedup_key(&left), policy.dedup_key(&right));
    }

    #[test]
    fn test_passthrough_keeps_everything() {
        let rows = vec![record(&[("x", "1")]), record(&[("x", "1")])];
        assert_eq!(PolicyPreset::Passthrough.policy().apply(rows.clone()), rows);
    }

    #[test]
    fn test_release_then_location_dedup_end_to_end() {
        let csv = "Release,Display Name,Location\n\
                   true,Sign,Tokyo\n\
                   true,Sign,Tokyo\n\
                   false,Other,Osaka";

        let kept = RecordPolicy::default().apply(parse_csv(csv));

        assert_eq!(
            kept,
            vec![record(&[
                ("Release", "true"),
                ("Display Name", "Sign"),
                ("Location", "Tokyo")
            ])]
        );
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("composite".parse::<PolicyPreset>().unwrap(), PolicyPreset::Composite);
        assert_eq!(
            "display-name-context".parse::<PolicyPreset>().unwrap(),
            PolicyPreset::DisplayNameContext
        );
        assert!("bogus".parse::<PolicyPreset>().is_err());
    }
}
