//! Form configuration root types

use crate::error::ParseWarning;
use crate::field::ParsedFieldConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_SUBMIT_LABEL: &str = "Submit";
pub const DEFAULT_NEXT_LABEL: &str = "Next";
pub const DEFAULT_PREVIOUS_LABEL: &str = "Previous";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Form-level rendering settings. Unknown literal keys land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    pub submit_label: String,
    pub next_label: String,
    pub previous_label: String,
    pub show_progress: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            submit_label: DEFAULT_SUBMIT_LABEL.to_string(),
            next_label: DEFAULT_NEXT_LABEL.to_string(),
            previous_label: DEFAULT_PREVIOUS_LABEL.to_string(),
            show_progress: false,
            extra: BTreeMap::new(),
        }
    }
}

/// Root output of a parse. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFormConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<ParsedFieldConfig>,
    #[serde(default)]
    pub pages: Vec<PageDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<TabDescriptor>>,
    #[serde(default)]
    pub settings: FormSettings,
}

impl ParsedFormConfig {
    pub fn field(&self, name: &str) -> Option<&ParsedFieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Deepest nested field level across all top-level fields.
    pub fn max_depth(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.nesting_depth())
            .max()
            .unwrap_or(0)
    }

    pub fn is_paged(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn is_tabbed(&self) -> bool {
        self.tabs.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

/// Successful parse result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub config: ParsedFormConfig,
    #[serde(default)]
    pub warnings: Vec<ParseWarning>,
    /// SHA-256 hex digest of the normalized candidate expression.
    pub source_digest: String,
}

impl ParseOutcome {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldType, ObjectConfig};

    #[test]
    fn test_settings_defaults() {
        let settings = FormSettings::default();
        assert_eq!(settings.submit_label, "Submit");
        assert_eq!(settings.next_label, "Next");
        assert_eq!(settings.previous_label, "Previous");
        assert!(!settings.show_progress);
    }

    #[test]
    fn test_max_depth_and_lookup() {
        let mut address = ParsedFieldConfig::new("address", FieldType::Object);
        address.object_config = Some(ObjectConfig::new(vec![ParsedFieldConfig::new(
            "city",
            FieldType::Text,
        )]));
        let config = ParsedFormConfig {
            title: Some("Signup".to_string()),
            description: None,
            fields: vec![ParsedFieldConfig::new("name", FieldType::Text), address],
            pages: Vec::new(),
            tabs: None,
            settings: FormSettings::default(),
        };

        assert_eq!(config.max_depth(), 1);
        assert_eq!(config.field_names(), vec!["name", "address"]);
        assert!(config.field("address").is_some());
        assert!(!config.is_paged());
        assert!(!config.is_tabbed());
    }

    #[test]
    fn test_settings_deserialize_fills_defaults() {
        let json = serde_json::json!({
            "fields": [{ "name": "age", "type": "number", "required": false }]
        });
        let config: ParsedFormConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(config.settings.submit_label, "Submit");
        assert_eq!(config.fields[0].field_type, FieldType::Number);
    }
}
