//! Field configuration types

use crate::validation::{BaseType, ValidationRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// FIELD TYPE WHITELIST
// ============================================================================

/// Every widget type identifier a renderer knows how to draw.
pub const FIELD_TYPE_WHITELIST: [&str; 24] = [
    "text",
    "email",
    "password",
    "url",
    "tel",
    "textarea",
    "select",
    "checkbox",
    "switch",
    "number",
    "date",
    "slider",
    "file",
    "rating",
    "phone",
    "color",
    "multiSelect",
    "location",
    "duration",
    "autocomplete",
    "masked",
    "object",
    "array",
    "radio",
];

/// Field widget type. `Custom` only appears when whitelist validation is off.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Email,
    Password,
    Url,
    Tel,
    Textarea,
    Select,
    Checkbox,
    Switch,
    Number,
    Date,
    Slider,
    File,
    Rating,
    Phone,
    Color,
    MultiSelect,
    Location,
    Duration,
    Autocomplete,
    Masked,
    Object,
    Array,
    Radio,
    Custom(String),
}

impl FieldType {
    /// Whitelist lookup. Returns `None` for anything not in
    /// [`FIELD_TYPE_WHITELIST`].
    pub fn parse(s: &str) -> Option<FieldType> {
        let field_type = match s {
            "text" => FieldType::Text,
            "email" => FieldType::Email,
            "password" => FieldType::Password,
            "url" => FieldType::Url,
            "tel" => FieldType::Tel,
            "textarea" => FieldType::Textarea,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            "switch" => FieldType::Switch,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "slider" => FieldType::Slider,
            "file" => FieldType::File,
            "rating" => FieldType::Rating,
            "phone" => FieldType::Phone,
            "color" => FieldType::Color,
            "multiSelect" => FieldType::MultiSelect,
            "location" => FieldType::Location,
            "duration" => FieldType::Duration,
            "autocomplete" => FieldType::Autocomplete,
            "masked" => FieldType::Masked,
            "object" => FieldType::Object,
            "array" => FieldType::Array,
            "radio" => FieldType::Radio,
            _ => return None,
        };
        Some(field_type)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Url => "url",
            FieldType::Tel => "tel",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Switch => "switch",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Slider => "slider",
            FieldType::File => "file",
            FieldType::Rating => "rating",
            FieldType::Phone => "phone",
            FieldType::Color => "color",
            FieldType::MultiSelect => "multiSelect",
            FieldType::Location => "location",
            FieldType::Duration => "duration",
            FieldType::Autocomplete => "autocomplete",
            FieldType::Masked => "masked",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Radio => "radio",
            FieldType::Custom(s) => s,
        }
    }

    pub fn is_whitelisted(&self) -> bool {
        !matches!(self, FieldType::Custom(_))
    }

    /// Fields that pick from a list of options.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::MultiSelect | FieldType::Autocomplete
        )
    }

    /// Fields that contain nested fields.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Object | FieldType::Array)
    }

    /// The base type a value of this widget naturally has, if any.
    pub fn natural_base_type(&self) -> Option<BaseType> {
        match self {
            FieldType::Text
            | FieldType::Email
            | FieldType::Password
            | FieldType::Url
            | FieldType::Tel
            | FieldType::Textarea
            | FieldType::Phone
            | FieldType::Color
            | FieldType::Masked
            | FieldType::Autocomplete => Some(BaseType::String),
            FieldType::Select | FieldType::Radio => Some(BaseType::String),
            FieldType::Number | FieldType::Slider | FieldType::Rating => Some(BaseType::Number),
            FieldType::Checkbox | FieldType::Switch => Some(BaseType::Boolean),
            FieldType::Date => Some(BaseType::Date),
            FieldType::MultiSelect | FieldType::Array => Some(BaseType::Array),
            FieldType::Object | FieldType::Location | FieldType::Duration => {
                Some(BaseType::Object)
            }
            FieldType::File | FieldType::Custom(_) => None,
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s).unwrap_or(FieldType::Custom(s))
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Choice options: a literal list, or an inert expression that a renderer may
/// derive them from. The expression text is stored, never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldOptions {
    Static {
        values: Vec<FieldOption>,
    },
    Derived {
        #[serde(rename = "ruleExpression")]
        rule_expression: String,
    },
}

impl FieldOptions {
    pub fn static_values(&self) -> Option<&[FieldOption]> {
        match self {
            FieldOptions::Static { values } => Some(values),
            FieldOptions::Derived { .. } => None,
        }
    }
}

// ============================================================================
// NESTED CONFIGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<ParsedFieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub collapsible: bool,
}

impl ObjectConfig {
    pub fn new(fields: Vec<ParsedFieldConfig>) -> Self {
        Self {
            title: None,
            description: None,
            fields,
            columns: None,
            layout: None,
            collapsible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayConfig {
    pub item_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_button_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_button_label: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_config: Option<ObjectConfig>,
}

impl ArrayConfig {
    pub fn new(item_type: FieldType) -> Self {
        Self {
            item_type,
            item_label: None,
            min_items: None,
            max_items: None,
            add_button_label: None,
            remove_button_label: None,
            sortable: false,
            object_config: None,
        }
    }
}

// ============================================================================
// FIELD
// ============================================================================

/// One form field, in render order within its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_config: Option<ArrayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_config: Option<ObjectConfig>,
    /// Other literal-valued properties, passed through to the renderer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ParsedFieldConfig {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            placeholder: None,
            description: None,
            default_value: None,
            min: None,
            max: None,
            step: None,
            required: false,
            page: None,
            tab: None,
            options: None,
            conditional: None,
            validation: None,
            array_config: None,
            object_config: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sub-fields of an object field, or of the item object of an array field.
    pub fn nested_fields(&self) -> Option<&[ParsedFieldConfig]> {
        if let Some(object) = &self.object_config {
            return Some(&object.fields);
        }
        self.array_config
            .as_ref()
            .and_then(|array| array.object_config.as_ref())
            .map(|object| object.fields.as_slice())
    }

    /// Number of nested field levels below this field (0 for a leaf).
    pub fn nesting_depth(&self) -> usize {
        match self.nested_fields() {
            Some(children) => 1 + children.iter().map(|c| c.nesting_depth()).max().unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_whitelist_has_24_unique_entries() {
        let unique: std::collections::HashSet<_> = FIELD_TYPE_WHITELIST.iter().collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn test_unknown_type_becomes_custom() {
        let field_type = FieldType::from("signature".to_string());
        assert_eq!(field_type, FieldType::Custom("signature".to_string()));
        assert!(!field_type.is_whitelisted());
        assert_eq!(FieldType::parse("signature"), None);
    }

    #[test]
    fn test_type_is_case_sensitive() {
        assert_eq!(FieldType::parse("multiSelect"), Some(FieldType::MultiSelect));
        assert_eq!(FieldType::parse("multiselect"), None);
    }

    #[test]
    fn test_options_tagged_serialization() {
        let derived = FieldOptions::Derived {
            rule_expression: "(values) => values.countries".to_string(),
        };
        let json = serde_json::to_value(&derived).expect("serialize");
        assert_eq!(json["kind"], "derived");
        assert_eq!(json["ruleExpression"], "(values) => values.countries");

        let fixed = FieldOptions::Static {
            values: vec![FieldOption::new("us", "United States")],
        };
        let json = serde_json::to_value(&fixed).expect("serialize");
        assert_eq!(json["kind"], "static");
        assert_eq!(json["values"][0]["label"], "United States");
    }

    #[test]
    fn test_nesting_depth_counts_array_items() {
        let mut inner = ParsedFieldConfig::new("street", FieldType::Text);
        inner.required = true;
        let mut array = ParsedFieldConfig::new("addresses", FieldType::Array);
        let mut config = ArrayConfig::new(FieldType::Object);
        config.object_config = Some(ObjectConfig::new(vec![inner]));
        array.array_config = Some(config);

        assert_eq!(array.nesting_depth(), 1);
        assert_eq!(array.nested_fields().map(|f| f.len()), Some(1));
    }

    proptest! {
        #[test]
        fn prop_whitelisted_names_round_trip(idx in 0usize..FIELD_TYPE_WHITELIST.len()) {
            let name = FIELD_TYPE_WHITELIST[idx];
            let parsed = FieldType::parse(name);
            prop_assert!(parsed.is_some());
            let parsed = parsed.unwrap_or(FieldType::Text);
            prop_assert_eq!(parsed.as_str(), name);
            prop_assert_eq!(String::from(parsed), name.to_string());
        }
    }
}
