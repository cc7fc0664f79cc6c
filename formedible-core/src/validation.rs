//! Validation rule tree
//!
//! An inert description of the constraints a schema-builder call chain
//! expresses. Nothing here is executable; consumers interpret the fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The base type a rule validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Enum,
}

impl BaseType {
    /// Map a schema-builder base constructor name to its base type.
    pub fn from_constructor(name: &str) -> Option<BaseType> {
        match name {
            "string" => Some(BaseType::String),
            "number" | "bigint" => Some(BaseType::Number),
            "boolean" => Some(BaseType::Boolean),
            "date" => Some(BaseType::Date),
            "array" => Some(BaseType::Array),
            "object" => Some(BaseType::Object),
            "enum" | "nativeEnum" => Some(BaseType::Enum),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Number => "number",
            BaseType::Boolean => "boolean",
            BaseType::Date => "date",
            BaseType::Array => "array",
            BaseType::Object => "object",
            BaseType::Enum => "enum",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single constraint a rule can carry. Each refinement is only meaningful
/// for some base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refinement {
    Min,
    Max,
    MinLength,
    MaxLength,
    Integer,
    Pattern,
    Email,
    Url,
    Uuid,
    Includes,
    StartsWith,
    EndsWith,
    EnumValues,
}

impl Refinement {
    pub fn applies_to(self, base: BaseType) -> bool {
        match self {
            Refinement::Min | Refinement::Max => {
                matches!(base, BaseType::Number | BaseType::Date)
            }
            Refinement::MinLength | Refinement::MaxLength => {
                matches!(base, BaseType::String | BaseType::Array)
            }
            Refinement::Integer => base == BaseType::Number,
            Refinement::Pattern
            | Refinement::Email
            | Refinement::Url
            | Refinement::Uuid
            | Refinement::Includes
            | Refinement::StartsWith
            | Refinement::EndsWith => base == BaseType::String,
            Refinement::EnumValues => base == BaseType::Enum,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Refinement::Min => "min",
            Refinement::Max => "max",
            Refinement::MinLength => "minLength",
            Refinement::MaxLength => "maxLength",
            Refinement::Integer => "integer",
            Refinement::Pattern => "pattern",
            Refinement::Email => "email",
            Refinement::Url => "url",
            Refinement::Uuid => "uuid",
            Refinement::Includes => "includes",
            Refinement::StartsWith => "startsWith",
            Refinement::EndsWith => "endsWith",
            Refinement::EnumValues => "enumValues",
        }
    }
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Reconstructed validation constraints for one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub base_type: BaseType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // Number / date bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub integer: bool,

    // String / array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    // String formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_flags: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub email: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub url: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub uuid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_with: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Object shape: property name to rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<BTreeMap<String, ValidationRule>>,
    /// Array element rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<ValidationRule>>,

    /// Custom messages keyed by refinement name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, String>,
    /// Unrecognized refinement calls, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<String>,
}

impl ValidationRule {
    /// A required rule of the given base type with no refinements.
    pub fn new(base_type: BaseType) -> Self {
        Self {
            base_type,
            required: true,
            nullable: false,
            default_value: None,
            description: None,
            min: None,
            max: None,
            integer: false,
            min_length: None,
            max_length: None,
            pattern: None,
            pattern_flags: None,
            email: false,
            url: false,
            uuid: false,
            includes: None,
            starts_with: None,
            ends_with: None,
            enum_values: None,
            shape: None,
            element: None,
            messages: BTreeMap::new(),
            ignored: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn supports(&self, refinement: Refinement) -> bool {
        refinement.applies_to(self.base_type)
    }

    /// Depth of nested shape/element rules below this one.
    pub fn nesting_depth(&self) -> usize {
        let shape_depth = self
            .shape
            .as_ref()
            .and_then(|shape| shape.values().map(|r| r.nesting_depth() + 1).max())
            .unwrap_or(0);
        let element_depth = self
            .element
            .as_ref()
            .map(|r| r.nesting_depth() + 1)
            .unwrap_or(0);
        shape_depth.max(element_depth)
    }

    /// Rules for the sub-fields of an object field or of the items of an
    /// array-of-object field.
    pub fn nested_shape(&self) -> Option<&BTreeMap<String, ValidationRule>> {
        match self.base_type {
            BaseType::Object => self.shape.as_ref(),
            BaseType::Array => self.element.as_ref().and_then(|e| e.shape.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_compatibility_table() {
        assert!(Refinement::MinLength.applies_to(BaseType::String));
        assert!(Refinement::MinLength.applies_to(BaseType::Array));
        assert!(!Refinement::MinLength.applies_to(BaseType::Number));
        assert!(Refinement::Min.applies_to(BaseType::Date));
        assert!(!Refinement::Email.applies_to(BaseType::Number));
        assert!(Refinement::EnumValues.applies_to(BaseType::Enum));
        assert!(!Refinement::Integer.applies_to(BaseType::String));
    }

    #[test]
    fn test_constructor_aliases() {
        assert_eq!(BaseType::from_constructor("bigint"), Some(BaseType::Number));
        assert_eq!(BaseType::from_constructor("nativeEnum"), Some(BaseType::Enum));
        assert_eq!(BaseType::from_constructor("union"), None);
    }

    #[test]
    fn test_rule_serialization_skips_unset_refinements() {
        let mut rule = ValidationRule::new(BaseType::String).optional();
        rule.email = true;
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "baseType": "string", "required": false, "email": true })
        );
    }

    #[test]
    fn test_nested_shape_for_array_of_objects() {
        let mut item = ValidationRule::new(BaseType::Object);
        let mut shape = BTreeMap::new();
        shape.insert("street".to_string(), ValidationRule::new(BaseType::String));
        item.shape = Some(shape);
        let mut list = ValidationRule::new(BaseType::Array);
        list.element = Some(Box::new(item));

        let nested = list.nested_shape().expect("array element shape");
        assert!(nested.contains_key("street"));
        assert_eq!(list.nesting_depth(), 2);
    }
}
