//! Error and warning types for Formedible parsing

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Hard failure categories. Any of these aborts the parse; no partial config
/// is ever returned alongside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No code block or object literal could be located in the input.
    NoCodeFound,
    /// The object literal could not be split into key/value pairs.
    MalformedObjectLiteral,
    /// The `schema` expression could not be reconstructed (strict mode, or absent
    /// schema with inference disabled).
    SchemaParseError,
    /// A `fields` element is not a usable field description.
    FieldParseError,
    /// Nested object/array fields exceed `maxNestingDepth`.
    MaxDepthExceeded,
    /// Source text exceeds `maxCodeLength`.
    SourceTooLarge,
    /// A field `type` is not in the whitelist.
    UnknownFieldType,
}

impl ErrorKind {
    /// Structural failures mean the literal could not even be located or split.
    pub fn is_structural(self) -> bool {
        matches!(self, ErrorKind::NoCodeFound | ErrorKind::MalformedObjectLiteral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoCodeFound => "NoCodeFound",
            ErrorKind::MalformedObjectLiteral => "MalformedObjectLiteral",
            ErrorKind::SchemaParseError => "SchemaParseError",
            ErrorKind::FieldParseError => "FieldParseError",
            ErrorKind::MaxDepthExceeded => "MaxDepthExceeded",
            ErrorKind::SourceTooLarge => "SourceTooLarge",
            ErrorKind::UnknownFieldType => "UnknownFieldType",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal findings returned next to a successful config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A field's `page` does not match any declared page.
    DanglingPageReference,
    /// A field's `tab` does not match any declared tab id.
    DanglingTabReference,
    /// A field carries both `page` and `tab`.
    ConflictingPlacement,
    /// An unrecognized refinement call was kept as an inert marker.
    IgnoredRefinement,
    /// A refinement does not apply to the rule's base type and was dropped.
    IncompatibleRefinement,
    /// A single schema entry could not be reconstructed.
    SchemaRule,
    /// An explicit `required` flag disagrees with the validation rule.
    RequiredFlagConflict,
    /// A property or expression was skipped (spreads, misplaced configs).
    IgnoredExpression,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::DanglingPageReference => "DanglingPageReference",
            WarningKind::DanglingTabReference => "DanglingTabReference",
            WarningKind::ConflictingPlacement => "ConflictingPlacement",
            WarningKind::IgnoredRefinement => "IgnoredRefinement",
            WarningKind::IncompatibleRefinement => "IncompatibleRefinement",
            WarningKind::SchemaRule => "SchemaRule",
            WarningKind::RequiredFlagConflict => "RequiredFlagConflict",
            WarningKind::IgnoredExpression => "IgnoredExpression",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Positional and textual context attached to errors and warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

impl ErrorContext {
    pub fn is_empty(&self) -> bool {
        self == &ErrorContext::default()
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

// ============================================================================
// ERROR / WARNING VALUES
// ============================================================================

/// A hard parse failure.
///
/// `message` is the rendered text. When the parser runs with `aiErrorMessages`
/// it already includes the offending snippet, the expected shape and a fix
/// hint, so it can be fed straight back into a generation loop.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct FormParseError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "ErrorContext::is_empty")]
    pub context: ErrorContext,
}

impl FormParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn no_code_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoCodeFound, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedObjectLiteral, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaParseError, message)
    }

    pub fn field(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldParseError, message)
    }
}

/// A non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "ErrorContext::is_empty")]
    pub context: ErrorContext,
}

impl ParseWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result type alias for parser operations.
pub type FormResult<T> = Result<T, FormParseError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let err = FormParseError::field("duplicate field name 'email'");
        let msg = format!("{}", err);
        assert!(msg.starts_with("FieldParseError"));
        assert!(msg.contains("duplicate field name"));
    }

    #[test]
    fn test_structural_kinds() {
        assert!(ErrorKind::NoCodeFound.is_structural());
        assert!(ErrorKind::MalformedObjectLiteral.is_structural());
        assert!(!ErrorKind::UnknownFieldType.is_structural());
        assert!(!ErrorKind::SourceTooLarge.is_structural());
    }

    #[test]
    fn test_error_serializes_camel_case_and_skips_empty_context() {
        let err = FormParseError::new(ErrorKind::UnknownFieldType, "bad type")
            .with_context(ErrorContext::default().with_index(2).with_field_name("age"));
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["kind"], "UnknownFieldType");
        assert_eq!(json["context"]["index"], 2);
        assert_eq!(json["context"]["fieldName"], "age");

        let bare = serde_json::to_value(FormParseError::no_code_found("nothing")).expect("serialize");
        assert!(bare.get("context").is_none());
    }

    #[test]
    fn test_warning_display() {
        let warning = ParseWarning::new(WarningKind::DanglingPageReference, "page 3 is not declared");
        assert_eq!(
            warning.to_string(),
            "DanglingPageReference: page 3 is not declared"
        );
    }
}
