//! Parser configuration
//!
//! `ParserConfig` is read once per parse invocation: defaults merged with an
//! optional persisted override (TOML or JSON), then frozen for the duration of
//! the parse. Unrecognized override keys are ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default ceiling on raw source length, in bytes.
pub const DEFAULT_MAX_CODE_LENGTH: usize = 100_000;

/// Default ceiling on nested object/array field depth.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 10;

/// Upper bound for `maxNestingDepth`.
pub const HARD_MAX_NESTING_DEPTH: usize = 64;

/// Frames one parse may recurse through, bindings and wrapper objects
/// included. Each field nesting level costs a handful of frames.
pub const MAX_RECURSION_LEVEL: usize = HARD_MAX_NESTING_DEPTH * 8;

/// Environment variable naming a persisted override file.
pub const CONFIG_PATH_ENV: &str = "FORMEDIBLE_PARSER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config {format}: {message}")]
    Parse { format: &'static str, message: String },
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Operator-configurable parsing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    /// Promote rule-level schema warnings and unknown refinements to errors.
    pub strict_validation: bool,
    /// Infer validation rules for fields without a schema entry. When disabled,
    /// a missing `schema` key is itself an error.
    pub enable_schema_inference: bool,
    /// Reject field `type` values outside the whitelist.
    pub field_type_validation: bool,
    /// Render errors with snippet, expected shape and fix hint.
    pub ai_error_messages: bool,
    pub max_code_length: usize,
    pub max_nesting_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            enable_schema_inference: true,
            field_type_validation: true,
            ai_error_messages: true,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// Partial configuration as persisted by an operator. Every key is optional;
/// both camelCase and snake_case spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfigOverride {
    #[serde(default, alias = "strict_validation")]
    pub strict_validation: Option<bool>,
    #[serde(default, alias = "enable_schema_inference")]
    pub enable_schema_inference: Option<bool>,
    #[serde(default, alias = "field_type_validation")]
    pub field_type_validation: Option<bool>,
    #[serde(default, alias = "ai_error_messages")]
    pub ai_error_messages: Option<bool>,
    #[serde(default, alias = "max_code_length")]
    pub max_code_length: Option<usize>,
    #[serde(default, alias = "max_nesting_depth")]
    pub max_nesting_depth: Option<usize>,
}

impl ParserConfigOverride {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            format: "JSON",
            message: e.to_string(),
        })
    }

    /// Read an override file. `.json` files are parsed as JSON, everything
    /// else as TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }
}

impl ParserConfig {
    /// Defaults merged with the override named by `FORMEDIBLE_PARSER_CONFIG`,
    /// if that variable is set.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path_from_env() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Defaults merged with the override stored at `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let overrides = ParserConfigOverride::from_path(path)?;
        let config = Self::default().merged(&overrides);
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded parser config override");
        Ok(config)
    }

    /// Apply every key present in `overrides`; absent keys keep their value.
    pub fn merged(mut self, overrides: &ParserConfigOverride) -> Self {
        if let Some(v) = overrides.strict_validation {
            self.strict_validation = v;
        }
        if let Some(v) = overrides.enable_schema_inference {
            self.enable_schema_inference = v;
        }
        if let Some(v) = overrides.field_type_validation {
            self.field_type_validation = v;
        }
        if let Some(v) = overrides.ai_error_messages {
            self.ai_error_messages = v;
        }
        if let Some(v) = overrides.max_code_length {
            self.max_code_length = v;
        }
        if let Some(v) = overrides.max_nesting_depth {
            self.max_nesting_depth = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_code_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxCodeLength",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxNestingDepth",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.max_nesting_depth > HARD_MAX_NESTING_DEPTH {
            return Err(ConfigError::InvalidValue {
                field: "maxNestingDepth",
                reason: format!("must be <= {}", HARD_MAX_NESTING_DEPTH),
            });
        }
        Ok(())
    }

    pub fn strict() -> Self {
        Self {
            strict_validation: true,
            ..Self::default()
        }
    }

    pub fn with_strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = enabled;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_max_code_length(mut self, length: usize) -> Self {
        self.max_code_length = length;
        self
    }

    pub fn with_ai_error_messages(mut self, enabled: bool) -> Self {
        self.ai_error_messages = enabled;
        self
    }

    pub fn with_schema_inference(mut self, enabled: bool) -> Self {
        self.enable_schema_inference = enabled;
        self
    }

    pub fn with_field_type_validation(mut self, enabled: bool) -> Self {
        self.field_type_validation = enabled;
        self
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert!(!config.strict_validation);
        assert!(config.enable_schema_inference);
        assert!(config.field_type_validation);
        assert!(config.ai_error_messages);
        assert_eq!(config.max_code_length, DEFAULT_MAX_CODE_LENGTH);
        assert_eq!(config.max_nesting_depth, DEFAULT_MAX_NESTING_DEPTH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_override_camel_case_ignores_unknown_keys() {
        let overrides = ParserConfigOverride::from_json_str(
            r#"{ "strictValidation": true, "maxNestingDepth": 5, "theme": "dark" }"#,
        )
        .expect("parse override");
        let config = ParserConfig::default().merged(&overrides);
        assert!(config.strict_validation);
        assert_eq!(config.max_nesting_depth, 5);
        assert_eq!(config.max_code_length, DEFAULT_MAX_CODE_LENGTH);
    }

    #[test]
    fn test_toml_override_snake_case() {
        let overrides = ParserConfigOverride::from_toml_str(
            "max_code_length = 2048\nai_error_messages = false\n",
        )
        .expect("parse override");
        let config = ParserConfig::default().merged(&overrides);
        assert_eq!(config.max_code_length, 2048);
        assert!(!config.ai_error_messages);
        assert!(config.enable_schema_inference);
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = ParserConfig::default().with_max_nesting_depth(0);
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "maxNestingDepth"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_depth_above_hard_ceiling() {
        let config = ParserConfig::default().with_max_nesting_depth(HARD_MAX_NESTING_DEPTH + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_reports_parse_error() {
        let result = ParserConfigOverride::from_toml_str("max_code_length = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse { format: "TOML", .. })));
    }

    #[test]
    fn test_malformed_json_reports_parse_error() {
        let result = ParserConfigOverride::from_json_str("{\"maxCodeLength\": }");
        match result {
            Err(err @ ConfigError::Parse { format: "JSON", .. }) => {
                assert!(err.to_string().starts_with("Failed to parse config JSON"));
            }
            other => panic!("expected a JSON parse error, got {:?}", other),
        }
    }
}
