//! Parse pipeline
//!
//! Runs the stages in order: pre-check, normalize, extract, schema, fields,
//! post-check and emit. Every call builds fresh state; the parser itself only
//! holds its configuration.

use crate::diagnostics::{snippet, Diagnostics};
use crate::emit::{decode_header, emit};
use crate::extract::{ExtractError, SourceTokens};
use crate::fields::FieldBuilder;
use crate::guard::{explain, post_check, pre_check};
use crate::normalize::normalize;
use crate::schema::{RuleMap, SchemaReconstructor};
use formedible_core::{
    ConfigError, ErrorContext, FormParseError, FormResult, ParseOutcome, ParserConfig,
};
use sha2::{Digest, Sha256};
use std::fmt;

/// Pipeline stages, reported to an observer as each one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PreCheck,
    Normalize,
    Extract,
    Schema,
    Fields,
    PostCheck,
    Emit,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::PreCheck,
        Stage::Normalize,
        Stage::Extract,
        Stage::Schema,
        Stage::Fields,
        Stage::PostCheck,
        Stage::Emit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PreCheck => "pre-check",
            Stage::Normalize => "normalize",
            Stage::Extract => "extract",
            Stage::Schema => "schema",
            Stage::Fields => "fields",
            Stage::PostCheck => "post-check",
            Stage::Emit => "emit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn extract_error(err: ExtractError, candidate: &str) -> FormParseError {
    let span = err.span();
    let from = candidate.get(span.start..).unwrap_or("");
    FormParseError::malformed(err.to_string()).with_context(
        ErrorContext::default()
            .with_position(span.line, span.column)
            .with_snippet(snippet(from)),
    )
}

/// Parser for formedible form source.
#[derive(Debug, Clone, Default)]
pub struct FormedibleParser {
    config: ParserConfig,
}

impl FormedibleParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Defaults merged with the override file named by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(ParserConfig::load()?))
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, source: &str) -> FormResult<ParseOutcome> {
        self.parse_with_observer(source, |_| {})
    }

    /// Parse, calling `observer` as each stage starts.
    pub fn parse_with_observer<F>(&self, source: &str, mut observer: F) -> FormResult<ParseOutcome>
    where
        F: FnMut(Stage),
    {
        self.run(source, &mut observer)
            .map_err(|err| {
                tracing::debug!(kind = %err.kind, "parse failed");
                explain(err, &self.config)
            })
    }

    fn run(&self, source: &str, observer: &mut dyn FnMut(Stage)) -> FormResult<ParseOutcome> {
        let config = &self.config;
        let mut diag = Diagnostics::new(config.strict_validation);

        observer(Stage::PreCheck);
        pre_check(source, config)?;

        observer(Stage::Normalize);
        let normalized = normalize(source)?;
        let candidate = normalized.candidate.as_str();
        let bindings = &normalized.bindings;

        observer(Stage::Extract);
        let tokens = SourceTokens::lex_at(candidate, normalized.line, normalized.column);
        if let Some(err) = tokens.first_error() {
            return Err(extract_error(err, candidate));
        }
        let object = tokens
            .expr()
            .as_object()
            .map_err(|err| extract_error(err, candidate))?;
        let header = decode_header(&object, bindings, &mut diag);

        observer(Stage::Schema);
        let rules = match object.value("schema") {
            Some(expr) => SchemaReconstructor::new(config, bindings).reconstruct(expr, &mut diag)?,
            None if config.enable_schema_inference => RuleMap::new(),
            None => {
                return Err(FormParseError::schema(
                    "form has no `schema` and schema inference is disabled",
                )
                .with_context(ErrorContext::default().with_position(normalized.line, normalized.column)))
            }
        };

        observer(Stage::Fields);
        let fields_expr = object.value("fields").ok_or_else(|| {
            FormParseError::field("form object has no `fields` array").with_context(
                ErrorContext::default()
                    .with_position(normalized.line, normalized.column)
                    .with_snippet(snippet(candidate)),
            )
        })?;
        let fields = FieldBuilder::new(config, bindings).build(fields_expr, &rules, &mut diag)?;

        observer(Stage::PostCheck);
        post_check(&fields, &header.pages, header.tabs.as_deref(), config, &mut diag)?;

        observer(Stage::Emit);
        let form = emit(header, fields);
        let outcome = ParseOutcome {
            config: form,
            warnings: diag.into_warnings(),
            source_digest: sha256_hex(candidate),
        };

        tracing::debug!(
            fields = outcome.config.fields.len(),
            depth = outcome.config.max_depth(),
            warnings = outcome.warnings.len(),
            digest = %outcome.source_digest,
            "parsed form"
        );
        Ok(outcome)
    }
}

/// Parse with the default configuration.
pub fn parse(source: &str) -> FormResult<ParseOutcome> {
    FormedibleParser::with_defaults().parse(source)
}

pub fn parse_with_config(source: &str, config: ParserConfig) -> FormResult<ParseOutcome> {
    FormedibleParser::new(config).parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::ErrorKind;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_parser_is_send_and_sync() {
        assert_send_sync::<FormedibleParser>();
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut seen = Vec::new();
        FormedibleParser::with_defaults()
            .parse_with_observer("{ fields: [{ name: 'a', type: 'text' }] }", |stage| seen.push(stage))
            .expect("parse");
        assert_eq!(seen, Stage::ALL.to_vec());
    }

    #[test]
    fn test_missing_fields_is_a_field_error() {
        let err = parse("{ title: 'Empty' }").expect_err("no fields");
        assert_eq!(err.kind, ErrorKind::FieldParseError);
        assert!(err.message.contains("`fields`"));
    }

    #[test]
    fn test_missing_schema_without_inference() {
        let config = ParserConfig::default().with_schema_inference(false);
        let err = parse_with_config("{ fields: [] }", config).expect_err("schema required");
        assert_eq!(err.kind, ErrorKind::SchemaParseError);
    }

    #[test]
    fn test_digest_is_of_the_candidate() {
        let bare = parse("{ fields: [] }").expect("parse");
        let fenced = parse("Here you go:\n```formedible\n{ fields: [] }\n```\n").expect("parse");
        assert_eq!(bare.source_digest, fenced.source_digest);
        assert_eq!(bare.source_digest.len(), 64);
    }

    #[test]
    fn test_malformed_object_has_position() {
        let err = parse("{ title: 'x',, fields: [] }").expect_err("malformed");
        assert_eq!(err.kind, ErrorKind::MalformedObjectLiteral);
        assert!(err.context.line.is_some());
    }
}
