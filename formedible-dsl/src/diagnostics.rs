//! Warning collection shared by the pipeline stages

use crate::extract::Expr;
use formedible_core::{ErrorContext, ErrorKind, FormParseError, FormResult, ParseWarning};

/// Longest snippet attached to errors and warnings, in characters.
pub const SNIPPET_CHARS: usize = 120;

/// Collects warnings for one parse. In strict mode, findings raised through
/// [`Diagnostics::strict_or_warn`] become hard errors instead.
#[derive(Debug, Default)]
pub struct Diagnostics {
    strict: bool,
    warnings: Vec<ParseWarning>,
}

impl Diagnostics {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            warnings: Vec::new(),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn warn(&mut self, warning: ParseWarning) {
        tracing::warn!(
            kind = %warning.kind,
            field = warning.context.field_name.as_deref().unwrap_or(""),
            line = warning.context.line.unwrap_or(0),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// Record `warning`, or fail with `error_kind` under strict validation.
    pub fn strict_or_warn(&mut self, warning: ParseWarning, error_kind: ErrorKind) -> FormResult<()> {
        if self.strict {
            return Err(FormParseError::new(error_kind, warning.message).with_context(warning.context));
        }
        self.warn(warning);
        Ok(())
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }
}

/// Truncate text for display in an error.
pub fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
    if text.chars().nth(SNIPPET_CHARS).is_some() {
        out.push_str("...");
    }
    out
}

/// Position and snippet of an expression.
pub fn expr_context(expr: &Expr<'_>) -> ErrorContext {
    let span = expr.span();
    ErrorContext::default()
        .with_position(span.line, span.column)
        .with_snippet(snippet(expr.text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::WarningKind;

    #[test]
    fn test_strict_promotes_to_error() {
        let mut diag = Diagnostics::new(true);
        let result = diag.strict_or_warn(
            ParseWarning::new(WarningKind::IgnoredRefinement, "unknown refinement .refine()"),
            ErrorKind::SchemaParseError,
        );
        let err = result.expect_err("strict");
        assert_eq!(err.kind, ErrorKind::SchemaParseError);
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn test_lenient_records_warning() {
        let mut diag = Diagnostics::new(false);
        diag.strict_or_warn(
            ParseWarning::new(WarningKind::IgnoredRefinement, "unknown refinement .refine()"),
            ErrorKind::SchemaParseError,
        )
        .expect("lenient");
        assert_eq!(diag.into_warnings().len(), 1);
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(SNIPPET_CHARS + 10);
        let cut = snippet(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + 3);
        assert_eq!(snippet("short"), "short");
    }
}
