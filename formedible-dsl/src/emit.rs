//! Config emitter
//!
//! Decodes the form-level properties (`title`, `pages`, `tabs`, `settings`
//! and the loose label keys) and assembles the final [`ParsedFormConfig`].

use crate::diagnostics::{expr_context, Diagnostics};
use crate::extract::{Expr, ObjectLiteral, SourceTokens};
use crate::normalize::Bindings;
use formedible_core::{
    FormSettings, PageDescriptor, ParseWarning, ParsedFieldConfig, ParsedFormConfig, TabDescriptor,
    WarningKind,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Everything in a form except its fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormHeader {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pages: Vec<PageDescriptor>,
    pub tabs: Option<Vec<TabDescriptor>>,
    pub settings: FormSettings,
}

/// A literal value, following a binding if the expression is a bound name.
fn literal(expr: Expr<'_>, bindings: &Bindings) -> Option<Value> {
    if let Some(binding) = expr.as_identifier().and_then(|name| bindings.resolve(name)) {
        let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
        return tokens.expr().to_literal();
    }
    expr.to_literal()
}

fn skipped(diag: &mut Diagnostics, expr: &Expr<'_>, message: String) {
    diag.warn(ParseWarning::new(WarningKind::IgnoredExpression, message).with_context(expr_context(expr)));
}

fn decode<T: DeserializeOwned>(
    key: &str,
    expr: Expr<'_>,
    bindings: &Bindings,
    diag: &mut Diagnostics,
) -> Option<T> {
    let value = match literal(expr, bindings) {
        Some(value) => value,
        None => {
            skipped(diag, &expr, format!("`{}` must be a literal; ignored", key));
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            skipped(diag, &expr, format!("`{}` has an unexpected shape ({}); ignored", key, err));
            None
        }
    }
}

/// Apply one settings key. Unknown keys are kept in `extra`.
fn apply_setting(settings: &mut FormSettings, key: &str, value: Value) -> Result<(), String> {
    let text = |value: Value| match value {
        Value::String(s) => Ok(s),
        other => Err(format!("`{}` must be a string, found {}", key, other)),
    };
    match key {
        "submitLabel" => settings.submit_label = text(value)?,
        "nextLabel" => settings.next_label = text(value)?,
        "previousLabel" => settings.previous_label = text(value)?,
        "showProgress" => {
            settings.show_progress = value
                .as_bool()
                .ok_or_else(|| format!("`showProgress` must be a boolean, found {}", value))?
        }
        other => {
            settings.extra.insert(other.to_string(), value);
        }
    }
    Ok(())
}

/// Read the header properties of the form object. Problems are warnings;
/// the header never fails a parse.
pub fn decode_header(object: &ObjectLiteral<'_>, bindings: &Bindings, diag: &mut Diagnostics) -> FormHeader {
    let mut header = FormHeader::default();

    for entry in &object.entries {
        let value = entry.value;
        match entry.key.as_str() {
            "schema" | "fields" | "settings" => {}
            "title" => header.title = decode("title", value, bindings, diag),
            "description" => header.description = decode("description", value, bindings, diag),
            "pages" => header.pages = decode("pages", value, bindings, diag).unwrap_or_default(),
            "tabs" => header.tabs = decode("tabs", value, bindings, diag),
            key @ ("submitLabel" | "nextLabel" | "previousLabel" | "showProgress") => {
                match literal(value, bindings) {
                    Some(literal) => {
                        if let Err(message) = apply_setting(&mut header.settings, key, literal) {
                            skipped(diag, &value, message);
                        }
                    }
                    None => skipped(diag, &value, format!("`{}` must be a literal; ignored", key)),
                }
            }
            key => skipped(diag, &value, format!("unknown form property `{}` is not recorded", key)),
        }
    }

    // The settings object wins over the loose top-level keys.
    if let Some(value) = object.value("settings") {
        match literal(value, bindings) {
            Some(Value::Object(map)) => {
                for (key, literal) in map {
                    if let Err(message) = apply_setting(&mut header.settings, &key, literal) {
                        skipped(diag, &value, message);
                    }
                }
            }
            _ => skipped(diag, &value, "`settings` must be an object literal; ignored".to_string()),
        }
    }

    for extra in &object.skipped {
        skipped(
            diag,
            &extra.expr,
            format!("`{}` in the form object cannot be followed statically", extra.expr.text()),
        );
    }

    header
}

/// Assemble the final config.
pub fn emit(header: FormHeader, fields: Vec<ParsedFieldConfig>) -> ParsedFormConfig {
    ParsedFormConfig {
        title: header.title,
        description: header.description,
        fields,
        pages: header.pages,
        tabs: header.tabs,
        settings: header.settings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(source: &str) -> (FormHeader, Vec<ParseWarning>) {
        let tokens = SourceTokens::lex(source);
        let object = tokens.expr().as_object().expect("object");
        let mut diag = Diagnostics::new(false);
        let header = decode_header(&object, &Bindings::default(), &mut diag);
        (header, diag.into_warnings())
    }

    #[test]
    fn test_defaults_are_filled() {
        let form = emit(FormHeader::default(), Vec::new());
        assert_eq!(form.settings.submit_label, "Submit");
        assert_eq!(form.settings.next_label, "Next");
        assert_eq!(form.settings.previous_label, "Previous");
        assert!(!form.settings.show_progress);
        assert!(form.pages.is_empty());
    }

    #[test]
    fn test_pages_tabs_and_settings() {
        let (header, warnings) = header(
            "{ title: 'Signup', pages: [{ page: 1, title: 'Account' }, { page: 2 }],
               tabs: [{ id: 'main', label: 'Main' }], submitLabel: 'Go',
               settings: { submitLabel: 'Create', showProgress: true, theme: 'dark' }, fields: [] }",
        );
        assert!(warnings.is_empty());
        assert_eq!(header.title.as_deref(), Some("Signup"));
        assert_eq!(header.pages.len(), 2);
        assert_eq!(header.pages[0].title.as_deref(), Some("Account"));
        assert_eq!(header.tabs.as_ref().map(|t| t[0].id.as_str()), Some("main"));
        assert_eq!(header.settings.submit_label, "Create");
        assert!(header.settings.show_progress);
        assert_eq!(header.settings.extra.get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn test_bad_header_values_warn() {
        let (header, warnings) = header("{ pages: 'one', onSubmit: handleSubmit, fields: [] }");
        assert!(header.pages.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::IgnoredExpression));
    }
}
