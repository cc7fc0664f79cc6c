//! Validator / guard
//!
//! Size check before any stage runs, structural checks over the assembled
//! field tree, and the rendering of AI-readable error messages.

use crate::diagnostics::Diagnostics;
use formedible_core::{
    ErrorContext, ErrorKind, FormParseError, FormResult, PageDescriptor, ParseWarning,
    ParsedFieldConfig, ParserConfig, TabDescriptor, WarningKind, FIELD_TYPE_WHITELIST,
};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// PRE-CHECK
// ============================================================================

pub fn source_too_large(length: usize, config: &ParserConfig) -> FormParseError {
    FormParseError::new(
        ErrorKind::SourceTooLarge,
        format!(
            "Source is {} bytes; maxCodeLength is {}",
            length, config.max_code_length
        ),
    )
}

/// Reject oversized input before any other stage touches it.
pub fn pre_check(source: &str, config: &ParserConfig) -> FormResult<()> {
    if source.len() > config.max_code_length {
        return Err(source_too_large(source.len(), config));
    }
    Ok(())
}

// ============================================================================
// POST-CHECK
// ============================================================================

struct Placement {
    pages: BTreeSet<u32>,
    tabs: BTreeSet<String>,
}

/// Names, types and depth per scope, then page/tab consistency.
pub fn post_check(
    fields: &[ParsedFieldConfig],
    pages: &[PageDescriptor],
    tabs: Option<&[TabDescriptor]>,
    config: &ParserConfig,
    diag: &mut Diagnostics,
) -> FormResult<()> {
    let placement = Placement {
        pages: pages.iter().map(|p| p.page).collect(),
        tabs: tabs.into_iter().flatten().map(|t| t.id.clone()).collect(),
    };
    check_scope(fields, "", 0, config, &placement, diag)?;
    tracing::debug!(fields = fields.len(), warnings = diag.warnings().len(), "post-check passed");
    Ok(())
}

fn check_scope(
    fields: &[ParsedFieldConfig],
    parent: &str,
    depth: usize,
    config: &ParserConfig,
    placement: &Placement,
    diag: &mut Diagnostics,
) -> FormResult<()> {
    if !fields.is_empty() && depth > config.max_nesting_depth {
        return Err(FormParseError::new(
            ErrorKind::MaxDepthExceeded,
            format!(
                "Field nesting depth {} exceeds maxNestingDepth {}",
                depth, config.max_nesting_depth
            ),
        )
        .with_context(scope_context(parent).with_depth(depth)));
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, field) in fields.iter().enumerate() {
        let path = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", parent, field.name)
        };
        let context = ErrorContext::default()
            .with_index(index)
            .with_field_name(path.clone())
            .with_depth(depth);

        if field.name.trim().is_empty() {
            return Err(FormParseError::field(format!("Field at index {} has an empty name", index))
                .with_context(context));
        }
        if let Some(first) = seen.insert(field.name.as_str(), index) {
            return Err(FormParseError::field(format!(
                "Duplicate field name `{}` at index {} (first declared at index {})",
                field.name, index, first
            ))
            .with_context(context));
        }
        if config.field_type_validation && !field.field_type.is_whitelisted() {
            return Err(FormParseError::new(
                ErrorKind::UnknownFieldType,
                format!("Unknown field type `{}` at index {}", field.field_type, index),
            )
            .with_context(context));
        }

        check_placement(field, &path, context, placement, diag);

        if let Some(children) = field.nested_fields() {
            check_scope(children, &path, depth + 1, config, placement, diag)?;
        }
    }
    Ok(())
}

fn check_placement(
    field: &ParsedFieldConfig,
    path: &str,
    context: ErrorContext,
    placement: &Placement,
    diag: &mut Diagnostics,
) {
    if let Some(page) = field.page {
        if !placement.pages.is_empty() && !placement.pages.contains(&page) {
            diag.warn(
                ParseWarning::new(
                    WarningKind::DanglingPageReference,
                    format!("field `{}` is placed on page {} which is not declared", path, page),
                )
                .with_context(context.clone()),
            );
        }
    }
    if let Some(tab) = &field.tab {
        if !placement.tabs.contains(tab) {
            diag.warn(
                ParseWarning::new(
                    WarningKind::DanglingTabReference,
                    format!("field `{}` is placed on tab `{}` which is not declared", path, tab),
                )
                .with_context(context.clone()),
            );
        }
    }
    if field.page.is_some() && field.tab.is_some() {
        diag.warn(
            ParseWarning::new(
                WarningKind::ConflictingPlacement,
                format!("field `{}` has both `page` and `tab`", path),
            )
            .with_context(context),
        );
    }
}

fn scope_context(parent: &str) -> ErrorContext {
    if parent.is_empty() {
        ErrorContext::default()
    } else {
        ErrorContext::default().with_field_name(parent)
    }
}

// ============================================================================
// AI ERROR MESSAGES
// ============================================================================

fn expected_shape(kind: ErrorKind, config: &ParserConfig) -> String {
    match kind {
        ErrorKind::NoCodeFound => {
            "a ```formedible code block containing `{ schema: z.object({...}), fields: [...] }`".to_string()
        }
        ErrorKind::MalformedObjectLiteral => {
            "balanced `{}`, `[]` and `()` with `key: value` pairs separated by single commas".to_string()
        }
        ErrorKind::SchemaParseError => {
            "`schema: z.object({ name: z.string().min(1), age: z.number().optional() })`".to_string()
        }
        ErrorKind::FieldParseError => {
            "`{ name: \"firstName\", type: \"text\", label: \"First name\" }` with a unique name".to_string()
        }
        ErrorKind::MaxDepthExceeded => format!(
            "at most {} levels of nested `objectConfig.fields`",
            config.max_nesting_depth
        ),
        ErrorKind::SourceTooLarge => format!("at most {} bytes of source", config.max_code_length),
        ErrorKind::UnknownFieldType => format!("one of: {}", FIELD_TYPE_WHITELIST.join(", ")),
    }
}

fn fix_hint(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NoCodeFound => {
            "Return the form as one object literal with a `fields` array inside a ```formedible fence."
        }
        ErrorKind::MalformedObjectLiteral => {
            "Close every opened bracket and remove stray or doubled commas."
        }
        ErrorKind::SchemaParseError => {
            "Build each entry from z.string/number/boolean/date/array/object/enum and the refinements min, max, length, email, url, uuid, regex, optional, nullable, default."
        }
        ErrorKind::FieldParseError => {
            "Give every field a unique string `name` and a string `type`; object fields need `objectConfig.fields`."
        }
        ErrorKind::MaxDepthExceeded => {
            "Flatten the deepest nested objects into sibling fields."
        }
        ErrorKind::SourceTooLarge => "Shorten the form or split it into several smaller forms.",
        ErrorKind::UnknownFieldType => {
            "Replace the type with the closest whitelisted type, e.g. `text` for free-form input."
        }
    }
}

/// Full message with location, snippet, expected shape and fix hint.
pub fn render(err: &FormParseError, config: &ParserConfig) -> String {
    let mut out = err.message.clone();
    let context = &err.context;

    let mut location = Vec::new();
    if let (Some(line), Some(column)) = (context.line, context.column) {
        location.push(format!("line {}, column {}", line, column));
    }
    if let Some(name) = &context.field_name {
        location.push(format!("field `{}`", name));
    }
    if let Some(index) = context.index {
        location.push(format!("index {}", index));
    }
    if let Some(depth) = context.depth {
        location.push(format!("depth {}", depth));
    }
    if !location.is_empty() {
        out.push_str(&format!("\n  at {}", location.join(", ")));
    }
    if let Some(snippet) = &context.snippet {
        out.push_str(&format!("\n  > {}", snippet.replace('\n', "\n  > ")));
    }
    out.push_str(&format!("\nExpected: {}", expected_shape(err.kind, config)));
    out.push_str(&format!("\nFix: {}", fix_hint(err.kind)));
    out
}

/// Replace the message with its rendered form when AI messages are enabled.
pub fn explain(mut err: FormParseError, config: &ParserConfig) -> FormParseError {
    if config.ai_error_messages {
        err.message = render(&err, config);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::{FieldType, ObjectConfig};

    #[test]
    fn test_pre_check_boundary() {
        let config = ParserConfig::default().with_max_code_length(4);
        assert!(pre_check("abcd", &config).is_ok());
        let err = pre_check("abcde", &config).expect_err("too large");
        assert_eq!(err.kind, ErrorKind::SourceTooLarge);
    }

    #[test]
    fn test_duplicate_names_cite_both_indexes() {
        let config = ParserConfig::default();
        let mut diag = Diagnostics::new(false);
        let fields = vec![
            ParsedFieldConfig::new("email", FieldType::Email),
            ParsedFieldConfig::new("email", FieldType::Text),
        ];
        let err = post_check(&fields, &[], None, &config, &mut diag).expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::FieldParseError);
        assert_eq!(err.context.index, Some(1));
        assert!(err.message.contains("`email`"));
        assert!(err.message.contains("index 0"));
    }

    #[test]
    fn test_nested_scopes_are_independent() {
        let config = ParserConfig::default();
        let mut diag = Diagnostics::new(false);
        let mut address = ParsedFieldConfig::new("address", FieldType::Object);
        address.object_config = Some(ObjectConfig::new(vec![ParsedFieldConfig::new("name", FieldType::Text)]));
        let fields = vec![ParsedFieldConfig::new("name", FieldType::Text), address];
        assert!(post_check(&fields, &[], None, &config, &mut diag).is_ok());
    }

    #[test]
    fn test_placement_warnings() {
        let config = ParserConfig::default();
        let mut diag = Diagnostics::new(false);
        let mut paged = ParsedFieldConfig::new("a", FieldType::Text);
        paged.page = Some(3);
        let mut both = ParsedFieldConfig::new("b", FieldType::Text);
        both.page = Some(1);
        both.tab = Some("extra".into());
        let pages = vec![PageDescriptor { page: 1, title: None, description: None }];
        let tabs = vec![TabDescriptor { id: "main".into(), label: "Main".into(), description: None }];

        post_check(&[paged, both], &pages, Some(tabs.as_slice()), &config, &mut diag).expect("warnings only");
        let kinds: Vec<_> = diag.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::DanglingPageReference,
                WarningKind::DanglingTabReference,
                WarningKind::ConflictingPlacement,
            ]
        );
    }

    #[test]
    fn test_render_includes_snippet_and_hint() {
        let err = FormParseError::new(ErrorKind::UnknownFieldType, "Unknown field type `signature` at index 2")
            .with_context(
                ErrorContext::default()
                    .with_index(2)
                    .with_position(4, 7)
                    .with_snippet("{ name: 'sig', type: 'signature' }"),
            );
        let text = render(&err, &ParserConfig::default());
        assert!(text.contains("line 4, column 7"));
        assert!(text.contains("> { name: 'sig'"));
        assert!(text.contains("Expected: one of: text, email"));
        assert!(text.contains("Fix: "));

        let plain = explain(err.clone(), &ParserConfig::default().with_ai_error_messages(false));
        assert_eq!(plain.message, err.message);
    }
}
