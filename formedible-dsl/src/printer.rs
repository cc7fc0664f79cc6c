//! Source printer
//!
//! Re-serializes a [`ParsedFormConfig`] to formedible source: a
//! `schema: z.object({...})` built from the top-level rules plus the
//! `fields` array. Parsing the printed text yields the same field names,
//! types, order and required flags.

use formedible_core::{
    ArrayConfig, BaseType, FieldOptions, ObjectConfig, ParsedFieldConfig, ParsedFormConfig,
    ValidationRule,
};
use serde::Serialize;

fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

pub(crate) fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

fn print_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Bare identifier keys stay bare; anything else is quoted.
fn print_key(key: &str) -> String {
    let mut chars = key.chars();
    let bare = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if bare && !matches!(key, "true" | "false" | "null" | "undefined") {
        key.to_string()
    } else {
        quoted(key)
    }
}

/// JSON is a valid literal in the accepted source syntax.
fn print_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

// ============================================================================
// RULES
// ============================================================================

fn message_arg(rule: &ValidationRule, refinement: &str) -> String {
    match rule.messages.get(refinement) {
        Some(message) => format!(", {}", quoted(message)),
        None => String::new(),
    }
}

fn message_only(rule: &ValidationRule, refinement: &str) -> String {
    match rule.messages.get(refinement) {
        Some(message) => quoted(message),
        None => String::new(),
    }
}

fn constructor_params(rule: &ValidationRule) -> String {
    let params: Vec<String> = [
        ("required", "required_error"),
        ("invalidType", "invalid_type_error"),
        ("type", "message"),
    ]
    .iter()
    .filter_map(|(key, param)| {
        rule.messages
            .get(*key)
            .map(|message| format!("{}: {}", param, quoted(message)))
    })
    .collect();
    if params.is_empty() {
        String::new()
    } else {
        format!("{{ {} }}", params.join(", "))
    }
}

fn pretty_print_base(rule: &ValidationRule, indent: usize) -> String {
    let params = constructor_params(rule);
    let with_params = |inner: String| -> String {
        match (inner.is_empty(), params.is_empty()) {
            (_, true) => inner,
            (true, false) => params.clone(),
            (false, false) => format!("{}, {}", inner, params),
        }
    };
    match rule.base_type {
        BaseType::String => format!("z.string({})", params),
        BaseType::Number => format!("z.number({})", params),
        BaseType::Boolean => format!("z.boolean({})", params),
        BaseType::Date => format!("z.date({})", params),
        BaseType::Array => {
            // Params are positional after the element.
            match &rule.element {
                Some(element) => format!("z.array({})", with_params(pretty_print_rule(element, indent))),
                None => "z.array()".to_string(),
            }
        }
        BaseType::Object => {
            let shape = rule
                .shape
                .as_ref()
                .map(|shape| pretty_print_shape(shape.iter(), indent))
                .unwrap_or_else(|| "{}".to_string());
            format!("z.object({})", with_params(shape))
        }
        BaseType::Enum => match &rule.enum_values {
            Some(values) => {
                let values: Vec<String> = values.iter().map(|v| quoted(v)).collect();
                format!("z.enum({})", with_params(format!("[{}]", values.join(", "))))
            }
            None => "z.nativeEnum({})".to_string(),
        },
    }
}

/// Validator chain for one rule.
pub fn pretty_print_rule(rule: &ValidationRule, indent: usize) -> String {
    let mut output = pretty_print_base(rule, indent);
    let sized = matches!(rule.base_type, BaseType::String | BaseType::Array);

    if let Some(min) = rule.min {
        output.push_str(&format!(".min({}{})", print_number(min), message_arg(rule, "min")));
    }
    if let Some(max) = rule.max {
        output.push_str(&format!(".max({}{})", print_number(max), message_arg(rule, "max")));
    }
    if rule.integer {
        output.push_str(&format!(".int({})", message_only(rule, "integer")));
    }
    match (rule.min_length, rule.max_length) {
        (Some(min), Some(max)) if min == max && sized => {
            output.push_str(&format!(".length({}{})", min, message_arg(rule, "minLength")));
        }
        (min, max) => {
            if let Some(min) = min {
                output.push_str(&format!(".min({}{})", min, message_arg(rule, "minLength")));
            }
            if let Some(max) = max {
                output.push_str(&format!(".max({}{})", max, message_arg(rule, "maxLength")));
            }
        }
    }
    if rule.email && rule.base_type == BaseType::String {
        output.push_str(&format!(".email({})", message_only(rule, "email")));
    }
    if rule.url && rule.base_type == BaseType::String {
        output.push_str(&format!(".url({})", message_only(rule, "url")));
    }
    if rule.uuid && rule.base_type == BaseType::String {
        output.push_str(&format!(".uuid({})", message_only(rule, "uuid")));
    }
    if let Some(pattern) = &rule.pattern {
        let flags = rule
            .pattern_flags
            .as_deref()
            .map(|f| format!(", {}", quoted(f)))
            .unwrap_or_default();
        output.push_str(&format!(
            ".regex(new RegExp({}{}){})",
            quoted(pattern),
            flags,
            message_arg(rule, "pattern")
        ));
    }
    for (name, value) in [
        ("includes", &rule.includes),
        ("startsWith", &rule.starts_with),
        ("endsWith", &rule.ends_with),
    ] {
        if let Some(value) = value {
            output.push_str(&format!(".{}({}{})", name, quoted(value), message_arg(rule, name)));
        }
    }
    if let Some(description) = &rule.description {
        output.push_str(&format!(".describe({})", quoted(description)));
    }
    for ignored in &rule.ignored {
        output.push_str(&format!(".{}()", ignored));
    }
    if rule.nullable {
        output.push_str(".nullable()");
    }
    if !rule.required {
        match &rule.default_value {
            Some(value) => {
                output.push_str(&format!(".default({})", print_json(value)));
            }
            None => output.push_str(".optional()"),
        }
    }
    output
}

fn pretty_print_shape<'r>(
    entries: impl Iterator<Item = (&'r String, &'r ValidationRule)>,
    indent: usize,
) -> String {
    let mut output = "{\n".to_string();
    for (name, rule) in entries {
        output.push_str(&format!(
            "{}{}: {},\n",
            indent_str(indent + 1),
            print_key(name),
            pretty_print_rule(rule, indent + 1)
        ));
    }
    output.push_str(&format!("{}}}", indent_str(indent)));
    output
}

// ============================================================================
// FIELDS
// ============================================================================

fn pretty_print_options(options: &FieldOptions) -> String {
    match options {
        FieldOptions::Static { values } => {
            let items: Vec<String> = values
                .iter()
                .map(|o| format!("{{ value: {}, label: {} }}", quoted(&o.value), quoted(&o.label)))
                .collect();
            format!("[{}]", items.join(", "))
        }
        FieldOptions::Derived { rule_expression } => rule_expression.clone(),
    }
}

fn pretty_print_object_config(config: &ObjectConfig, indent: usize) -> String {
    let ind = indent_str(indent + 1);
    let mut output = "{\n".to_string();
    if let Some(title) = &config.title {
        output.push_str(&format!("{}title: {},\n", ind, quoted(title)));
    }
    if let Some(description) = &config.description {
        output.push_str(&format!("{}description: {},\n", ind, quoted(description)));
    }
    if let Some(columns) = config.columns {
        output.push_str(&format!("{}columns: {},\n", ind, columns));
    }
    if let Some(layout) = &config.layout {
        output.push_str(&format!("{}layout: {},\n", ind, quoted(layout)));
    }
    if config.collapsible {
        output.push_str(&format!("{}collapsible: true,\n", ind));
    }
    output.push_str(&format!(
        "{}fields: {},\n",
        ind,
        pretty_print_fields(&config.fields, indent + 1, false)
    ));
    output.push_str(&format!("{}}}", indent_str(indent)));
    output
}

fn pretty_print_array_config(config: &ArrayConfig, indent: usize) -> String {
    let ind = indent_str(indent + 1);
    let mut output = "{\n".to_string();
    output.push_str(&format!("{}itemType: {},\n", ind, quoted(config.item_type.as_str())));
    if let Some(label) = &config.item_label {
        output.push_str(&format!("{}itemLabel: {},\n", ind, quoted(label)));
    }
    if let Some(n) = config.min_items {
        output.push_str(&format!("{}minItems: {},\n", ind, n));
    }
    if let Some(n) = config.max_items {
        output.push_str(&format!("{}maxItems: {},\n", ind, n));
    }
    if let Some(label) = &config.add_button_label {
        output.push_str(&format!("{}addButtonLabel: {},\n", ind, quoted(label)));
    }
    if let Some(label) = &config.remove_button_label {
        output.push_str(&format!("{}removeButtonLabel: {},\n", ind, quoted(label)));
    }
    if config.sortable {
        output.push_str(&format!("{}sortable: true,\n", ind));
    }
    if let Some(object) = &config.object_config {
        output.push_str(&format!(
            "{}objectConfig: {},\n",
            ind,
            pretty_print_object_config(object, indent + 1)
        ));
    }
    output.push_str(&format!("{}}}", indent_str(indent)));
    output
}

/// One field object. Top-level rules live in the schema; nested fields carry
/// theirs inline.
fn pretty_print_field(field: &ParsedFieldConfig, indent: usize, top_level: bool) -> String {
    let ind = indent_str(indent + 1);
    let mut output = "{\n".to_string();

    output.push_str(&format!("{}name: {},\n", ind, quoted(&field.name)));
    output.push_str(&format!("{}type: {},\n", ind, quoted(field.field_type.as_str())));
    for (key, value) in [
        ("label", &field.label),
        ("placeholder", &field.placeholder),
        ("description", &field.description),
    ] {
        if let Some(value) = value {
            output.push_str(&format!("{}{}: {},\n", ind, key, quoted(value)));
        }
    }
    if let Some(value) = &field.default_value {
        output.push_str(&format!("{}defaultValue: {},\n", ind, print_json(value)));
    }
    for (key, value) in [("min", field.min), ("max", field.max), ("step", field.step)] {
        if let Some(value) = value {
            output.push_str(&format!("{}{}: {},\n", ind, key, print_number(value)));
        }
    }
    if field.validation.is_none() && field.required {
        output.push_str(&format!("{}required: true,\n", ind));
    }
    if let Some(page) = field.page {
        output.push_str(&format!("{}page: {},\n", ind, page));
    }
    if let Some(tab) = &field.tab {
        output.push_str(&format!("{}tab: {},\n", ind, quoted(tab)));
    }
    if let Some(options) = &field.options {
        output.push_str(&format!("{}options: {},\n", ind, pretty_print_options(options)));
    }
    if let Some(conditional) = &field.conditional {
        output.push_str(&format!("{}conditional: {},\n", ind, conditional));
    }
    if let (Some(rule), false) = (&field.validation, top_level) {
        output.push_str(&format!("{}validation: {},\n", ind, pretty_print_rule(rule, indent + 1)));
    }
    if let Some(config) = &field.array_config {
        output.push_str(&format!(
            "{}arrayConfig: {},\n",
            ind,
            pretty_print_array_config(config, indent + 1)
        ));
    }
    if let Some(config) = &field.object_config {
        output.push_str(&format!(
            "{}objectConfig: {},\n",
            ind,
            pretty_print_object_config(config, indent + 1)
        ));
    }
    for (key, value) in &field.extra {
        output.push_str(&format!("{}{}: {},\n", ind, print_key(key), print_json(value)));
    }

    output.push_str(&format!("{}}}", indent_str(indent)));
    output
}

fn pretty_print_fields(fields: &[ParsedFieldConfig], indent: usize, top_level: bool) -> String {
    if fields.is_empty() {
        return "[]".to_string();
    }
    let mut output = "[\n".to_string();
    for field in fields {
        output.push_str(&format!(
            "{}{},\n",
            indent_str(indent + 1),
            pretty_print_field(field, indent + 1, top_level)
        ));
    }
    output.push_str(&format!("{}]", indent_str(indent)));
    output
}

// ============================================================================
// FORM
// ============================================================================

/// Formedible source text for a parsed config.
pub fn to_source(config: &ParsedFormConfig) -> String {
    let ind = indent_str(1);
    let mut output = "{\n".to_string();

    if let Some(title) = &config.title {
        output.push_str(&format!("{}title: {},\n", ind, quoted(title)));
    }
    if let Some(description) = &config.description {
        output.push_str(&format!("{}description: {},\n", ind, quoted(description)));
    }

    let rules = config
        .fields
        .iter()
        .filter_map(|f| f.validation.as_ref().map(|rule| (&f.name, rule)));
    output.push_str(&format!("{}schema: z.object({}),\n", ind, pretty_print_shape(rules, 1)));
    output.push_str(&format!("{}fields: {},\n", ind, pretty_print_fields(&config.fields, 1, true)));

    if !config.pages.is_empty() {
        output.push_str(&format!("{}pages: {},\n", ind, print_json(&config.pages)));
    }
    if let Some(tabs) = &config.tabs {
        output.push_str(&format!("{}tabs: {},\n", ind, print_json(tabs)));
    }
    output.push_str(&format!("{}settings: {},\n", ind, print_json(&config.settings)));

    output.push('}');
    output
}

/// Wrap printed source in a `formedible` fence, as an AI reply would.
pub fn to_fenced_source(config: &ParsedFormConfig) -> String {
    format!("```formedible\n{}\n```\n", to_source(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::{FieldOption, FieldType};
    use serde_json::Value;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn test_print_key() {
        assert_eq!(print_key("firstName"), "firstName");
        assert_eq!(print_key("first-name"), "\"first-name\"");
        assert_eq!(print_key("1st"), "\"1st\"");
    }

    #[test]
    fn test_rule_chain() {
        let mut rule = ValidationRule::new(BaseType::String);
        rule.min_length = Some(1);
        rule.email = true;
        rule.required = false;
        rule.messages.insert("minLength".into(), "Required".into());
        assert_eq!(
            pretty_print_rule(&rule, 0),
            "z.string().min(1, \"Required\").email().optional()"
        );

        let mut number = ValidationRule::new(BaseType::Number);
        number.min = Some(0.5);
        number.integer = true;
        number.required = false;
        number.default_value = Some(Value::from(3));
        assert_eq!(pretty_print_rule(&number, 0), "z.number().min(0.5).int().default(3)");
    }

    #[test]
    fn test_field_printing() {
        let mut field = ParsedFieldConfig::new("plan", FieldType::Select);
        field.label = Some("Plan".into());
        field.options = Some(FieldOptions::Static {
            values: vec![FieldOption::new("free", "Free")],
        });
        field.conditional = Some("(v) => v.paid".into());
        let printed = pretty_print_field(&field, 0, true);
        assert!(printed.contains("name: \"plan\""));
        assert!(printed.contains("options: [{ value: \"free\", label: \"Free\" }]"));
        assert!(printed.contains("conditional: (v) => v.paid,"));
    }
}
