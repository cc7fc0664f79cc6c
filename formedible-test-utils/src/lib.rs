//! Formedible Test Utilities
//!
//! Shared test infrastructure for the Formedible workspace:
//! - Proptest generators for field types, names and whole form sources
//! - A builder for form source text, plus fixtures for common scenarios
//! - Assertions over parse results

pub use formedible_core::{
    ErrorKind, FieldType, FormParseError, FormResult, ParseOutcome, ParsedFieldConfig,
    ParsedFormConfig, ParserConfig, WarningKind, FIELD_TYPE_WHITELIST,
};

use serde_json::Value;

fn quote(text: &str) -> String {
    Value::from(text).to_string()
}

// ============================================================================
// SOURCE BUILDER
// ============================================================================

/// One field of a generated form.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: String,
    pub label: Option<String>,
    pub required: Option<bool>,
    /// Extra `key: value` source text appended to the field object.
    pub props: Vec<(String, String)>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            label: None,
            required: None,
            props: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Raw source for one property, e.g. `prop("page", "2")`.
    pub fn prop(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.props.push((key.into(), source.into()));
        self
    }

    pub fn to_source(&self) -> String {
        let mut parts = vec![
            format!("name: {}", quote(&self.name)),
            format!("type: {}", quote(&self.field_type)),
        ];
        if let Some(label) = &self.label {
            parts.push(format!("label: {}", quote(label)));
        }
        if let Some(required) = self.required {
            parts.push(format!("required: {}", required));
        }
        for (key, source) in &self.props {
            parts.push(format!("{}: {}", key, source));
        }
        format!("{{ {} }}", parts.join(", "))
    }
}

/// Builds formedible source text the way a model or a user would write it.
#[derive(Debug, Clone, Default)]
pub struct FormSourceBuilder {
    title: Option<String>,
    schema: Vec<(String, String)>,
    fields: Vec<FieldSpec>,
    pages: Vec<(u32, String)>,
    tabs: Vec<(String, String)>,
    settings: Vec<(String, String)>,
}

impl FormSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Schema entry with a validator chain, e.g. `z.string().min(1)`.
    pub fn schema_entry(mut self, name: impl Into<String>, chain: impl Into<String>) -> Self {
        self.schema.push((name.into(), chain.into()));
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(mut self, specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(specs);
        self
    }

    pub fn page(mut self, page: u32, title: impl Into<String>) -> Self {
        self.pages.push((page, title.into()));
        self
    }

    pub fn tab(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.tabs.push((id.into(), label.into()));
        self
    }

    /// Raw source for one settings value.
    pub fn setting(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.settings.push((key.into(), source.into()));
        self
    }

    /// The bare object literal.
    pub fn build(&self) -> String {
        let mut out = String::from("{\n");
        if let Some(title) = &self.title {
            out.push_str(&format!("  title: {},\n", quote(title)));
        }
        if !self.schema.is_empty() {
            out.push_str("  schema: z.object({\n");
            for (name, chain) in &self.schema {
                out.push_str(&format!("    {}: {},\n", name, chain));
            }
            out.push_str("  }),\n");
        }
        out.push_str("  fields: [\n");
        for field in &self.fields {
            out.push_str(&format!("    {},\n", field.to_source()));
        }
        out.push_str("  ],\n");
        if !self.pages.is_empty() {
            let pages: Vec<String> = self
                .pages
                .iter()
                .map(|(page, title)| format!("{{ page: {}, title: {} }}", page, quote(title)))
                .collect();
            out.push_str(&format!("  pages: [{}],\n", pages.join(", ")));
        }
        if !self.tabs.is_empty() {
            let tabs: Vec<String> = self
                .tabs
                .iter()
                .map(|(id, label)| format!("{{ id: {}, label: {} }}", quote(id), quote(label)))
                .collect();
            out.push_str(&format!("  tabs: [{}],\n", tabs.join(", ")));
        }
        if !self.settings.is_empty() {
            let settings: Vec<String> = self
                .settings
                .iter()
                .map(|(key, source)| format!("{}: {}", key, source))
                .collect();
            out.push_str(&format!("  settings: {{ {} }},\n", settings.join(", ")));
        }
        out.push('}');
        out
    }

    /// Wrapped in prose and a ```formedible fence, as a chat reply.
    pub fn fenced(&self) -> String {
        fixtures::chat_reply("formedible", &self.build())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for form sources.

    use super::*;
    use proptest::prelude::*;

    /// Any whitelisted field type.
    pub fn arb_field_type() -> impl Strategy<Value = FieldType> {
        proptest::sample::select(FIELD_TYPE_WHITELIST.to_vec())
            .prop_filter_map("whitelisted", |name| FieldType::parse(name))
    }

    /// Whitelisted types that need no nested configuration.
    pub fn arb_leaf_field_type() -> impl Strategy<Value = FieldType> {
        arb_field_type().prop_filter("leaf type", |t| !t.is_container())
    }

    /// A type identifier outside the whitelist.
    pub fn arb_unknown_field_type() -> impl Strategy<Value = String> {
        "[a-z]{3,12}".prop_filter("not whitelisted", |s| FieldType::parse(s).is_none())
    }

    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_]{0,15}"
    }

    /// 1..=max distinct field names, in generation order.
    pub fn arb_unique_names(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_field_name(), 1..=max.max(1)).prop_flat_map(|names| {
            let names: Vec<String> = names.into_iter().collect();
            Just(names).prop_shuffle()
        })
    }

    pub fn arb_label() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[A-Z][a-z ]{0,20}")
    }

    /// A leaf field with an optional label and required flag.
    pub fn arb_field_spec(name: String) -> impl Strategy<Value = FieldSpec> {
        (arb_leaf_field_type(), arb_label(), proptest::option::of(any::<bool>())).prop_map(
            move |(field_type, label, required)| FieldSpec {
                name: name.clone(),
                field_type: field_type.as_str().to_string(),
                label,
                required,
                props: Vec::new(),
            },
        )
    }

    /// Fields with unique names and whitelisted leaf types.
    pub fn arb_field_specs(max: usize) -> impl Strategy<Value = Vec<FieldSpec>> {
        arb_unique_names(max).prop_flat_map(|names| {
            names.into_iter().map(arb_field_spec).collect::<Vec<_>>()
        })
    }

    /// A whole form, sometimes titled.
    pub fn arb_form_builder() -> impl Strategy<Value = FormSourceBuilder> {
        (arb_field_specs(8), arb_label()).prop_map(|(specs, title)| {
            let builder = FormSourceBuilder::new().fields(specs);
            match title {
                Some(title) => builder.title(title),
                None => builder,
            }
        })
    }

    /// Plain JSON `{ "fields": [...] }`, as the import path receives it.
    pub fn arb_json_form() -> impl Strategy<Value = (Vec<FieldSpec>, String)> {
        arb_field_specs(8).prop_map(|specs| {
            let fields: Vec<Value> = specs
                .iter()
                .map(|spec| {
                    let mut field = serde_json::Map::new();
                    field.insert("name".into(), Value::from(spec.name.as_str()));
                    field.insert("type".into(), Value::from(spec.field_type.as_str()));
                    if let Some(label) = &spec.label {
                        field.insert("label".into(), Value::from(label.as_str()));
                    }
                    if let Some(required) = spec.required {
                        field.insert("required".into(), Value::from(required));
                    }
                    Value::Object(field)
                })
                .collect();
            let json = serde_json::json!({ "fields": fields }).to_string();
            (specs, json)
        })
    }

    pub fn arb_parser_config() -> impl Strategy<Value = ParserConfig> {
        (any::<bool>(), any::<bool>(), any::<bool>(), 1usize..=12).prop_map(
            |(strict, inference, ai_messages, depth)| {
                ParserConfig::default()
                    .with_schema_inference(inference)
                    .with_ai_error_messages(ai_messages)
                    .with_max_nesting_depth(depth)
                    .with_strict_validation(strict)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Source texts for common scenarios.

    use super::*;

    /// Prose, a fenced block with `tag`, and a trailing remark.
    pub fn chat_reply(tag: &str, body: &str) -> String {
        format!(
            "Sure! Here is the form configuration:\n\n```{}\n{}\n```\n\nLet me know if you want changes.\n",
            tag, body
        )
    }

    /// A single optional number field.
    pub fn age_form() -> String {
        r#"{fields:[{name:"age",type:"number",label:"Age"}]}"#.to_string()
    }

    /// A fenced reply with a schema-backed required text field.
    pub fn first_name_reply() -> String {
        FormSourceBuilder::new()
            .schema_entry("firstName", "z.string().min(1)")
            .field(FieldSpec::new("firstName", "text"))
            .fenced()
    }

    /// Two top-level fields named `email`.
    pub fn duplicate_email_form() -> String {
        FormSourceBuilder::new()
            .field(FieldSpec::new("email", "email"))
            .field(FieldSpec::new("email", "text"))
            .build()
    }

    /// `levels` nested array-of-object fields around one text leaf. The leaf
    /// sits at depth `levels`.
    pub fn nested_array_form(levels: usize) -> String {
        let mut fields = r#"[{ name: "leaf", type: "text" }]"#.to_string();
        for level in (0..levels).rev() {
            fields = format!(
                r#"[{{ name: "level{}", type: "array", arrayConfig: {{ itemType: "object", objectConfig: {{ fields: {} }} }} }}]"#,
                level, fields
            );
        }
        format!("{{ fields: {} }}", fields)
    }

    /// `levels` nested object fields around one text leaf.
    pub fn nested_object_form(levels: usize) -> String {
        let mut fields = r#"[{ name: "leaf", type: "text" }]"#.to_string();
        for level in (0..levels).rev() {
            fields = format!(
                r#"[{{ name: "group{}", type: "object", objectConfig: {{ fields: {} }} }}]"#,
                level, fields
            );
        }
        format!("{{ fields: {} }}", fields)
    }

    /// A paged signup form with a bound schema, options and nested address.
    pub fn signup_reply() -> String {
        let body = r#"const formSchema = z.object({
  firstName: z.string().min(1, "First name is required"),
  email: z.string().email().optional(),
  plan: z.enum(["free", "pro"]).default("free"),
  address: z.object({
    street: z.string(),
    city: z.string().min(2),
  }),
});

export default {
  title: "Signup",
  schema: formSchema,
  fields: [
    { name: "firstName", type: "text", label: "First name", page: 1 },
    { name: "email", type: "email", label: "Email", page: 1 },
    {
      name: "plan",
      type: "select",
      label: "Plan",
      page: 2,
      options: [
        { value: "free", label: "Free" },
        { value: "pro", label: "Pro" },
      ],
    },
    {
      name: "address",
      type: "object",
      page: 2,
      objectConfig: {
        title: "Address",
        fields: [
          { name: "street", type: "text", label: "Street" },
          { name: "city", type: "text", label: "City" },
        ],
      },
    },
  ],
  pages: [
    { page: 1, title: "Account" },
    { page: 2, title: "Details" },
  ],
  settings: { submitLabel: "Create account", showProgress: true },
};"#;
        chat_reply("formedible", body)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over parse results.

    use super::*;

    #[track_caller]
    pub fn assert_parsed(result: &FormResult<ParseOutcome>) -> &ParseOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(err) => panic!("Expected a parsed form, got {}: {}", err.kind, err.message),
        }
    }

    #[track_caller]
    pub fn assert_error_kind(result: &FormResult<ParseOutcome>, kind: ErrorKind) -> &FormParseError {
        match result {
            Err(err) if err.kind == kind => err,
            Err(err) => panic!("Expected {} error, got {}: {}", kind, err.kind, err.message),
            Ok(outcome) => panic!("Expected {} error, got a form with {} fields", kind, outcome.config.fields.len()),
        }
    }

    /// Top-level field names, in order.
    #[track_caller]
    pub fn assert_field_names(config: &ParsedFormConfig, expected: &[&str]) {
        assert_eq!(config.field_names(), expected.to_vec(), "field names or order differ");
    }

    #[track_caller]
    pub fn assert_has_warning(outcome: &ParseOutcome, kind: WarningKind) {
        assert!(
            outcome.warnings.iter().any(|w| w.kind == kind),
            "Expected a {:?} warning, got {:?}",
            kind,
            outcome.warnings.iter().map(|w| w.kind).collect::<Vec<_>>()
        );
    }

    #[track_caller]
    pub fn assert_no_warnings(outcome: &ParseOutcome) {
        assert!(outcome.warnings.is_empty(), "Unexpected warnings: {:?}", outcome.warnings);
    }

    /// Every field in every scope respects `maxNestingDepth`.
    #[track_caller]
    pub fn assert_within_depth(config: &ParsedFormConfig, max_depth: usize) {
        assert!(
            config.max_depth() <= max_depth,
            "form depth {} exceeds {}",
            config.max_depth(),
            max_depth
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_field_spec_source() {
        let spec = FieldSpec::new("age", "number").label("Age").required(true).prop("page", "2");
        assert_eq!(
            spec.to_source(),
            r#"{ name: "age", type: "number", label: "Age", required: true, page: 2 }"#
        );
    }

    #[test]
    fn test_builder_layout() {
        let source = FormSourceBuilder::new()
            .title("Signup")
            .schema_entry("email", "z.string().email()")
            .field(FieldSpec::new("email", "email"))
            .page(1, "Account")
            .setting("submitLabel", "\"Go\"")
            .build();
        assert!(source.starts_with("{\n  title: \"Signup\",\n  schema: z.object({\n"));
        assert!(source.contains("    email: z.string().email(),\n"));
        assert!(source.contains("pages: [{ page: 1, title: \"Account\" }]"));
        assert!(source.contains("settings: { submitLabel: \"Go\" }"));
        assert!(source.ends_with('}'));
    }

    #[test]
    fn test_fenced_reply_has_tagged_fence() {
        let reply = fixtures::first_name_reply();
        assert!(reply.contains("```formedible\n{"));
        assert!(reply.trim_end().ends_with("changes."));
    }

    #[test]
    fn test_nested_array_form_depth() {
        let source = fixtures::nested_array_form(2);
        assert_eq!(source.matches("\"array\"").count(), 2);
        assert!(source.contains("level1"));
    }

    proptest! {
        #[test]
        fn prop_field_types_are_whitelisted(field_type in generators::arb_field_type()) {
            prop_assert!(field_type.is_whitelisted());
        }

        #[test]
        fn prop_unknown_types_are_not(name in generators::arb_unknown_field_type()) {
            prop_assert!(!FIELD_TYPE_WHITELIST.contains(&name.as_str()));
        }

        #[test]
        fn prop_field_names_are_unique(specs in generators::arb_field_specs(8)) {
            let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), total);
        }

        #[test]
        fn prop_json_forms_are_json((_, json) in generators::arb_json_form()) {
            prop_assert!(serde_json::from_str::<Value>(&json).is_ok());
        }
    }
}
