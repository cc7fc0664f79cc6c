//! Field tree builder
//!
//! Turns the `fields` array into [`ParsedFieldConfig`]s, recursing into
//! `objectConfig.fields` for object fields and array fields whose items are
//! objects. Each field is matched with its validation rule: inline
//! `validation` first, then the schema entry of the same name, then a rule
//! inferred from the widget type.

use crate::diagnostics::{expr_context, Diagnostics};
use crate::extract::{EntryKind, Expr, SourceTokens};
use crate::normalize::Bindings;
use crate::schema::{RuleMap, SchemaReconstructor};
use formedible_core::{
    ArrayConfig, BaseType, ErrorContext, ErrorKind, FieldOption, FieldOptions, FieldType,
    FormParseError, FormResult, ObjectConfig, ParseWarning, ParsedFieldConfig, ParserConfig,
    ValidationRule, WarningKind, MAX_RECURSION_LEVEL,
};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// INFERENCE
// ============================================================================

/// Rule implied by a field's widget type when neither the schema nor the
/// field itself provides one. `None` for widgets with no natural value type.
pub fn infer_rule(field: &ParsedFieldConfig, required: bool) -> Option<ValidationRule> {
    let choices = field
        .options
        .as_ref()
        .and_then(|options| options.static_values())
        .map(|values| values.iter().map(|o| o.value.clone()).collect::<Vec<_>>());

    let mut rule = match &field.field_type {
        FieldType::Text
        | FieldType::Password
        | FieldType::Tel
        | FieldType::Textarea
        | FieldType::Phone
        | FieldType::Color
        | FieldType::Masked
        | FieldType::Autocomplete => ValidationRule::new(BaseType::String),
        FieldType::Email => {
            let mut rule = ValidationRule::new(BaseType::String);
            rule.email = true;
            rule
        }
        FieldType::Url => {
            let mut rule = ValidationRule::new(BaseType::String);
            rule.url = true;
            rule
        }
        FieldType::Select | FieldType::Radio => match choices {
            Some(values) => {
                let mut rule = ValidationRule::new(BaseType::Enum);
                rule.enum_values = Some(values);
                rule
            }
            None => ValidationRule::new(BaseType::String),
        },
        FieldType::MultiSelect => {
            let mut element = match choices {
                Some(values) => {
                    let mut rule = ValidationRule::new(BaseType::Enum);
                    rule.enum_values = Some(values);
                    rule
                }
                None => ValidationRule::new(BaseType::String),
            };
            element.required = true;
            let mut rule = ValidationRule::new(BaseType::Array);
            rule.element = Some(Box::new(element));
            rule
        }
        FieldType::Number | FieldType::Slider | FieldType::Rating => {
            let mut rule = ValidationRule::new(BaseType::Number);
            rule.min = field.min;
            rule.max = field.max;
            rule
        }
        FieldType::Checkbox | FieldType::Switch => ValidationRule::new(BaseType::Boolean),
        FieldType::Date => ValidationRule::new(BaseType::Date),
        FieldType::Array => ValidationRule::new(BaseType::Array),
        FieldType::Object => ValidationRule::new(BaseType::Object),
        FieldType::File | FieldType::Location | FieldType::Duration | FieldType::Custom(_) => {
            return None
        }
    };
    rule.required = required;
    Some(rule)
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn whole_number(expr: &Expr<'_>) -> Option<f64> {
    expr.as_number().filter(|n| *n >= 0.0 && n.fract() == 0.0)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `"a"`, `3`, or `{ value: "a", label: "A" }`.
fn static_option(item: &Value) -> Option<FieldOption> {
    match item {
        Value::Object(map) => {
            let value = scalar_text(map.get("value")?)?;
            let label = match map.get("label") {
                Some(label) => scalar_text(label)?,
                None => value.clone(),
            };
            Some(FieldOption::new(value, label))
        }
        other => scalar_text(other).map(|text| FieldOption::new(text.clone(), text)),
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct FieldBuilder<'c> {
    config: &'c ParserConfig,
    bindings: &'c Bindings,
    schema: SchemaReconstructor<'c>,
}

impl<'c> FieldBuilder<'c> {
    pub fn new(config: &'c ParserConfig, bindings: &'c Bindings) -> Self {
        Self {
            config,
            bindings,
            schema: SchemaReconstructor::new(config, bindings),
        }
    }

    /// Top-level fields, in source order.
    pub fn build(
        &self,
        expr: Expr<'_>,
        rules: &RuleMap,
        diag: &mut Diagnostics,
    ) -> FormResult<Vec<ParsedFieldConfig>> {
        let fields = self.field_list(expr, Some(rules), "", 0, 0, diag)?;
        tracing::debug!(fields = fields.len(), "field tree built");
        Ok(fields)
    }

    fn field_list(
        &self,
        expr: Expr<'_>,
        rules: Option<&RuleMap>,
        parent: &str,
        depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<Vec<ParsedFieldConfig>> {
        self.check_level(level, parent, &expr)?;
        let expr = expr.without_type_assertion();

        if let Some(name) = expr.as_identifier() {
            let binding = self.bindings.resolve(name).ok_or_else(|| {
                FormParseError::field(format!(
                    "`fields` must be an array literal; `{}` is not a known binding",
                    name
                ))
                .with_context(self.context(parent, &expr))
            })?;
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.field_list(tokens.expr(), rules, parent, depth, level + 1, diag);
        }

        let array = expr.as_array().map_err(|err| {
            FormParseError::field(format!("`fields` is not an array literal: {}", err))
                .with_context(self.context(parent, &expr))
        })?;

        for spread in &array.spreads {
            self.ignored(
                diag,
                parent,
                spread,
                format!("spread `...{}` in a fields array cannot be followed", spread.text()),
            );
        }

        if !array.elements.is_empty() && depth > self.config.max_nesting_depth {
            return Err(FormParseError::new(
                ErrorKind::MaxDepthExceeded,
                format!(
                    "Field nesting depth {} exceeds maxNestingDepth {}",
                    depth, self.config.max_nesting_depth
                ),
            )
            .with_context(self.context(parent, &expr).with_depth(depth)));
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut fields = Vec::with_capacity(array.elements.len());
        for (index, element) in array.elements.iter().enumerate() {
            let field = self.field(*element, index, rules, parent, depth, level + 1, diag)?;
            if let Some(first) = seen.insert(field.name.clone(), index) {
                return Err(FormParseError::field(format!(
                    "Duplicate field name `{}` at index {} (first declared at index {})",
                    field.name, index, first
                ))
                .with_context(
                    expr_context(element)
                        .with_index(index)
                        .with_field_name(join_path(parent, &field.name))
                        .with_depth(depth),
                ));
            }
            fields.push(field);
        }
        Ok(fields)
    }

    #[allow(clippy::too_many_arguments)]
    fn field(
        &self,
        element: Expr<'_>,
        index: usize,
        rules: Option<&RuleMap>,
        parent: &str,
        depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<ParsedFieldConfig> {
        self.check_level(level, parent, &element)?;
        let element = element.without_type_assertion();

        if let Some(binding) = element.as_identifier().and_then(|n| self.bindings.resolve(n)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.field(tokens.expr(), index, rules, parent, depth, level + 1, diag);
        }

        let object = element.as_object().map_err(|err| {
            FormParseError::field(format!("Field at index {} is not an object literal: {}", index, err))
                .with_context(self.context(parent, &element).with_index(index))
        })?;

        let name = match object.value("name").and_then(|v| v.as_string()) {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(FormParseError::field(format!(
                    "Field at index {} needs a non-empty string `name`",
                    index
                ))
                .with_context(self.context(parent, &element).with_index(index)))
            }
        };
        let path = join_path(parent, &name);
        let context = expr_context(&element)
            .with_index(index)
            .with_field_name(path.clone());

        let raw_type = object.value("type").and_then(|v| v.as_string()).ok_or_else(|| {
            FormParseError::field(format!("Field `{}` needs a string `type`", path))
                .with_context(context.clone())
        })?;
        let field_type = match FieldType::parse(&raw_type) {
            Some(field_type) => field_type,
            None if self.config.field_type_validation => {
                return Err(FormParseError::new(
                    ErrorKind::UnknownFieldType,
                    format!("Unknown field type `{}` at index {} (field `{}`)", raw_type, index, path),
                )
                .with_context(context))
            }
            None => FieldType::Custom(raw_type),
        };

        let mut field = ParsedFieldConfig::new(name.clone(), field_type);
        let mut explicit_required = None;
        let mut inline = None;
        let mut array_expr = None;
        let mut object_expr = None;

        for skipped in &object.skipped {
            self.ignored(
                diag,
                &path,
                &skipped.expr,
                format!("`{}` on field `{}` cannot be followed statically", skipped.expr.text(), path),
            );
        }

        for entry in &object.entries {
            let value = entry.value;
            if entry.kind == EntryKind::Method {
                self.ignored(diag, &path, &value, format!("method `{}` on field `{}` is not recorded", entry.key, path));
                continue;
            }
            let key = entry.key.as_str();
            match key {
                "name" | "type" => {}
                "label" => field.label = self.expect(value.as_string(), &value, &path, key, "a string literal", diag),
                "placeholder" => {
                    field.placeholder = self.expect(value.as_string(), &value, &path, key, "a string literal", diag)
                }
                "description" => {
                    field.description = self.expect(value.as_string(), &value, &path, key, "a string literal", diag)
                }
                "defaultValue" => {
                    field.default_value = self.expect(value.to_literal(), &value, &path, key, "a literal", diag)
                }
                "min" => field.min = self.expect(value.as_number(), &value, &path, key, "a number", diag),
                "max" => field.max = self.expect(value.as_number(), &value, &path, key, "a number", diag),
                "step" => field.step = self.expect(value.as_number(), &value, &path, key, "a number", diag),
                "required" => explicit_required = self.expect(value.as_bool(), &value, &path, key, "a boolean", diag),
                "page" => {
                    let page = whole_number(&value)
                        .filter(|n| *n <= u32::MAX as f64)
                        .map(|n| n as u32);
                    field.page = self.expect(page, &value, &path, key, "a non-negative integer", diag);
                }
                "tab" => field.tab = self.expect(value.as_string(), &value, &path, key, "a string literal", diag),
                "options" => field.options = Some(self.options(value, &path, level + 1)?),
                "conditional" => field.conditional = Some(value.text().to_string()),
                "validation" => inline = Some(value),
                "arrayConfig" => array_expr = Some(value),
                "objectConfig" => object_expr = Some(value),
                other => match value.to_literal() {
                    Some(literal) => {
                        field.extra.insert(other.to_string(), literal);
                    }
                    None => self.ignored(
                        diag,
                        &path,
                        &value,
                        format!("non-literal property `{}` on field `{}` is not recorded", other, path),
                    ),
                },
            }
        }

        let rule = self.resolve_rule(&field, &path, depth, inline, explicit_required, rules, diag)?;
        field.required = match (&rule, explicit_required) {
            (Some(rule), Some(flag)) => {
                if rule.required != flag {
                    diag.warn(
                        ParseWarning::new(
                            WarningKind::RequiredFlagConflict,
                            format!(
                                "field `{}` says required: {} but its validation rule says {}",
                                path, flag, rule.required
                            ),
                        )
                        .with_context(context.clone()),
                    );
                }
                rule.required
            }
            (Some(rule), None) => rule.required,
            (None, flag) => flag.unwrap_or(false),
        };

        let nested_rules = rule.as_ref().and_then(|r| r.nested_shape());
        match field.field_type {
            FieldType::Object => {
                let expr = object_expr.ok_or_else(|| {
                    FormParseError::field(format!(
                        "Object field `{}` needs an `objectConfig` with `fields`",
                        path
                    ))
                    .with_context(context.clone())
                })?;
                field.object_config =
                    Some(self.object_config(expr, nested_rules, &path, depth + 1, level + 1, diag)?);
                if let Some(expr) = array_expr {
                    self.misplaced(diag, &path, &expr, "arrayConfig");
                }
            }
            FieldType::Array => {
                let config = match array_expr {
                    Some(expr) => self.array_config(expr, nested_rules, &path, depth + 1, level + 1, diag)?,
                    None => {
                        self.ignored(
                            diag,
                            &path,
                            &element,
                            format!("array field `{}` has no `arrayConfig`; items default to text", path),
                        );
                        ArrayConfig::new(FieldType::Text)
                    }
                };
                field.array_config = Some(config);
                if let Some(expr) = object_expr {
                    self.misplaced(diag, &path, &expr, "objectConfig");
                }
            }
            _ => {
                if let Some(expr) = array_expr {
                    self.misplaced(diag, &path, &expr, "arrayConfig");
                }
                if let Some(expr) = object_expr {
                    self.misplaced(diag, &path, &expr, "objectConfig");
                }
            }
        }

        field.validation = rule;
        Ok(field)
    }

    /// Inline `validation` wins over the schema entry, which wins over an
    /// inferred rule.
    #[allow(clippy::too_many_arguments)]
    fn resolve_rule(
        &self,
        field: &ParsedFieldConfig,
        path: &str,
        depth: usize,
        inline: Option<Expr<'_>>,
        explicit_required: Option<bool>,
        rules: Option<&RuleMap>,
        diag: &mut Diagnostics,
    ) -> FormResult<Option<ValidationRule>> {
        let natural = field.field_type.natural_base_type();
        if let Some(expr) = inline {
            let default_required = explicit_required.unwrap_or(false);
            if let Some(rule) = self
                .schema
                .inline_rule(expr, natural, default_required, path, depth, diag)?
            {
                return Ok(Some(rule));
            }
        }
        if let Some(rule) = rules.and_then(|r| r.get(&field.name)) {
            return Ok(Some(rule.clone()));
        }
        if self.config.enable_schema_inference {
            return Ok(infer_rule(field, explicit_required.unwrap_or(false)));
        }
        Ok(None)
    }

    fn object_config(
        &self,
        expr: Expr<'_>,
        rules: Option<&RuleMap>,
        path: &str,
        child_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<ObjectConfig> {
        self.check_level(level, path, &expr)?;
        let expr = expr.without_type_assertion();
        if let Some(binding) = expr.as_identifier().and_then(|n| self.bindings.resolve(n)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.object_config(tokens.expr(), rules, path, child_depth, level + 1, diag);
        }

        let object = expr.as_object().map_err(|err| {
            FormParseError::field(format!("`objectConfig` of `{}` is not an object literal: {}", path, err))
                .with_context(self.context(path, &expr))
        })?;
        let fields_expr = object.value("fields").ok_or_else(|| {
            FormParseError::field(format!("`objectConfig` of `{}` needs a `fields` array", path))
                .with_context(self.context(path, &expr))
        })?;

        let fields = self.field_list(fields_expr, rules, path, child_depth, level + 1, diag)?;
        let mut config = ObjectConfig::new(fields);

        for entry in &object.entries {
            let value = entry.value;
            let key = entry.key.as_str();
            match key {
                "fields" => {}
                "title" => config.title = self.expect(value.as_string(), &value, path, key, "a string literal", diag),
                "description" => {
                    config.description = self.expect(value.as_string(), &value, path, key, "a string literal", diag)
                }
                "layout" => config.layout = self.expect(value.as_string(), &value, path, key, "a string literal", diag),
                "columns" => {
                    let columns = whole_number(&value)
                        .filter(|n| *n >= 1.0 && *n <= u32::MAX as f64)
                        .map(|n| n as u32);
                    config.columns = self.expect(columns, &value, path, key, "a positive integer", diag);
                }
                "collapsible" => {
                    config.collapsible = self
                        .expect(value.as_bool(), &value, path, key, "a boolean", diag)
                        .unwrap_or(false)
                }
                other => self.ignored(
                    diag,
                    path,
                    &value,
                    format!("unknown objectConfig property `{}` on `{}`", other, path),
                ),
            }
        }
        Ok(config)
    }

    fn array_config(
        &self,
        expr: Expr<'_>,
        rules: Option<&RuleMap>,
        path: &str,
        child_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<ArrayConfig> {
        self.check_level(level, path, &expr)?;
        let expr = expr.without_type_assertion();
        if let Some(binding) = expr.as_identifier().and_then(|n| self.bindings.resolve(n)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.array_config(tokens.expr(), rules, path, child_depth, level + 1, diag);
        }

        let object = expr.as_object().map_err(|err| {
            FormParseError::field(format!("`arrayConfig` of `{}` is not an object literal: {}", path, err))
                .with_context(self.context(path, &expr))
        })?;

        let item_type = match object.value("itemType") {
            None => FieldType::Text,
            Some(value) => {
                let raw = value.as_string().ok_or_else(|| {
                    FormParseError::field(format!("`arrayConfig.itemType` of `{}` must be a string", path))
                        .with_context(self.context(path, &value))
                })?;
                match FieldType::parse(&raw) {
                    Some(item_type) => item_type,
                    None if self.config.field_type_validation => {
                        return Err(FormParseError::new(
                            ErrorKind::UnknownFieldType,
                            format!("Unknown item type `{}` in `arrayConfig` of `{}`", raw, path),
                        )
                        .with_context(self.context(path, &value)))
                    }
                    None => FieldType::Custom(raw),
                }
            }
        };

        let mut config = ArrayConfig::new(item_type);
        for entry in &object.entries {
            let value = entry.value;
            let key = entry.key.as_str();
            match key {
                "itemType" | "objectConfig" => {}
                "itemLabel" => config.item_label = self.expect(value.as_string(), &value, path, key, "a string literal", diag),
                "addButtonLabel" => {
                    config.add_button_label =
                        self.expect(value.as_string(), &value, path, key, "a string literal", diag)
                }
                "removeButtonLabel" => {
                    config.remove_button_label =
                        self.expect(value.as_string(), &value, path, key, "a string literal", diag)
                }
                "minItems" => {
                    let n = whole_number(&value).map(|n| n as usize);
                    config.min_items = self.expect(n, &value, path, key, "a non-negative integer", diag);
                }
                "maxItems" => {
                    let n = whole_number(&value).map(|n| n as usize);
                    config.max_items = self.expect(n, &value, path, key, "a non-negative integer", diag);
                }
                "sortable" => {
                    config.sortable = self
                        .expect(value.as_bool(), &value, path, key, "a boolean", diag)
                        .unwrap_or(false)
                }
                other => self.ignored(
                    diag,
                    path,
                    &value,
                    format!("unknown arrayConfig property `{}` on `{}`", other, path),
                ),
            }
        }

        let nested = object.value("objectConfig");
        if config.item_type == FieldType::Object {
            let nested = nested.ok_or_else(|| {
                FormParseError::field(format!(
                    "Array field `{}` with itemType \"object\" needs `arrayConfig.objectConfig.fields`",
                    path
                ))
                .with_context(self.context(path, &expr))
            })?;
            config.object_config = Some(self.object_config(nested, rules, path, child_depth, level + 1, diag)?);
        } else if let Some(nested) = nested {
            self.misplaced(diag, path, &nested, "arrayConfig.objectConfig");
        }
        Ok(config)
    }

    /// Static options when every element is a literal, otherwise the inert
    /// expression text.
    fn options(&self, value: Expr<'_>, path: &str, level: usize) -> FormResult<FieldOptions> {
        self.check_level(level, path, &value)?;
        let value = value.without_type_assertion();
        if let Some(binding) = value.as_identifier().and_then(|n| self.bindings.resolve(n)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.options(tokens.expr(), path, level + 1);
        }
        if let Some(Value::Array(items)) = value.to_literal() {
            if let Some(values) = items.iter().map(static_option).collect::<Option<Vec<_>>>() {
                return Ok(FieldOptions::Static { values });
            }
        }
        Ok(FieldOptions::Derived {
            rule_expression: value.text().to_string(),
        })
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    fn context(&self, path: &str, expr: &Expr<'_>) -> ErrorContext {
        let context = expr_context(expr);
        if path.is_empty() {
            context
        } else {
            context.with_field_name(path)
        }
    }

    /// `found`, or a warning that the property was skipped.
    fn expect<T>(
        &self,
        found: Option<T>,
        value: &Expr<'_>,
        path: &str,
        key: &str,
        expected: &str,
        diag: &mut Diagnostics,
    ) -> Option<T> {
        if found.is_none() {
            self.ignored(diag, path, value, format!("`{}` on `{}` is not {}; ignored", key, path, expected));
        }
        found
    }

    fn ignored(&self, diag: &mut Diagnostics, path: &str, expr: &Expr<'_>, message: String) {
        diag.warn(
            ParseWarning::new(WarningKind::IgnoredExpression, message).with_context(self.context(path, expr)),
        );
    }

    fn misplaced(&self, diag: &mut Diagnostics, path: &str, expr: &Expr<'_>, key: &str) {
        self.ignored(
            diag,
            path,
            expr,
            format!("`{}` does not apply to field `{}`; dropped", key, path),
        );
    }

    fn check_level(&self, level: usize, path: &str, expr: &Expr<'_>) -> FormResult<()> {
        if level > MAX_RECURSION_LEVEL {
            return Err(FormParseError::new(
                ErrorKind::MaxDepthExceeded,
                format!("Field expression nests deeper than {} levels", MAX_RECURSION_LEVEL),
            )
            .with_context(self.context(path, expr).with_depth(level)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_with(
        source: &str,
        schema: &str,
        config: ParserConfig,
    ) -> (FormResult<Vec<ParsedFieldConfig>>, Vec<ParseWarning>) {
        let bindings = Bindings::default();
        let mut diag = Diagnostics::new(config.strict_validation);
        let rules = if schema.is_empty() {
            RuleMap::new()
        } else {
            let tokens = SourceTokens::lex(schema);
            SchemaReconstructor::new(&config, &bindings)
                .reconstruct(tokens.expr(), &mut diag)
                .expect("schema")
        };
        let tokens = SourceTokens::lex(source);
        let result = FieldBuilder::new(&config, &bindings).build(tokens.expr(), &rules, &mut diag);
        (result, diag.into_warnings())
    }

    fn build(source: &str) -> Vec<ParsedFieldConfig> {
        build_with(source, "", ParserConfig::default()).0.expect("fields")
    }

    fn nested_array_source(levels: usize) -> String {
        let mut source = "[{ name: 'leaf', type: 'text' }]".to_string();
        for level in (0..levels).rev() {
            source = format!(
                "[{{ name: 'f{}', type: 'array', arrayConfig: {{ itemType: 'object', objectConfig: {{ fields: {} }} }} }}]",
                level, source
            );
        }
        source
    }

    #[test]
    fn test_inferred_number_field_is_optional() {
        let fields = build("[{ name: 'age', type: 'number', label: 'Age' }]");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].label.as_deref(), Some("Age"));
        assert!(!fields[0].required);
        let rule = fields[0].validation.as_ref().expect("inferred");
        assert_eq!(rule.base_type, BaseType::Number);
    }

    #[test]
    fn test_schema_rule_sets_required() {
        let (fields, _) = build_with(
            "[{ name: 'firstName', type: 'text' }]",
            "z.object({ firstName: z.string().min(1) })",
            ParserConfig::default(),
        );
        let fields = fields.expect("fields");
        assert!(fields[0].required);
        assert_eq!(fields[0].validation.as_ref().and_then(|r| r.min_length), Some(1));
    }

    #[test]
    fn test_inline_validation_wins_and_conflict_warns() {
        let (fields, warnings) = build_with(
            "[{ name: 'nick', type: 'text', required: true, validation: z.string().optional() }]",
            "z.object({ nick: z.string() })",
            ParserConfig::default(),
        );
        let fields = fields.expect("fields");
        assert!(!fields[0].required);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::RequiredFlagConflict));
    }

    #[test]
    fn test_unknown_type_names_index_and_value() {
        let (result, _) = build_with(
            "[{ name: 'a', type: 'text' }, { name: 'sig', type: 'signature' }]",
            "",
            ParserConfig::default(),
        );
        let err = result.expect_err("unknown type");
        assert_eq!(err.kind, ErrorKind::UnknownFieldType);
        assert_eq!(err.context.index, Some(1));
        assert!(err.message.contains("signature"));

        let lenient = ParserConfig::default().with_field_type_validation(false);
        let (result, _) = build_with("[{ name: 'sig', type: 'signature' }]", "", lenient);
        let fields = result.expect("custom type");
        assert_eq!(fields[0].field_type, FieldType::Custom("signature".into()));
        assert!(fields[0].validation.is_none());
    }

    #[test]
    fn test_static_and_derived_options() {
        let fields = build(
            "[{ name: 'plan', type: 'select', options: ['free', { value: 'pro', label: 'Pro' }] },
              { name: 'city', type: 'select', options: cities.map((c) => ({ value: c, label: c })) }]",
        );
        let values = fields[0].options.as_ref().and_then(|o| o.static_values()).expect("static");
        assert_eq!(values[1], FieldOption::new("pro", "Pro"));
        let plan_rule = fields[0].validation.as_ref().expect("rule");
        assert_eq!(plan_rule.base_type, BaseType::Enum);
        assert_eq!(plan_rule.enum_values, Some(vec!["free".to_string(), "pro".to_string()]));
        assert!(matches!(
            &fields[1].options,
            Some(FieldOptions::Derived { rule_expression }) if rule_expression.starts_with("cities.map")
        ));
    }

    #[test]
    fn test_conditional_is_inert_text_and_extras_kept() {
        let fields = build("[{ name: 'x', type: 'textarea', rows: 4, conditional: (v) => v.kind === 'a' }]");
        assert_eq!(fields[0].conditional.as_deref(), Some("(v) => v.kind === 'a'"));
        assert_eq!(fields[0].extra.get("rows"), Some(&Value::from(4)));
    }

    #[test]
    fn test_object_field_recurses_with_nested_rules() {
        let (fields, _) = build_with(
            "[{ name: 'address', type: 'object', objectConfig: { title: 'Address', fields: [{ name: 'city', type: 'text' }] } }]",
            "z.object({ address: z.object({ city: z.string().min(2) }) })",
            ParserConfig::default(),
        );
        let fields = fields.expect("fields");
        let object = fields[0].object_config.as_ref().expect("object config");
        assert_eq!(object.title.as_deref(), Some("Address"));
        assert_eq!(object.fields[0].name, "city");
        assert!(object.fields[0].required);
        assert_eq!(object.fields[0].validation.as_ref().and_then(|r| r.min_length), Some(2));
    }

    #[test]
    fn test_object_without_config_fails() {
        let (result, _) = build_with("[{ name: 'addr', type: 'object' }]", "", ParserConfig::default());
        assert_eq!(result.expect_err("no config").kind, ErrorKind::FieldParseError);
    }

    #[test]
    fn test_array_defaults_and_misplaced_config() {
        let (result, warnings) = build_with(
            "[{ name: 'tags', type: 'array' }, { name: 'n', type: 'text', objectConfig: { fields: [] } }]",
            "",
            ParserConfig::default(),
        );
        let fields = result.expect("fields");
        assert_eq!(fields[0].array_config.as_ref().map(|c| &c.item_type), Some(&FieldType::Text));
        assert!(fields[1].object_config.is_none());
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::IgnoredExpression));
    }

    #[test]
    fn test_nesting_depth_boundary() {
        let config = ParserConfig::default().with_max_nesting_depth(5);
        let (ok, _) = build_with(&nested_array_source(5), "", config);
        assert!(ok.is_ok());

        let (deep, _) = build_with(&nested_array_source(12), "", config);
        let err = deep.expect_err("too deep");
        assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
        assert_eq!(err.context.depth, Some(6));
    }

    #[test]
    fn test_missing_name_is_field_error() {
        let (result, _) = build_with("[{ type: 'text' }]", "", ParserConfig::default());
        let err = result.expect_err("missing name");
        assert_eq!(err.kind, ErrorKind::FieldParseError);
        assert_eq!(err.context.index, Some(0));
    }

    #[test]
    fn test_duplicate_name_carries_element_snippet() {
        let source = "[\n  { name: 'email', type: 'email' },\n  { name: 'email', type: 'text' }\n]";
        let (result, _) = build_with(source, "", ParserConfig::default());
        let err = result.expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::FieldParseError);
        assert!(err.message.contains("first declared at index 0"));
        assert_eq!(err.context.index, Some(1));
        assert_eq!(err.context.depth, Some(0));
        assert_eq!(err.context.line, Some(3));
        let snippet = err.context.snippet.as_deref().expect("snippet");
        assert!(snippet.contains("type: 'text'"));
    }

    #[test]
    fn test_infer_rule_table() {
        let email = infer_rule(&ParsedFieldConfig::new("e", FieldType::Email), true).expect("rule");
        assert!(email.email && email.required);
        let toggle = infer_rule(&ParsedFieldConfig::new("t", FieldType::Switch), false).expect("rule");
        assert_eq!(toggle.base_type, BaseType::Boolean);
        assert!(infer_rule(&ParsedFieldConfig::new("f", FieldType::File), false).is_none());
    }
}
