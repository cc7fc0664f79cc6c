//! Schema reconstructor
//!
//! Walks `z.object({...})` validator chains and turns every entry into an
//! inert [`ValidationRule`]. Chains are read token by token; nothing is ever
//! executed. Calls the reconstructor does not know are kept as markers in
//! `ValidationRule::ignored`.

use crate::diagnostics::{expr_context, Diagnostics};
use crate::extract::{split_arguments, Cursor, EntryKind, Expr, ExtractError, SourceTokens};
use crate::lexer::TokenKind;
use crate::normalize::Bindings;
use formedible_core::{
    BaseType, ErrorContext, ErrorKind, FormParseError, FormResult, ParseWarning, ParserConfig,
    Refinement, ValidationRule, WarningKind, MAX_RECURSION_LEVEL,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field name to reconstructed rule.
pub type RuleMap = BTreeMap<String, ValidationRule>;

// ============================================================================
// CALL CHAINS
// ============================================================================

/// One `.name(args)` link. `args` is `None` for a bare property access such
/// as the `coerce` in `z.coerce.number()`.
#[derive(Debug, Clone)]
struct Call<'a> {
    name: &'a str,
    args: Option<Vec<Expr<'a>>>,
    expr: Expr<'a>,
}

#[derive(Debug, Clone)]
struct Chain<'a> {
    /// Leading identifier (`z`, or a bound schema name). `None` when the
    /// chain starts with a call, as in `string().min(1)`.
    root: Option<&'a str>,
    calls: Vec<Call<'a>>,
}

fn parse_chain(expr: Expr<'_>) -> Result<Chain<'_>, ExtractError> {
    let expr = expr.without_type_assertion();
    let mut cursor = Cursor::new(expr);
    let mut calls = Vec::new();

    let first = cursor.expect_identifier()?;
    let mut root = Some(first);
    if cursor.check(&TokenKind::LParen) {
        let args = split_arguments(cursor.take_group()?)?;
        calls.push(Call {
            name: first,
            args: Some(args),
            expr: expr.slice(0, cursor.position()),
        });
        root = None;
    }

    while !cursor.is_at_end() {
        let linked = match cursor.current().map(|t| &t.kind) {
            Some(TokenKind::Dot) => true,
            Some(TokenKind::Operator(op)) => op == "?.",
            _ => false,
        };
        if !linked {
            return Err(cursor.error("'.' in validator chain"));
        }
        cursor.advance();

        let start = cursor.position();
        let name = cursor.expect_identifier()?;
        let args = if cursor.check(&TokenKind::LParen) {
            Some(split_arguments(cursor.take_group()?)?)
        } else {
            None
        };
        calls.push(Call {
            name,
            args,
            expr: expr.slice(start, cursor.position()),
        });
    }

    Ok(Chain { root, calls })
}

/// Refinements a call contributes for the given base type. The first entry
/// decides compatibility.
fn refinements_for(name: &str, base: BaseType) -> Option<&'static [Refinement]> {
    let sized = matches!(base, BaseType::String | BaseType::Array);
    let refinements: &'static [Refinement] = match name {
        "min" if sized => &[Refinement::MinLength],
        "min" => &[Refinement::Min],
        "max" if sized => &[Refinement::MaxLength],
        "max" => &[Refinement::Max],
        "length" => &[Refinement::MinLength, Refinement::MaxLength],
        "nonempty" => &[Refinement::MinLength],
        "int" => &[Refinement::Integer],
        "email" => &[Refinement::Email],
        "url" => &[Refinement::Url],
        "uuid" => &[Refinement::Uuid],
        "regex" | "pattern" => &[Refinement::Pattern],
        "includes" => &[Refinement::Includes],
        "startsWith" => &[Refinement::StartsWith],
        "endsWith" => &[Refinement::EndsWith],
        _ => return None,
    };
    Some(refinements)
}

fn length_value(expr: &Expr<'_>) -> Option<usize> {
    expr.as_number()
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as usize)
}

/// A trailing message argument: `"text"` or `{ message: "text" }`.
fn message_text(expr: &Expr<'_>) -> Option<String> {
    if let Some(text) = expr.as_string() {
        return Some(text);
    }
    match expr.to_literal() {
        Some(Value::Object(map)) => map.get("message").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Pattern body and flags from a regex literal, a string, or
/// `new RegExp("body", "flags")`.
fn pattern_argument(expr: &Expr<'_>) -> Option<(String, String)> {
    if let Some((pattern, flags)) = expr.as_regex() {
        return Some((pattern.to_string(), flags.to_string()));
    }
    if let Some(pattern) = expr.as_string() {
        return Some((pattern, String::new()));
    }

    let mut cursor = Cursor::new(*expr);
    if cursor.expect_identifier().ok()? != "new" || cursor.expect_identifier().ok()? != "RegExp" {
        return None;
    }
    if !cursor.check(&TokenKind::LParen) {
        return None;
    }
    let args = split_arguments(cursor.take_group().ok()?).ok()?;
    if !cursor.is_at_end() {
        return None;
    }
    let pattern = args.first()?.as_string()?;
    let flags = match args.get(1) {
        Some(arg) => arg.as_string()?,
        None => String::new(),
    };
    Some((pattern, flags))
}

/// Constructor parameter objects such as `z.string({ required_error: "..." })`.
fn capture_params(rule: &mut ValidationRule, params: &Expr<'_>) {
    let map = match params.to_literal() {
        Some(Value::Object(map)) => map,
        _ => return,
    };
    for (key, target) in [
        ("required_error", "required"),
        ("invalid_type_error", "invalidType"),
        ("message", "type"),
    ] {
        if let Some(text) = map.get(key).and_then(Value::as_str) {
            rule.messages.insert(target.to_string(), text.to_string());
        }
    }
    if let Some(text) = map.get("description").and_then(Value::as_str) {
        rule.description = Some(text.to_string());
    }
}

fn refinement_present(rule: &ValidationRule, refinement: Refinement) -> bool {
    match refinement {
        Refinement::Min => rule.min.is_some(),
        Refinement::Max => rule.max.is_some(),
        Refinement::MinLength => rule.min_length.is_some(),
        Refinement::MaxLength => rule.max_length.is_some(),
        Refinement::Integer => rule.integer,
        Refinement::Pattern => rule.pattern.is_some(),
        Refinement::Email => rule.email,
        Refinement::Url => rule.url,
        Refinement::Uuid => rule.uuid,
        Refinement::Includes => rule.includes.is_some(),
        Refinement::StartsWith => rule.starts_with.is_some(),
        Refinement::EndsWith => rule.ends_with.is_some(),
        Refinement::EnumValues => rule.enum_values.is_some(),
    }
}

fn clear_refinement(rule: &mut ValidationRule, refinement: Refinement) {
    match refinement {
        Refinement::Min => rule.min = None,
        Refinement::Max => rule.max = None,
        Refinement::MinLength => rule.min_length = None,
        Refinement::MaxLength => rule.max_length = None,
        Refinement::Integer => rule.integer = false,
        Refinement::Pattern => {
            rule.pattern = None;
            rule.pattern_flags = None;
        }
        Refinement::Email => rule.email = false,
        Refinement::Url => rule.url = false,
        Refinement::Uuid => rule.uuid = false,
        Refinement::Includes => rule.includes = None,
        Refinement::StartsWith => rule.starts_with = None,
        Refinement::EndsWith => rule.ends_with = None,
        Refinement::EnumValues => rule.enum_values = None,
    }
}

const ALL_REFINEMENTS: [Refinement; 13] = [
    Refinement::Min,
    Refinement::Max,
    Refinement::MinLength,
    Refinement::MaxLength,
    Refinement::Integer,
    Refinement::Pattern,
    Refinement::Email,
    Refinement::Url,
    Refinement::Uuid,
    Refinement::Includes,
    Refinement::StartsWith,
    Refinement::EndsWith,
    Refinement::EnumValues,
];

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

// ============================================================================
// RECONSTRUCTOR
// ============================================================================

/// Rebuilds rule trees from schema source. Depth arguments named
/// `child_depth` give the field depth at which an object rule's shape
/// entries live; `level` counts raw recursion (bindings, elements, shapes)
/// and is capped at [`MAX_RECURSION_LEVEL`].
pub struct SchemaReconstructor<'c> {
    config: &'c ParserConfig,
    bindings: &'c Bindings,
}

impl<'c> SchemaReconstructor<'c> {
    pub fn new(config: &'c ParserConfig, bindings: &'c Bindings) -> Self {
        Self { config, bindings }
    }

    /// Rule map for the value of a form's `schema` property.
    pub fn reconstruct(&self, expr: Expr<'_>, diag: &mut Diagnostics) -> FormResult<RuleMap> {
        let rules = self.top_level(expr, 0, diag)?;
        tracing::debug!(rules = rules.len(), "schema reconstructed");
        Ok(rules)
    }

    /// Rule for a field's inline `validation` property: either a validator
    /// chain or an object literal of rule properties. `default_required`
    /// only applies to the object literal form.
    pub fn inline_rule(
        &self,
        expr: Expr<'_>,
        natural: Option<BaseType>,
        default_required: bool,
        field_path: &str,
        field_depth: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<Option<ValidationRule>> {
        let expr = expr.without_type_assertion();
        if expr.is_object() {
            return self.literal_rule(expr, natural, default_required, field_path, diag);
        }
        self.rule(expr, field_path, field_depth + 1, 0, diag)
    }

    fn top_level(&self, expr: Expr<'_>, level: usize, diag: &mut Diagnostics) -> FormResult<RuleMap> {
        self.check_level(level, "", &expr)?;
        let expr = expr.without_type_assertion();

        if expr.is_object() {
            return self.shape(expr, "", 0, level + 1, diag);
        }
        if let Some(binding) = expr.as_identifier().and_then(|name| self.bindings.resolve(name)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.top_level(tokens.expr(), level + 1, diag);
        }

        match self.rule(expr, "", 0, level + 1, diag)? {
            Some(rule) if rule.base_type == BaseType::Object => Ok(rule.shape.unwrap_or_default()),
            Some(rule) => {
                self.broken(
                    diag,
                    "",
                    &expr,
                    format!("schema must be `z.object({{...}})`, found a {} rule", rule.base_type),
                )?;
                Ok(RuleMap::new())
            }
            None => Ok(RuleMap::new()),
        }
    }

    /// Entries of an object literal of validators.
    fn shape(
        &self,
        expr: Expr<'_>,
        path: &str,
        entry_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<RuleMap> {
        self.check_level(level, path, &expr)?;
        let object = match expr.as_object() {
            Ok(object) => object,
            Err(err) => {
                self.broken(diag, path, &expr, format!("malformed object shape: {}", err))?;
                return Ok(RuleMap::new());
            }
        };

        if !object.entries.is_empty() && entry_depth > self.config.max_nesting_depth {
            let context = self.context(path, &expr).with_depth(entry_depth);
            return Err(FormParseError::new(
                ErrorKind::MaxDepthExceeded,
                format!(
                    "Schema nesting depth {} exceeds maxNestingDepth {}",
                    entry_depth, self.config.max_nesting_depth
                ),
            )
            .with_context(context));
        }

        for skipped in &object.skipped {
            diag.warn(
                ParseWarning::new(
                    WarningKind::IgnoredExpression,
                    format!("`{}` in a schema shape cannot be followed statically", skipped.expr.text()),
                )
                .with_context(self.context(path, &skipped.expr)),
            );
        }

        let mut rules = RuleMap::new();
        for entry in &object.entries {
            let entry_path = join_path(path, &entry.key);
            if entry.kind == EntryKind::Method {
                self.broken(
                    diag,
                    &entry_path,
                    &entry.value,
                    format!("method `{}` is not a validator", entry.key),
                )?;
                continue;
            }
            if let Some(rule) = self.rule(entry.value, &entry_path, entry_depth + 1, level + 1, diag)? {
                rules.insert(entry.key.clone(), rule);
            }
        }
        Ok(rules)
    }

    /// One validator expression. `Ok(None)` means it was unreadable and a
    /// warning has been recorded.
    fn rule(
        &self,
        expr: Expr<'_>,
        path: &str,
        child_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<Option<ValidationRule>> {
        self.check_level(level, path, &expr)?;
        let expr = expr.without_type_assertion();

        if let Some(name) = expr.as_identifier() {
            return match self.bindings.resolve(name) {
                Some(binding) => {
                    let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
                    self.rule(tokens.expr(), path, child_depth, level + 1, diag)
                }
                None => {
                    self.broken(
                        diag,
                        path,
                        &expr,
                        format!("`{}` is neither a validator chain nor a known binding", name),
                    )?;
                    Ok(None)
                }
            };
        }

        let chain = match parse_chain(expr) {
            Ok(chain) => chain,
            Err(err) => {
                self.broken(diag, path, &expr, format!("malformed validator chain: {}", err))?;
                return Ok(None);
            }
        };

        let calls = chain.calls;
        let bound = chain.root.and_then(|root| self.bindings.resolve(root));
        let (mut rule, rest) = match bound {
            Some(binding) => {
                let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
                match self.rule(tokens.expr(), path, child_depth, level + 1, diag)? {
                    Some(rule) => (rule, &calls[..]),
                    None => return Ok(None),
                }
            }
            None => {
                let mut index = 0;
                while calls
                    .get(index)
                    .map(|c| c.args.is_none() && c.name == "coerce")
                    .unwrap_or(false)
                {
                    index += 1;
                }
                let call = match calls.get(index) {
                    Some(call) if call.args.is_some() => call,
                    _ => {
                        self.broken(
                            diag,
                            path,
                            &expr,
                            "missing base constructor call such as `z.string()`".to_string(),
                        )?;
                        return Ok(None);
                    }
                };
                match self.construct(call, path, child_depth, level, diag)? {
                    Some(rule) => (rule, &calls[index + 1..]),
                    None => return Ok(None),
                }
            }
        };

        for call in rest {
            self.refine(&mut rule, call, path, diag)?;
        }
        Ok(Some(rule))
    }

    /// The base constructor at the head of a chain.
    fn construct(
        &self,
        call: &Call<'_>,
        path: &str,
        child_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<Option<ValidationRule>> {
        let args = call.args.as_deref().unwrap_or(&[]);

        if matches!(call.name, "email" | "url" | "uuid") {
            let mut rule = ValidationRule::new(BaseType::String);
            match call.name {
                "email" => rule.email = true,
                "url" => rule.url = true,
                _ => rule.uuid = true,
            }
            if let Some(message) = args.first().and_then(message_text) {
                rule.messages.insert(call.name.to_string(), message);
            }
            return Ok(Some(rule));
        }

        let base = match BaseType::from_constructor(call.name) {
            Some(base) => base,
            None => {
                self.broken(
                    diag,
                    path,
                    &call.expr,
                    format!("unknown base constructor `{}()`", call.name),
                )?;
                return Ok(None);
            }
        };

        let mut rule = ValidationRule::new(base);
        match base {
            BaseType::Array => {
                if let Some(element) = args.first() {
                    let element_path = format!("{}[]", path);
                    rule.element = self
                        .rule(*element, &element_path, child_depth, level + 1, diag)?
                        .map(Box::new);
                }
                if let Some(params) = args.get(1) {
                    capture_params(&mut rule, params);
                }
            }
            BaseType::Object => {
                let shape = match args.first() {
                    Some(arg) => self.object_argument(*arg, path, child_depth, level + 1, diag)?,
                    None => RuleMap::new(),
                };
                rule.shape = Some(shape);
                if let Some(params) = args.get(1) {
                    capture_params(&mut rule, params);
                }
            }
            BaseType::Enum if call.name == "enum" => {
                let values = match args.first() {
                    Some(arg) => self.enum_values(*arg, path, level + 1)?,
                    None => None,
                };
                if values.is_none() {
                    self.broken(
                        diag,
                        path,
                        &call.expr,
                        "`z.enum()` needs a literal array of strings".to_string(),
                    )?;
                }
                rule.enum_values = values;
                if let Some(params) = args.get(1) {
                    capture_params(&mut rule, params);
                }
            }
            _ => {
                if let Some(params) = args.first() {
                    capture_params(&mut rule, params);
                }
            }
        }
        Ok(Some(rule))
    }

    fn object_argument(
        &self,
        arg: Expr<'_>,
        path: &str,
        entry_depth: usize,
        level: usize,
        diag: &mut Diagnostics,
    ) -> FormResult<RuleMap> {
        self.check_level(level, path, &arg)?;
        let arg = arg.without_type_assertion();
        if let Some(binding) = arg.as_identifier().and_then(|name| self.bindings.resolve(name)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.object_argument(tokens.expr(), path, entry_depth, level + 1, diag);
        }
        if arg.is_object() {
            return self.shape(arg, path, entry_depth, level + 1, diag);
        }
        self.broken(
            diag,
            path,
            &arg,
            "`z.object()` needs an object literal of validators".to_string(),
        )?;
        Ok(RuleMap::new())
    }

    fn enum_values(&self, arg: Expr<'_>, path: &str, level: usize) -> FormResult<Option<Vec<String>>> {
        self.check_level(level, path, &arg)?;
        if let Some(binding) = arg.as_identifier().and_then(|name| self.bindings.resolve(name)) {
            let tokens = SourceTokens::lex_at(&binding.text, binding.line, binding.column);
            return self.enum_values(tokens.expr(), path, level + 1);
        }
        let values = match arg.to_literal() {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>(),
            _ => None,
        };
        Ok(values)
    }

    /// Apply one refinement call to `rule`.
    fn refine(
        &self,
        rule: &mut ValidationRule,
        call: &Call<'_>,
        path: &str,
        diag: &mut Diagnostics,
    ) -> FormResult<()> {
        let args = match call.args.as_deref() {
            Some(args) => args,
            None => return self.ignore(rule, call, path, diag),
        };

        match call.name {
            "optional" => rule.required = false,
            "nullable" => rule.nullable = true,
            "nullish" => {
                rule.required = false;
                rule.nullable = true;
            }
            "default" => {
                rule.required = false;
                if let Some(arg) = args.first() {
                    match arg.to_literal() {
                        Some(value) => rule.default_value = Some(value),
                        None => diag.warn(
                            ParseWarning::new(
                                WarningKind::IgnoredExpression,
                                format!("non-literal default `{}` is not recorded", arg.text()),
                            )
                            .with_context(self.context(path, arg)),
                        ),
                    }
                }
            }
            "describe" => rule.description = args.first().and_then(|a| a.as_string()),
            "array" => {
                let element = std::mem::replace(rule, ValidationRule::new(BaseType::Array));
                rule.element = Some(Box::new(element));
            }
            name => match refinements_for(name, rule.base_type) {
                Some(refinements) => self.constrain(rule, call, args, refinements, path, diag)?,
                None => self.ignore(rule, call, path, diag)?,
            },
        }
        Ok(())
    }

    fn constrain(
        &self,
        rule: &mut ValidationRule,
        call: &Call<'_>,
        args: &[Expr<'_>],
        refinements: &[Refinement],
        path: &str,
        diag: &mut Diagnostics,
    ) -> FormResult<()> {
        let primary = refinements[0];
        if !rule.supports(primary) {
            return diag.strict_or_warn(
                ParseWarning::new(
                    WarningKind::IncompatibleRefinement,
                    format!("`.{}()` does not apply to a {} rule", call.name, rule.base_type),
                )
                .with_context(self.context(path, &call.expr)),
                ErrorKind::SchemaParseError,
            );
        }

        let takes_value = call.name != "nonempty"
            && !matches!(
                primary,
                Refinement::Integer | Refinement::Email | Refinement::Url | Refinement::Uuid
            );
        let (value, message) = if takes_value {
            (args.first(), args.get(1))
        } else {
            (None, args.first())
        };

        let applied = match primary {
            Refinement::Min => value.and_then(|v| v.as_number()).map(|n| rule.min = Some(n)),
            Refinement::Max => value.and_then(|v| v.as_number()).map(|n| rule.max = Some(n)),
            Refinement::MinLength | Refinement::MaxLength => {
                let length = if call.name == "nonempty" {
                    Some(1)
                } else {
                    value.and_then(length_value)
                };
                length.map(|n| {
                    for refinement in refinements {
                        match refinement {
                            Refinement::MinLength => rule.min_length = Some(n),
                            _ => rule.max_length = Some(n),
                        }
                    }
                })
            }
            Refinement::Integer => {
                rule.integer = true;
                Some(())
            }
            Refinement::Email => {
                rule.email = true;
                Some(())
            }
            Refinement::Url => {
                rule.url = true;
                Some(())
            }
            Refinement::Uuid => {
                rule.uuid = true;
                Some(())
            }
            Refinement::Pattern => value.and_then(pattern_argument).map(|(pattern, flags)| {
                rule.pattern = Some(pattern);
                rule.pattern_flags = if flags.is_empty() { None } else { Some(flags) };
            }),
            Refinement::Includes => value.and_then(|v| v.as_string()).map(|s| rule.includes = Some(s)),
            Refinement::StartsWith => value.and_then(|v| v.as_string()).map(|s| rule.starts_with = Some(s)),
            Refinement::EndsWith => value.and_then(|v| v.as_string()).map(|s| rule.ends_with = Some(s)),
            Refinement::EnumValues => Some(()),
        };

        if applied.is_none() {
            return self.broken(
                diag,
                path,
                &call.expr,
                format!("`.{}()` needs a literal argument", call.name),
            );
        }

        if let Some(text) = message.and_then(message_text) {
            for refinement in refinements {
                rule.messages.insert(refinement.as_str().to_string(), text.clone());
            }
        }
        Ok(())
    }

    fn ignore(
        &self,
        rule: &mut ValidationRule,
        call: &Call<'_>,
        path: &str,
        diag: &mut Diagnostics,
    ) -> FormResult<()> {
        rule.ignored.push(call.name.to_string());
        diag.strict_or_warn(
            ParseWarning::new(
                WarningKind::IgnoredRefinement,
                format!("unrecognized refinement `.{}()` kept as an inert marker", call.name),
            )
            .with_context(self.context(path, &call.expr)),
            ErrorKind::SchemaParseError,
        )
    }

    /// `validation: { required: true, minLength: 3 }`. Keys use the rule's
    /// own camelCase names.
    fn literal_rule(
        &self,
        expr: Expr<'_>,
        natural: Option<BaseType>,
        default_required: bool,
        path: &str,
        diag: &mut Diagnostics,
    ) -> FormResult<Option<ValidationRule>> {
        let map = match expr.to_literal() {
            Some(Value::Object(map)) => map,
            _ => {
                self.broken(
                    diag,
                    path,
                    &expr,
                    "inline validation object may only contain literal values".to_string(),
                )?;
                return Ok(None);
            }
        };

        let base = map
            .get("baseType")
            .or_else(|| map.get("type"))
            .and_then(Value::as_str)
            .and_then(BaseType::from_constructor)
            .or(natural)
            .unwrap_or(BaseType::String);

        let mut defaults = ValidationRule::new(base);
        defaults.required = default_required;
        let mut merged = match serde_json::to_value(defaults) {
            Ok(Value::Object(defaults)) => defaults,
            _ => Map::new(),
        };
        for (key, value) in map {
            if key != "type" {
                merged.insert(key, value);
            }
        }
        merged.insert("baseType".to_string(), Value::String(base.as_str().to_string()));

        let mut rule = match serde_json::from_value::<ValidationRule>(Value::Object(merged)) {
            Ok(rule) => rule,
            Err(err) => {
                self.broken(diag, path, &expr, format!("inline validation object is not a rule: {}", err))?;
                return Ok(None);
            }
        };

        for refinement in ALL_REFINEMENTS {
            if refinement_present(&rule, refinement) && !rule.supports(refinement) {
                diag.strict_or_warn(
                    ParseWarning::new(
                        WarningKind::IncompatibleRefinement,
                        format!("`{}` does not apply to a {} rule", refinement, rule.base_type),
                    )
                    .with_context(self.context(path, &expr)),
                    ErrorKind::SchemaParseError,
                )?;
                clear_refinement(&mut rule, refinement);
            }
        }
        Ok(Some(rule))
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

    /// An unreadable rule: a warning, or `SchemaParseError` when strict.
    fn broken(&self, diag: &mut Diagnostics, path: &str, expr: &Expr<'_>, message: String) -> FormResult<()> {
        diag.strict_or_warn(
            ParseWarning::new(WarningKind::SchemaRule, message).with_context(self.context(path, expr)),
            ErrorKind::SchemaParseError,
        )
    }

    fn check_level(&self, level: usize, path: &str, expr: &Expr<'_>) -> FormResult<()> {
        if level > MAX_RECURSION_LEVEL {
            return Err(FormParseError::new(
                ErrorKind::MaxDepthExceeded,
                format!("Schema expression nests deeper than {} levels", MAX_RECURSION_LEVEL),
            )
            .with_context(self.context(path, expr).with_depth(level)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn reconstruct_with(source: &str, config: ParserConfig) -> (FormResult<RuleMap>, Vec<ParseWarning>) {
        let bindings = Bindings::default();
        let tokens = SourceTokens::lex(source);
        let mut diag = Diagnostics::new(config.strict_validation);
        let result = SchemaReconstructor::new(&config, &bindings).reconstruct(tokens.expr(), &mut diag);
        (result, diag.into_warnings())
    }

    fn reconstruct(source: &str) -> (RuleMap, Vec<ParseWarning>) {
        let (result, warnings) = reconstruct_with(source, ParserConfig::default());
        (result.expect("reconstruct"), warnings)
    }

    #[test]
    fn test_optional_email_chain() {
        let (rules, warnings) = reconstruct("z.object({ email: z.string().email().optional() })");
        let rule = &rules["email"];
        assert_eq!(rule.base_type, BaseType::String);
        assert!(!rule.required);
        assert!(rule.email);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_min_maps_by_base_type() {
        let (rules, _) = reconstruct(
            "z.object({ name: z.string().min(1, 'Required'), age: z.number().min(18).max(120).int() })",
        );
        assert_eq!(rules["name"].min_length, Some(1));
        assert_eq!(rules["name"].messages.get("minLength").map(String::as_str), Some("Required"));
        assert!(rules["name"].required);
        assert_eq!(rules["age"].min, Some(18.0));
        assert_eq!(rules["age"].max, Some(120.0));
        assert!(rules["age"].integer);
    }

    #[test]
    fn test_enum_and_default() {
        let (rules, _) = reconstruct(
            "z.object({ plan: z.enum(['free', 'pro']).default('free'), tags: z.array(z.string()).nonempty() })",
        );
        let plan = &rules["plan"];
        assert_eq!(plan.base_type, BaseType::Enum);
        assert_eq!(plan.enum_values.as_deref(), Some(&["free".to_string(), "pro".to_string()][..]));
        assert!(!plan.required);
        assert_eq!(plan.default_value, Some(Value::String("free".into())));

        let tags = &rules["tags"];
        assert_eq!(tags.base_type, BaseType::Array);
        assert_eq!(tags.min_length, Some(1));
        assert_eq!(tags.element.as_ref().map(|e| e.base_type), Some(BaseType::String));
    }

    #[test]
    fn test_regex_literal_and_constructor() {
        let (rules, _) = reconstruct(
            r#"z.object({ zip: z.string().regex(/^\d{5}$/i, { message: "5 digits" }), code: z.string().regex(new RegExp("^[A-Z]+$")) })"#,
        );
        assert_eq!(rules["zip"].pattern.as_deref(), Some(r"^\d{5}$"));
        assert_eq!(rules["zip"].pattern_flags.as_deref(), Some("i"));
        assert_eq!(rules["zip"].messages.get("pattern").map(String::as_str), Some("5 digits"));
        assert_eq!(rules["code"].pattern.as_deref(), Some("^[A-Z]+$"));
    }

    #[test]
    fn test_coerce_and_aliases() {
        let (rules, _) = reconstruct(
            "z.object({ n: z.coerce.number().positive(), b: z.bigint(), e: z.nativeEnum(Role), u: z.uuid() })",
        );
        assert_eq!(rules["n"].base_type, BaseType::Number);
        assert_eq!(rules["n"].ignored, vec!["positive".to_string()]);
        assert_eq!(rules["b"].base_type, BaseType::Number);
        assert_eq!(rules["e"].base_type, BaseType::Enum);
        assert_eq!(rules["e"].enum_values, None);
        assert!(rules["u"].uuid);
    }

    #[test]
    fn test_unknown_refinement_warns_then_fails_when_strict() {
        let source = "z.object({ pw: z.string().refine((v) => v.length > 3) })";
        let (rules, warnings) = reconstruct(source);
        assert_eq!(rules["pw"].ignored, vec!["refine".to_string()]);
        assert_eq!(warnings[0].kind, WarningKind::IgnoredRefinement);
        assert_eq!(warnings[0].context.field_name.as_deref(), Some("pw"));

        let (result, _) = reconstruct_with(source, ParserConfig::strict());
        assert_eq!(result.map_err(|e| e.kind).err(), Some(ErrorKind::SchemaParseError));
    }

    #[test]
    fn test_incompatible_refinement_is_dropped() {
        let (rules, warnings) = reconstruct("z.object({ ok: z.boolean().email() })");
        assert!(!rules["ok"].email);
        assert_eq!(warnings[0].kind, WarningKind::IncompatibleRefinement);
    }

    #[test]
    fn test_unknown_base_constructor_skips_entry() {
        let (rules, warnings) = reconstruct("z.object({ a: z.wat(), b: z.string() })");
        assert!(!rules.contains_key("a"));
        assert!(rules.contains_key("b"));
        assert_eq!(warnings[0].kind, WarningKind::SchemaRule);
    }

    #[test]
    fn test_nested_object_and_array_shapes() {
        let (rules, _) = reconstruct(
            "z.object({ address: z.object({ city: z.string() }), items: z.array(z.object({ sku: z.string().optional() })) })",
        );
        let city = &rules["address"].shape.as_ref().expect("shape")["city"];
        assert!(city.required);
        let sku = &rules["items"].nested_shape().expect("element shape")["sku"];
        assert!(!sku.required);
    }

    #[test]
    fn test_nesting_beyond_limit() {
        let config = ParserConfig::default().with_max_nesting_depth(1);
        let (ok, _) = reconstruct_with("z.object({ a: z.object({ b: z.string() }) })", config);
        assert!(ok.is_ok());
        let (deep, _) = reconstruct_with(
            "z.object({ a: z.object({ b: z.object({ c: z.string() }) }) })",
            config,
        );
        let err = deep.expect_err("too deep");
        assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
        assert_eq!(err.context.depth, Some(2));
    }

    #[test]
    fn test_bound_schema_and_enum_values() {
        let source = "const roles = ['admin', 'user'];\nconst base = z.string().min(2);\nconst formSchema = z.object({ name: base.max(5), role: z.enum(roles) });\nexport default { schema: formSchema, fields: [] };";
        let normalized = normalize(source).expect("normalize");
        let tokens = SourceTokens::lex(&normalized.candidate);
        let object = tokens.expr().as_object().expect("object");
        let config = ParserConfig::default();
        let mut diag = Diagnostics::new(false);
        let rules = SchemaReconstructor::new(&config, &normalized.bindings)
            .reconstruct(object.value("schema").expect("schema"), &mut diag)
            .expect("reconstruct");
        assert_eq!(rules["name"].min_length, Some(2));
        assert_eq!(rules["name"].max_length, Some(5));
        assert_eq!(
            rules["role"].enum_values,
            Some(vec!["admin".to_string(), "user".to_string()])
        );
    }

    #[test]
    fn test_inline_literal_rule() {
        let config = ParserConfig::default();
        let bindings = Bindings::default();
        let tokens = SourceTokens::lex("{ required: true, minLength: 3, min: 1 }");
        let mut diag = Diagnostics::new(false);
        let rule = SchemaReconstructor::new(&config, &bindings)
            .inline_rule(tokens.expr(), Some(BaseType::String), false, "name", 0, &mut diag)
            .expect("rule")
            .expect("some");
        assert!(rule.required);
        assert_eq!(rule.min_length, Some(3));
        assert_eq!(rule.min, None);
        assert_eq!(diag.warnings()[0].kind, WarningKind::IncompatibleRefinement);
    }

    #[test]
    fn test_non_object_schema_is_a_warning() {
        let (rules, warnings) = reconstruct("z.string()");
        assert!(rules.is_empty());
        assert_eq!(warnings[0].kind, WarningKind::SchemaRule);
    }
}
