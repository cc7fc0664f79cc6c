//! Object-literal extraction over a token stream
//!
//! Nothing here evaluates code. An [`Expr`] is a view over a run of tokens;
//! later stages decide what the run means.

use crate::lexer::{Lexer, Span, Token, TokenKind};
use formedible_core::HARD_MAX_NESTING_DEPTH;
use serde_json::{Map, Number, Value};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("Lexer error: {message}")]
    Lex { message: String, span: Span },

    #[error("Unclosed {open}: no matching {close}")]
    Unclosed {
        open: TokenKind,
        close: TokenKind,
        span: Span,
    },

    #[error("Mismatched {found}, expected {expected}")]
    Mismatched {
        expected: TokenKind,
        found: TokenKind,
        span: Span,
    },

    #[error("Expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        span: Span,
    },

    #[error("Missing value for key '{key}'")]
    MissingValue { key: String, span: Span },

    #[error("Empty element in list")]
    EmptyElement { span: Span },
}

impl ExtractError {
    pub fn span(&self) -> Span {
        match self {
            ExtractError::Lex { span, .. }
            | ExtractError::Unclosed { span, .. }
            | ExtractError::Mismatched { span, .. }
            | ExtractError::Unexpected { span, .. }
            | ExtractError::MissingValue { span, .. }
            | ExtractError::EmptyElement { span } => *span,
        }
    }
}

// ============================================================================
// TOKEN BUFFER
// ============================================================================

/// Owned token list for a piece of source text.
#[derive(Debug, Clone)]
pub struct SourceTokens<'s> {
    source: &'s str,
    tokens: Vec<Token>,
}

impl<'s> SourceTokens<'s> {
    pub fn lex(source: &'s str) -> Self {
        Self::lex_at(source, 1, 1)
    }

    /// Lex text whose first character sits at `line`/`column` of the
    /// original input.
    pub fn lex_at(source: &'s str, line: usize, column: usize) -> Self {
        let tokens = Lexer::with_position(source, line, column).tokenize();
        Self { source, tokens }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    /// All tokens, including the trailing `Eof`.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The whole text as one expression, without `Eof`.
    pub fn expr(&self) -> Expr<'_> {
        let end = self.tokens.len().saturating_sub(1);
        Expr::new(self.source, &self.tokens[..end])
    }

    pub fn first_error(&self) -> Option<ExtractError> {
        self.tokens.iter().find_map(|t| match &t.kind {
            TokenKind::Error(msg) => Some(ExtractError::Lex {
                message: msg.clone(),
                span: t.span,
            }),
            _ => None,
        })
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// An opaque sub-expression: a slice of tokens plus the text they came from.
#[derive(Debug, Clone, Copy)]
pub struct Expr<'a> {
    source: &'a str,
    tokens: &'a [Token],
}

impl<'a> Expr<'a> {
    pub fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self { source, tokens }
    }

    pub fn tokens(&self) -> &'a [Token] {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn first(&self) -> Option<&'a Token> {
        self.tokens.first()
    }

    /// Position of the first token.
    pub fn span(&self) -> Span {
        self.tokens.first().map(|t| t.span).unwrap_or_default()
    }

    /// The exact source text covered by the expression.
    pub fn text(&self) -> &'a str {
        match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => self
                .source
                .get(first.span.start..last.span.end)
                .unwrap_or(""),
            _ => "",
        }
    }

    pub fn slice(&self, start: usize, end: usize) -> Expr<'a> {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        Expr::new(self.source, &self.tokens[start..end])
    }

    fn single(&self) -> Option<&'a TokenKind> {
        match self.tokens {
            [token] => Some(&token.kind),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&'a str> {
        match self.single() {
            Some(TokenKind::Identifier(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// A quoted string, or a template literal without substitutions.
    pub fn as_string(&self) -> Option<String> {
        match self.without_type_assertion().single() {
            Some(TokenKind::String(s)) => Some(s.clone()),
            Some(TokenKind::Template {
                text,
                substitutions: false,
            }) => Some(text.clone()),
            _ => None,
        }
    }

    /// A numeric literal with an optional sign.
    pub fn as_number(&self) -> Option<f64> {
        match self.without_type_assertion().tokens {
            [t] => match t.kind {
                TokenKind::Number(n) => Some(n),
                _ => None,
            },
            [sign, t] => match (&sign.kind, &t.kind) {
                (TokenKind::Operator(op), TokenKind::Number(n)) if op == "-" => Some(-n),
                (TokenKind::Operator(op), TokenKind::Number(n)) if op == "+" => Some(*n),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.single() {
            Some(TokenKind::True) => Some(true),
            Some(TokenKind::False) => Some(false),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<(&'a str, &'a str)> {
        match self.single() {
            Some(TokenKind::Regex { pattern, flags }) => Some((pattern.as_str(), flags.as_str())),
            _ => None,
        }
    }

    pub fn starts_with(&self, kind: &TokenKind) -> bool {
        self.tokens
            .first()
            .map(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    /// Whether the expression is exactly one delimited group opened by its
    /// first token.
    fn is_group(&self, open: &TokenKind) -> bool {
        self.starts_with(open)
            && find_matching(self.tokens, 0)
                .map(|close| close + 1 == self.tokens.len())
                .unwrap_or(false)
    }

    pub fn is_object(&self) -> bool {
        self.without_type_assertion().is_group(&TokenKind::LBrace)
    }

    pub fn is_array(&self) -> bool {
        self.without_type_assertion().is_group(&TokenKind::LBracket)
    }

    /// Drop a trailing TypeScript `as ...` / `satisfies ...` suffix.
    pub fn without_type_assertion(&self) -> Expr<'a> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate() {
            match &token.kind {
                k if k.is_open() => depth += 1,
                k if k.is_close() => depth = depth.saturating_sub(1),
                TokenKind::Identifier(word)
                    if depth == 0
                        && i > 0
                        && (word == "as" || word == "satisfies")
                        && self.tokens[i - 1].kind != TokenKind::Dot =>
                {
                    return self.slice(0, i);
                }
                _ => {}
            }
        }
        *self
    }

    /// Verify that every delimiter in the expression is balanced.
    pub fn check_balanced(&self) -> Result<(), ExtractError> {
        let mut i = 0;
        while i < self.tokens.len() {
            let kind = &self.tokens[i].kind;
            if let TokenKind::Error(message) = kind {
                return Err(ExtractError::Lex {
                    message: message.clone(),
                    span: self.tokens[i].span,
                });
            }
            if kind.is_close() {
                return Err(unexpected("balanced delimiters", &self.tokens[i]));
            }
            if kind.is_open() {
                i = find_matching(self.tokens, i)?;
            }
            i += 1;
        }
        Ok(())
    }

    pub fn as_object(&self) -> Result<ObjectLiteral<'a>, ExtractError> {
        let expr = self.without_type_assertion();
        let body = expr.group_body(TokenKind::LBrace, "object literal")?;
        parse_object_body(body, expr.span())
    }

    pub fn as_array(&self) -> Result<ArrayLiteral<'a>, ExtractError> {
        let expr = self.without_type_assertion();
        let body = expr.group_body(TokenKind::LBracket, "array literal")?;
        let mut elements = Vec::new();
        let mut spreads = Vec::new();
        for item in split_list(body)? {
            match item {
                ListItem::Element(e) => elements.push(e),
                ListItem::Spread(e) => spreads.push(e),
            }
        }
        Ok(ArrayLiteral {
            elements,
            spreads,
            span: expr.span(),
        })
    }

    /// Tokens strictly between the opening delimiter at position 0 and its
    /// match, which must be the last token.
    pub fn group_body(&self, open: TokenKind, expected: &'static str) -> Result<Expr<'a>, ExtractError> {
        let first = match self.tokens.first() {
            Some(first) => first,
            None => {
                return Err(ExtractError::Unexpected {
                    expected,
                    found: "nothing".to_string(),
                    span: Span::default(),
                })
            }
        };
        if std::mem::discriminant(&first.kind) != std::mem::discriminant(&open) {
            return Err(unexpected(expected, first));
        }
        let close = find_matching(self.tokens, 0)?;
        if close + 1 != self.tokens.len() {
            return Err(unexpected("end of expression", &self.tokens[close + 1]));
        }
        Ok(self.slice(1, close))
    }

    /// Convert a literal expression (strings, numbers, booleans, null, and
    /// arrays/objects of those) into JSON. `None` for anything else.
    pub fn to_literal(&self) -> Option<Value> {
        literal_value(*self, 0)
    }
}

fn literal_value(expr: Expr<'_>, depth: usize) -> Option<Value> {
    if depth > HARD_MAX_NESTING_DEPTH {
        return None;
    }
    let expr = expr.without_type_assertion();
    if let Some(s) = expr.as_string() {
        return Some(Value::String(s));
    }
    if let Some(n) = expr.as_number() {
        return number_value(n);
    }
    match expr.single() {
        Some(TokenKind::True) => return Some(Value::Bool(true)),
        Some(TokenKind::False) => return Some(Value::Bool(false)),
        Some(TokenKind::Null) | Some(TokenKind::Undefined) => return Some(Value::Null),
        _ => {}
    }
    if expr.is_group(&TokenKind::LBracket) {
        let array = expr.as_array().ok()?;
        if !array.spreads.is_empty() {
            return None;
        }
        let mut values = Vec::with_capacity(array.elements.len());
        for element in array.elements {
            values.push(literal_value(element, depth + 1)?);
        }
        return Some(Value::Array(values));
    }
    if expr.is_group(&TokenKind::LBrace) {
        let object = expr.as_object().ok()?;
        if !object.skipped.is_empty() {
            return None;
        }
        let mut map = Map::new();
        for entry in object.entries {
            if entry.kind != EntryKind::Property {
                return None;
            }
            map.insert(entry.key, literal_value(entry.value, depth + 1)?);
        }
        return Some(Value::Object(map));
    }
    None
}

/// JSON number for a parsed literal; whole numbers stay integers.
pub fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Some(Value::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

// ============================================================================
// OBJECT / ARRAY LITERALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `key: value`
    Property,
    /// `{ key }`, whose value is the identifier `key`.
    Shorthand,
    /// `key() { ... }`, kept opaque.
    Method,
}

#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub key: String,
    pub key_span: Span,
    pub value: Expr<'a>,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkippedKind {
    Spread,
    ComputedKey,
}

/// An entry the extractor cannot name statically.
#[derive(Debug, Clone)]
pub struct Skipped<'a> {
    pub kind: SkippedKind,
    pub expr: Expr<'a>,
}

/// Top-level properties of an object literal in source order.
#[derive(Debug, Clone)]
pub struct ObjectLiteral<'a> {
    pub entries: Vec<Entry<'a>>,
    pub skipped: Vec<Skipped<'a>>,
    pub span: Span,
}

impl<'a> ObjectLiteral<'a> {
    /// Later duplicates win, as in JavaScript.
    pub fn get(&self, key: &str) -> Option<&Entry<'a>> {
        self.entries.iter().rev().find(|e| e.key == key)
    }

    pub fn value(&self, key: &str) -> Option<Expr<'a>> {
        self.get(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ArrayLiteral<'a> {
    pub elements: Vec<Expr<'a>>,
    pub spreads: Vec<Expr<'a>>,
    pub span: Span,
}

enum ListItem<'a> {
    Element(Expr<'a>),
    Spread(Expr<'a>),
}

/// Split a list body on depth-0 commas. One trailing comma is allowed.
fn split_list(body: Expr<'_>) -> Result<Vec<ListItem<'_>>, ExtractError> {
    let segments = split_top_level(body);
    let count = segments.len();
    let mut items = Vec::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if segment.is_empty() {
            if i + 1 == count && (count > 1 || body.is_empty()) {
                continue;
            }
            return Err(ExtractError::EmptyElement {
                span: segment_span(body, segment),
            });
        }
        if segment.starts_with(&TokenKind::Spread) {
            items.push(ListItem::Spread(segment.slice(1, segment.len())));
        } else {
            items.push(ListItem::Element(segment));
        }
    }
    Ok(items)
}

fn segment_span(body: Expr<'_>, segment: Expr<'_>) -> Span {
    if segment.is_empty() {
        body.span()
    } else {
        segment.span()
    }
}

fn parse_object_body(body: Expr<'_>, span: Span) -> Result<ObjectLiteral<'_>, ExtractError> {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    let segments = split_top_level(body);
    let count = segments.len();

    for (i, segment) in segments.into_iter().enumerate() {
        if segment.is_empty() {
            if i + 1 == count && (count > 1 || body.is_empty()) {
                continue;
            }
            return Err(ExtractError::EmptyElement {
                span: segment_span(body, segment),
            });
        }

        let tokens = segment.tokens();
        if tokens[0].kind == TokenKind::Spread {
            skipped.push(Skipped {
                kind: SkippedKind::Spread,
                expr: segment,
            });
            continue;
        }
        if tokens[0].kind == TokenKind::LBracket {
            find_matching(tokens, 0)?;
            skipped.push(Skipped {
                kind: SkippedKind::ComputedKey,
                expr: segment,
            });
            continue;
        }

        let mut key_idx = 0;
        let is_modifier = matches!(&tokens[0].kind, TokenKind::Identifier(w) if w == "get" || w == "set" || w == "async")
            || matches!(&tokens[0].kind, TokenKind::Operator(op) if op == "*");
        if is_modifier && tokens.len() > 1 && key_text(&tokens[1].kind).is_some() {
            key_idx = 1;
        }

        let key_token = &tokens[key_idx];
        let key = match key_text(&key_token.kind) {
            Some(key) => key,
            None => return Err(unexpected("property key", key_token)),
        };

        match tokens.get(key_idx + 1).map(|t| &t.kind) {
            None => {
                if !matches!(key_token.kind, TokenKind::Identifier(_)) {
                    return Err(ExtractError::MissingValue {
                        key,
                        span: key_token.span,
                    });
                }
                entries.push(Entry {
                    key,
                    key_span: key_token.span,
                    value: segment.slice(key_idx, key_idx + 1),
                    kind: EntryKind::Shorthand,
                });
            }
            Some(TokenKind::Colon) => {
                let value = segment.slice(key_idx + 2, segment.len());
                if value.is_empty() {
                    return Err(ExtractError::MissingValue {
                        key,
                        span: key_token.span,
                    });
                }
                entries.push(Entry {
                    key,
                    key_span: key_token.span,
                    value,
                    kind: EntryKind::Property,
                });
            }
            Some(TokenKind::LParen) => {
                entries.push(Entry {
                    key,
                    key_span: key_token.span,
                    value: segment.slice(key_idx + 1, segment.len()),
                    kind: EntryKind::Method,
                });
            }
            Some(_) => return Err(unexpected("':' after property key", &tokens[key_idx + 1])),
        }
    }

    Ok(ObjectLiteral {
        entries,
        skipped,
        span,
    })
}

fn key_text(kind: &TokenKind) -> Option<String> {
    match kind {
        TokenKind::Identifier(name) => Some(name.clone()),
        TokenKind::String(s) => Some(s.clone()),
        TokenKind::Template {
            text,
            substitutions: false,
        } => Some(text.clone()),
        TokenKind::Number(n) => Some(number_key(*n)),
        TokenKind::True => Some("true".to_string()),
        TokenKind::False => Some("false".to_string()),
        TokenKind::Null => Some("null".to_string()),
        TokenKind::Undefined => Some("undefined".to_string()),
        _ => None,
    }
}

fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ============================================================================
// BRACKET MATCHING
// ============================================================================

/// Index of the delimiter closing the one at `open`. Lexer error tokens inside
/// the group are reported as errors.
pub fn find_matching(tokens: &[Token], open: usize) -> Result<usize, ExtractError> {
    let first = match tokens.get(open) {
        Some(first) if first.kind.is_open() => first,
        Some(other) => return Err(unexpected("opening delimiter", other)),
        None => {
            return Err(ExtractError::Unexpected {
                expected: "opening delimiter",
                found: "end of input".to_string(),
                span: tokens.last().map(|t| t.span).unwrap_or_default(),
            })
        }
    };

    let mut stack: Vec<usize> = Vec::new();
    for (i, token) in tokens.iter().enumerate().skip(open) {
        let kind = &token.kind;
        if kind.is_open() {
            stack.push(i);
        } else if kind.is_close() {
            let top = match stack.pop() {
                Some(top) => top,
                None => return Err(unexpected("opening delimiter", token)),
            };
            let expected = tokens[top].kind.closer().unwrap_or(TokenKind::Eof);
            if &expected != kind {
                return Err(ExtractError::Mismatched {
                    expected,
                    found: kind.clone(),
                    span: token.span,
                });
            }
            if stack.is_empty() {
                return Ok(i);
            }
        } else if let TokenKind::Error(message) = kind {
            return Err(ExtractError::Lex {
                message: message.clone(),
                span: token.span,
            });
        }
    }

    let unclosed = stack.first().map(|&i| &tokens[i]).unwrap_or(first);
    Err(ExtractError::Unclosed {
        open: unclosed.kind.clone(),
        close: unclosed.kind.closer().unwrap_or(TokenKind::Eof),
        span: unclosed.span,
    })
}

/// Split on commas that are not nested inside any delimiter.
pub fn split_top_level(expr: Expr<'_>) -> Vec<Expr<'_>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in expr.tokens().iter().enumerate() {
        match &token.kind {
            k if k.is_open() => depth += 1,
            k if k.is_close() => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                parts.push(expr.slice(start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(expr.slice(start, expr.len()));
    parts
}

fn unexpected(expected: &'static str, token: &Token) -> ExtractError {
    ExtractError::Unexpected {
        expected,
        found: token.kind.to_string(),
        span: token.span,
    }
}

// ============================================================================
// CURSOR
// ============================================================================

/// Sequential reader over an expression, for call-chain parsing.
pub struct Cursor<'a> {
    expr: Expr<'a>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(expr: Expr<'a>) -> Self {
        Self { expr, pos: 0 }
    }

    pub fn current(&self) -> Option<&'a Token> {
        self.expr.tokens().get(self.pos)
    }

    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.expr.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn check(&self, kind: &TokenKind) -> bool {
        self.current()
            .map(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    pub fn expect_identifier(&mut self) -> Result<&'a str, ExtractError> {
        match self.current().map(|t| &t.kind) {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Ok(name.as_str())
            }
            _ => Err(self.error("identifier")),
        }
    }

    /// Consume a delimited group at the cursor and return its body.
    pub fn take_group(&mut self) -> Result<Expr<'a>, ExtractError> {
        let close = find_matching(self.expr.tokens(), self.pos)?;
        let body = self.expr.slice(self.pos + 1, close);
        self.pos = close + 1;
        Ok(body)
    }

    /// Everything from the cursor on.
    pub fn rest(&self) -> Expr<'a> {
        self.expr.slice(self.pos, self.expr.len())
    }

    pub fn error(&self, expected: &'static str) -> ExtractError {
        match self.current() {
            Some(token) => unexpected(expected, token),
            None => ExtractError::Unexpected {
                expected,
                found: "end of expression".to_string(),
                span: self.expr.tokens().last().map(|t| t.span).unwrap_or_default(),
            },
        }
    }
}

/// Split a call's argument list body into argument expressions.
pub fn split_arguments(body: Expr<'_>) -> Result<Vec<Expr<'_>>, ExtractError> {
    let mut args = Vec::new();
    for item in split_list(body)? {
        match item {
            ListItem::Element(e) | ListItem::Spread(e) => args.push(e),
        }
    }
    Ok(args)
}
