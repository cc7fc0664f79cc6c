//! Source normalizer
//!
//! Strips markdown fences and prose around AI output and isolates the one
//! object literal that describes the form. Also records `const|let|var`
//! bindings so that `schema: formSchema` style references can be followed
//! later without running anything.

use crate::extract::{find_matching, ExtractError, SourceTokens};
use crate::lexer::{Token, TokenKind};
use formedible_core::{ErrorContext, FormParseError, FormResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Alias chains (`const a = b; const b = {...}`) longer than this are not
/// followed.
pub const MAX_BINDING_HOPS: usize = 8;

/// How many `{` positions an unfenced scan tries before giving up.
const MAX_UNFENCED_ATTEMPTS: usize = 64;

/// Longest snippet attached to normalizer errors.
const SNIPPET_LEN: usize = 80;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]{0,3}(`{3,}|~{3,})[ \t]*([^\s`]*)").expect("fence regex is valid")
});

const CODE_TAGS: &[&str] = &[
    "", "js", "javascript", "jsx", "mjs", "cjs", "ts", "typescript", "tsx", "json", "json5",
    "jsonc",
];

const STATEMENT_KEYWORDS: &[&str] = &[
    "const", "let", "var", "export", "function", "import", "class", "interface", "type",
    "return", "if", "for", "while",
];

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Where the candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// A fence tagged `formedible`.
    FormedibleFence,
    /// Another JavaScript-family or untagged fence.
    Fence { tag: String },
    /// No usable fence; found by brace scanning.
    Unfenced,
}

/// Text bound to a name by a `const|let|var` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub text: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    map: BTreeMap<String, Binding>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.map.get(name)
    }

    /// Follow alias chains to the first binding whose text is not itself a
    /// bound name. `None` if unbound, cyclic, or too long.
    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        let mut current = self.map.get(name)?;
        for _ in 0..MAX_BINDING_HOPS {
            let alias = current.text.trim();
            if !is_identifier(alias) {
                return Some(current);
            }
            match self.map.get(alias) {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    fn insert_first(&mut self, name: &str, binding: Binding) {
        self.map.entry(name.to_string()).or_insert(binding);
    }
}

/// The isolated object literal plus what is needed to report positions in the
/// original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    pub candidate: String,
    /// 1-based position of the candidate's `{` in the original input.
    pub line: usize,
    pub column: usize,
    pub origin: SourceOrigin,
    pub bindings: Bindings,
}

// ============================================================================
// FENCES
// ============================================================================

#[derive(Debug, Clone)]
struct FencedBlock<'a> {
    tag: String,
    content: &'a str,
    /// 1-based line of the first content line.
    line: usize,
}

fn scan_fences(input: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    // (marker char, marker len, tag, content start offset, content line)
    let mut open: Option<(char, usize, String, usize, usize)> = None;
    let mut offset = 0;

    for (idx, line) in input.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let next_offset = offset + line.len();

        match &open {
            Some((marker, len, tag, start, content_line)) => {
                if is_fence_close(line, *marker, *len) {
                    blocks.push(FencedBlock {
                        tag: tag.clone(),
                        content: &input[*start..offset],
                        line: *content_line,
                    });
                    open = None;
                }
            }
            None => {
                if let Some(caps) = FENCE_OPEN.captures(line) {
                    let fence = caps.get(1).map(|m| m.as_str()).unwrap_or("```");
                    let marker = fence.chars().next().unwrap_or('`');
                    let tag = caps
                        .get(2)
                        .map(|m| normalize_tag(m.as_str()))
                        .unwrap_or_default();
                    open = Some((marker, fence.len(), tag, next_offset, line_no + 1));
                }
            }
        }

        offset = next_offset;
    }

    // Truncated output: an unterminated fence runs to the end of input.
    if let Some((_, _, tag, start, content_line)) = open {
        blocks.push(FencedBlock {
            tag,
            content: &input[start..],
            line: content_line,
        });
    }

    blocks
}

fn is_fence_close(line: &str, marker: char, len: usize) -> bool {
    let trimmed = line.trim();
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    run >= len && trimmed.chars().skip(run).all(char::is_whitespace)
}

fn normalize_tag(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_code_tag(tag: &str) -> bool {
    CODE_TAGS.contains(&tag)
}

// ============================================================================
// NORMALIZE
// ============================================================================

/// Isolate the form's object literal in arbitrary text.
pub fn normalize(input: &str) -> FormResult<NormalizedSource> {
    if input.trim().is_empty() {
        return Err(FormParseError::no_code_found("input is empty"));
    }

    let blocks = scan_fences(input);
    let chosen = blocks
        .iter()
        .find(|b| b.tag == "formedible")
        .map(|b| (b, SourceOrigin::FormedibleFence))
        .or_else(|| {
            blocks
                .iter()
                .find(|b| is_code_tag(&b.tag) && b.content.contains('{'))
                .map(|b| {
                    (
                        b,
                        SourceOrigin::Fence {
                            tag: b.tag.clone(),
                        },
                    )
                })
        });

    let normalized = match chosen {
        Some((block, origin)) => normalize_block(block, origin)?,
        None => normalize_unfenced(input)?,
    };

    tracing::debug!(
        origin = ?normalized.origin,
        line = normalized.line,
        column = normalized.column,
        candidate_len = normalized.candidate.len(),
        bindings = normalized.bindings.len(),
        "isolated candidate object literal"
    );
    Ok(normalized)
}

fn normalize_block(block: &FencedBlock<'_>, origin: SourceOrigin) -> FormResult<NormalizedSource> {
    let tokens = SourceTokens::lex_at(block.content, block.line, 1);
    let toks = tokens.tokens();
    let bindings = collect_bindings(block.content, toks);

    let choice = match choose_object(toks) {
        Some(choice) => choice,
        None => {
            return Err(FormParseError::no_code_found(format!(
                "the `{}` code block contains no object literal",
                if block.tag.is_empty() { "untagged" } else { block.tag.as_str() }
            ))
            .with_context(ErrorContext::default().with_position(block.line, 1)))
        }
    };

    let close = find_matching(toks, choice.index)
        .map_err(|err| malformed(err, block.content, toks[choice.index].span.start))?;
    let open_span = toks[choice.index].span;
    let candidate = block.content[open_span.start..toks[close].span.end].to_string();

    Ok(NormalizedSource {
        candidate,
        line: open_span.line,
        column: open_span.column,
        origin,
        bindings,
    })
}

fn normalize_unfenced(input: &str) -> FormResult<NormalizedSource> {
    let whole = SourceTokens::lex(input);
    let bindings = collect_bindings(input, whole.tokens());

    let mut search_from = 0;
    let mut first_balanced: Option<NormalizedSource> = None;

    for _ in 0..MAX_UNFENCED_ATTEMPTS {
        let start = match input[search_from..].find('{') {
            Some(rel) => search_from + rel,
            None => break,
        };
        let (line, column) = line_col(input, start);
        let tokens = SourceTokens::lex_at(&input[start..], line, column);
        let toks = tokens.tokens();

        let close = match find_matching(toks, 0) {
            Ok(close) => close,
            Err(err) => match first_balanced {
                Some(found) => return Ok(found),
                None => return Err(malformed(err, &input[start..], 0)),
            },
        };

        let scope = &toks[..=close];
        if let Some(choice) = choose_object(scope).filter(|c| c.qualifies) {
            let inner_close = find_matching(scope, choice.index)
                .map_err(|err| malformed(err, &input[start..], 0))?;
            let open_span = scope[choice.index].span;
            return Ok(NormalizedSource {
                candidate: input[start + open_span.start..start + scope[inner_close].span.end]
                    .to_string(),
                line: open_span.line,
                column: open_span.column,
                origin: SourceOrigin::Unfenced,
                bindings,
            });
        }

        if first_balanced.is_none() {
            first_balanced = Some(NormalizedSource {
                candidate: input[start..start + toks[close].span.end].to_string(),
                line,
                column,
                origin: SourceOrigin::Unfenced,
                bindings: bindings.clone(),
            });
        }
        search_from = start + toks[close].span.end;
    }

    first_balanced.ok_or_else(|| {
        FormParseError::no_code_found("no code block or object literal found in the input")
    })
}

fn malformed(err: ExtractError, text: &str, from: usize) -> FormParseError {
    let span = err.span();
    let snippet: String = text.get(from..).unwrap_or("").chars().take(SNIPPET_LEN).collect();
    FormParseError::malformed(err.to_string()).with_context(
        ErrorContext::default()
            .with_position(span.line, span.column)
            .with_snippet(snippet),
    )
}

fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

// ============================================================================
// CANDIDATE SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Choice {
    index: usize,
    /// The object has a top-level `fields` or `schema` key.
    qualifies: bool,
}

/// Pick the object literal to parse: the first (hence outermost) balanced
/// object with a `fields`/`schema` key, else the first statement-level `{`,
/// else the first `{`.
fn choose_object(tokens: &[Token]) -> Option<Choice> {
    let pairs = pair_delimiters(tokens);
    let mut depth = 0usize;
    let mut first_statement_level = None;
    let mut first_any = None;

    for (i, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::LBrace {
            if first_any.is_none() {
                first_any = Some(i);
            }
            if depth == 0 && first_statement_level.is_none() {
                first_statement_level = Some(i);
            }
            if let Some(close) = pairs[i] {
                if has_form_key(tokens, &pairs, i, close) {
                    return Some(Choice {
                        index: i,
                        qualifies: true,
                    });
                }
            }
        }
        if token.kind.is_open() {
            depth += 1;
        } else if token.kind.is_close() {
            depth = depth.saturating_sub(1);
        }
    }

    first_statement_level.or(first_any).map(|index| Choice {
        index,
        qualifies: false,
    })
}

/// Match every delimiter in one pass; unmatched ones stay `None`.
fn pair_delimiters(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut pairs = vec![None; tokens.len()];
    let mut stack: Vec<usize> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.kind.is_open() {
            stack.push(i);
        } else if token.kind.is_close() {
            if let Some(top) = stack.pop() {
                if tokens[top].kind.closer().as_ref() == Some(&token.kind) {
                    pairs[top] = Some(i);
                    pairs[i] = Some(top);
                }
            }
        }
    }
    pairs
}

/// Whether the object `open..close` has a direct `fields` or `schema` key.
fn has_form_key(tokens: &[Token], pairs: &[Option<usize>], open: usize, close: usize) -> bool {
    let mut i = open + 1;
    let mut entry_start = true;
    while i < close {
        let token = &tokens[i];
        if entry_start {
            entry_start = false;
            let key = match &token.kind {
                TokenKind::Identifier(name) | TokenKind::String(name) => Some(name.as_str()),
                _ => None,
            };
            let follows_key = matches!(
                tokens.get(i + 1).map(|t| &t.kind),
                Some(TokenKind::Colon) | Some(TokenKind::Comma) | Some(TokenKind::RBrace)
            );
            if follows_key && matches!(key, Some("fields") | Some("schema")) {
                return true;
            }
        }
        if token.kind.is_open() {
            match pairs[i] {
                Some(end) => {
                    i = end + 1;
                    continue;
                }
                None => return false,
            }
        }
        if token.kind == TokenKind::Comma {
            entry_start = true;
        }
        i += 1;
    }
    false
}

// ============================================================================
// BINDINGS
// ============================================================================

/// Record `const|let|var NAME = expr` declarations at any depth. The first
/// declaration of a name wins.
fn collect_bindings(source: &str, tokens: &[Token]) -> Bindings {
    let mut bindings = Bindings::default();
    for (i, token) in tokens.iter().enumerate() {
        let is_declaration = matches!(&token.kind, TokenKind::Identifier(w) if w == "const" || w == "let" || w == "var");
        if !is_declaration {
            continue;
        }
        let name = match tokens.get(i + 1).map(|t| &t.kind) {
            Some(TokenKind::Identifier(name)) => name,
            _ => continue,
        };
        if let Some((start, end)) = binding_extent(tokens, i + 2) {
            let first = &tokens[start];
            if let Some(text) = source.get(first.span.start..tokens[end].span.end) {
                bindings.insert_first(
                    name,
                    Binding {
                        text: text.to_string(),
                        line: first.span.line,
                        column: first.span.column,
                    },
                );
            }
        }
    }
    bindings
}

/// Token range of the initializer that starts at `i` (at an optional type
/// annotation or the `=`).
fn binding_extent(tokens: &[Token], mut i: usize) -> Option<(usize, usize)> {
    if tokens.get(i).map(|t| &t.kind) == Some(&TokenKind::Colon) {
        let mut depth = 0usize;
        loop {
            let kind = &tokens.get(i)?.kind;
            match kind {
                TokenKind::Operator(op) if op == "=" && depth == 0 => break,
                TokenKind::Semicolon | TokenKind::Eof if depth == 0 => return None,
                k if k.is_open() => depth += 1,
                k if k.is_close() => {
                    if depth == 0 {
                        return None;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            i += 1;
        }
    }

    match tokens.get(i).map(|t| &t.kind) {
        Some(TokenKind::Operator(op)) if op == "=" => i += 1,
        _ => return None,
    }

    let start = i;
    let mut depth = 0usize;
    let mut end = None;
    while let Some(token) = tokens.get(i) {
        match &token.kind {
            TokenKind::Eof => break,
            k if k.is_open() => depth += 1,
            k if k.is_close() => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            TokenKind::Semicolon | TokenKind::Comma if depth == 0 => break,
            TokenKind::Identifier(word)
                if depth == 0
                    && i > start
                    && STATEMENT_KEYWORDS.contains(&word.as_str())
                    && tokens[i - 1].kind != TokenKind::Dot =>
            {
                break
            }
            _ => {}
        }
        end = Some(i);
        i += 1;
    }
    end.map(|end| (start, end))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::ErrorKind;

    #[test]
    fn test_prefers_formedible_fence() {
        let input = "Here you go:\n```js\nconst x = { a: 1 };\n```\n\n```formedible\n{ fields: [] }\n```\n";
        let normalized = normalize(input).expect("normalize");
        assert_eq!(normalized.origin, SourceOrigin::FormedibleFence);
        assert_eq!(normalized.candidate, "{ fields: [] }");
        assert_eq!(normalized.line, 7);
    }

    #[test]
    fn test_skips_non_code_fences() {
        let input = "```bash\necho {}\n```\n```ts\nexport default { fields: [] } satisfies Config\n```";
        let normalized = normalize(input).expect("normalize");
        assert_eq!(
            normalized.origin,
            SourceOrigin::Fence {
                tag: "ts".to_string()
            }
        );
        assert_eq!(normalized.candidate, "{ fields: [] }");
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let input = "```formedible\n{ fields: [ { name: 'a', type: 'text' } ] }";
        let normalized = normalize(input).expect("normalize");
        assert!(normalized.candidate.starts_with("{ fields"));
    }

    #[test]
    fn test_truncated_object_is_malformed() {
        let input = "```formedible\n{ fields: [ { name: 'a'";
        let err = normalize(input).expect_err("truncated");
        assert_eq!(err.kind, ErrorKind::MalformedObjectLiteral);
        assert!(err.context.line.is_some());
    }

    #[test]
    fn test_outermost_qualifying_object_wins() {
        let input = "```tsx\nconst schema = z.object({ name: z.string() });\nexport function F() {\n  return useFormedible({ schema, fields: [{ name: 'name', type: 'text' }] });\n}\n```";
        let normalized = normalize(input).expect("normalize");
        assert!(normalized.candidate.starts_with("{ schema, fields"));
        assert_eq!(
            normalized.bindings.get("schema").map(|b| b.text.as_str()),
            Some("z.object({ name: z.string() })")
        );
    }

    #[test]
    fn test_unfenced_prose_with_braces_in_strings() {
        let input = "Sure! Here's the form: { title: 'Use {curly}', fields: [] } Let me know.";
        let normalized = normalize(input).expect("normalize");
        assert_eq!(normalized.candidate, "{ title: 'Use {curly}', fields: [] }");
        assert_eq!(normalized.origin, SourceOrigin::Unfenced);
        assert_eq!(normalized.column, 24);
    }

    #[test]
    fn test_unfenced_skips_leading_non_form_object() {
        let input = "Options like {a: 1} are allowed.\n{ \"fields\": [] }";
        let normalized = normalize(input).expect("normalize");
        assert_eq!(normalized.candidate, "{ \"fields\": [] }");
        assert_eq!(normalized.line, 2);
    }

    #[test]
    fn test_no_code_found() {
        for input in ["", "   ", "just some prose without any code"] {
            let err = normalize(input).expect_err("no code");
            assert_eq!(err.kind, ErrorKind::NoCodeFound);
        }
    }

    #[test]
    fn test_alias_bindings_resolve() {
        let input = "```js\nconst base = { a: 1 };\nconst alias = base;\nconst loop1 = loop2;\nconst loop2 = loop1;\nexport default { fields: [] };\n```";
        let normalized = normalize(input).expect("normalize");
        let resolved = normalized.bindings.resolve("alias").map(|b| b.text.as_str());
        assert_eq!(resolved, Some("{ a: 1 }"));
        assert!(normalized.bindings.resolve("loop1").is_none());
    }

    #[test]
    fn test_typed_binding() {
        let input = "```ts\nconst fields: FieldConfig[] = [{ name: 'a', type: 'text' }];\nexport default { fields };\n```";
        let normalized = normalize(input).expect("normalize");
        assert_eq!(
            normalized.bindings.get("fields").map(|b| b.text.as_str()),
            Some("[{ name: 'a', type: 'text' }]")
        );
    }
}
