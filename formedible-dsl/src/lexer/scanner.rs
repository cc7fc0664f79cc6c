//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Template literals nested inside `${}` deeper than this are rejected.
const MAX_TEMPLATE_NESTING: usize = 32;

// ============================================================================
// LEXER IMPLEMENTATION
// ============================================================================

/// Lexer for JavaScript object-literal source.
///
/// Never panics on any input; the returned token list always ends with
/// [`TokenKind::Eof`]. Malformed constructs become [`TokenKind::Error`] tokens
/// and scanning resumes after them.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    /// Whether a `/` at this point starts a regular expression literal.
    regex_allowed: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self::with_position(source, 1, 1)
    }

    /// Create a lexer whose line/column numbering starts at the given
    /// position, for text cut out of a larger document.
    pub fn with_position(source: &'a str, line: usize, column: usize) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: line.max(1),
            column: column.max(1),
            pos: 0,
            regex_allowed: true,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the source.
    pub fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_whitespace_and_comments() {
            return error;
        }

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ':' => self.single(TokenKind::Colon),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),

                '.' => {
                    if self.peek_next_char() == Some('.') && self.peek_nth_char(2) == Some('.') {
                        self.advance();
                        self.advance();
                        self.advance();
                        TokenKind::Spread
                    } else if self.peek_next_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        self.scan_number()
                    } else {
                        self.single(TokenKind::Dot)
                    }
                }

                '"' | '\'' => self.scan_string(c),
                '`' => self.scan_template(0),

                '/' if self.regex_allowed => self.scan_regex(),

                '=' if self.peek_next_char() == Some('>') => {
                    self.advance();
                    self.advance();
                    TokenKind::Arrow
                }

                c if is_operator_char(c) => self.scan_operator(),

                c if c.is_ascii_digit() => self.scan_number(),

                c if is_identifier_start(c) => self.scan_identifier(),

                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        self.regex_allowed = regex_may_follow(&kind);

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Scan an identifier or literal keyword.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if is_identifier_part(c) {
                self.advance();
            } else {
                break;
            }
        }

        match &self.source[start..self.pos] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            ident => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scan a run of operator characters. `?.` is kept together.
    fn scan_operator(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            // '/' may only start a run
            if is_operator_char(c) && (c != '/' || self.pos == start) {
                self.advance();
            } else {
                break;
            }
        }

        if &self.source[start..self.pos] == "?"
            && self.peek_char() == Some('.')
            && !self.peek_next_char().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.advance();
        }

        TokenKind::Operator(self.source[start..self.pos].to_string())
    }

    /// Scan a single- or double-quoted string literal with escape sequences.
    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance(); // consume opening quote
        let mut value = String::new();
        let mut bad_escape: Option<String> = None;

        loop {
            match self.peek_char() {
                None | Some('\n') => return TokenKind::Error("Unterminated string".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.read_escape() {
                        Ok(Some(c)) => value.push(c),
                        Ok(None) => {}
                        Err(msg) => {
                            if self.peek_char().is_none() {
                                return TokenKind::Error("Unterminated string".to_string());
                            }
                            if bad_escape.is_none() {
                                bad_escape = Some(msg);
                            }
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        match bad_escape {
            Some(msg) => TokenKind::Error(msg),
            None => TokenKind::String(value),
        }
    }

    /// Scan a template literal. Substitutions are kept as raw text and the
    /// string/template literals inside them are skipped as units.
    fn scan_template(&mut self, nesting: usize) -> TokenKind {
        self.advance(); // consume backtick
        if nesting > MAX_TEMPLATE_NESTING {
            return TokenKind::Error("Template literal nesting too deep".to_string());
        }

        let mut text = String::new();
        let mut substitutions = false;

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("Unterminated template literal".to_string()),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.read_escape() {
                        Ok(Some(c)) => text.push(c),
                        Ok(None) => {}
                        Err(_) if self.peek_char().is_none() => {
                            return TokenKind::Error("Unterminated template literal".to_string())
                        }
                        Err(_) => text.push('\\'),
                    }
                }
                Some('$') if self.peek_next_char() == Some('{') => {
                    substitutions = true;
                    self.advance();
                    self.advance();
                    let sub_start = self.pos;
                    if let Some(error) = self.skip_substitution(nesting) {
                        return error;
                    }
                    text.push_str("${");
                    text.push_str(&self.source[sub_start..self.pos]);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }

        TokenKind::Template {
            text,
            substitutions,
        }
    }

    /// Skip the body of a `${...}` substitution including its closing brace.
    fn skip_substitution(&mut self, nesting: usize) -> Option<TokenKind> {
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                None => return Some(TokenKind::Error("Unterminated template literal".to_string())),
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return None;
                    }
                }
                Some(q @ ('"' | '\'')) => {
                    if let TokenKind::Error(msg) = self.scan_string(q) {
                        return Some(TokenKind::Error(msg));
                    }
                }
                Some('`') => {
                    if let TokenKind::Error(msg) = self.scan_template(nesting + 1) {
                        return Some(TokenKind::Error(msg));
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Read one escape sequence after a consumed backslash. `Ok(None)` is a
    /// line continuation.
    fn read_escape(&mut self) -> Result<Option<char>, String> {
        let c = match self.peek_char() {
            None => return Err("Unterminated escape sequence".to_string()),
            Some(c) => c,
        };
        self.advance();

        let cooked = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            '\r' => {
                if self.peek_char() == Some('\n') {
                    self.advance();
                }
                return Ok(None);
            }
            'x' => return self.read_hex_escape(2).map(Some),
            'u' => {
                if self.peek_char() == Some('{') {
                    self.advance();
                    let start = self.pos;
                    while let Some(h) = self.peek_char() {
                        if h.is_ascii_hexdigit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    let digits = &self.source[start..self.pos];
                    if self.peek_char() != Some('}') {
                        return Err("Invalid unicode escape".to_string());
                    }
                    self.advance();
                    return u32::from_str_radix(digits, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .map(Some)
                        .ok_or_else(|| "Invalid unicode escape".to_string());
                }
                return self.read_hex_escape(4).map(Some);
            }
            other => other,
        };
        Ok(Some(cooked))
    }

    fn read_hex_escape(&mut self, digits: usize) -> Result<char, String> {
        let start = self.pos;
        for _ in 0..digits {
            match self.peek_char() {
                Some(h) if h.is_ascii_hexdigit() => {
                    self.advance();
                }
                _ => return Err("Invalid hex escape".to_string()),
            }
        }
        let code = u32::from_str_radix(&self.source[start..self.pos], 16).unwrap_or(0xfffd);
        // Lone surrogates have no char; keep the replacement character.
        Ok(char::from_u32(code).unwrap_or('\u{fffd}'))
    }

    /// Scan a regular expression literal `/pattern/flags`.
    fn scan_regex(&mut self) -> TokenKind {
        self.advance(); // consume '/'
        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return TokenKind::Error("Unterminated regular expression".to_string())
                }
                Some('\\') => {
                    self.advance();
                    pattern.push('\\');
                    match self.peek_char() {
                        None | Some('\n') => {
                            return TokenKind::Error(
                                "Unterminated regular expression".to_string(),
                            )
                        }
                        Some(c) => {
                            self.advance();
                            pattern.push(c);
                        }
                    }
                }
                Some('/') if !in_class => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    if c == '[' {
                        in_class = true;
                    } else if c == ']' {
                        in_class = false;
                    }
                    self.advance();
                    pattern.push(c);
                }
            }
        }

        let mut flags = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphabetic() {
                self.advance();
                flags.push(c);
            } else {
                break;
            }
        }

        TokenKind::Regex { pattern, flags }
    }

    /// Scan a numeric literal: decimal, exponent, hex/octal/binary, `_`
    /// separators and a BigInt `n` suffix.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        if self.peek_char() == Some('0') {
            let radix = match self.peek_next_char() {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits_start = self.pos;
                while let Some(c) = self.peek_char() {
                    if c.is_digit(radix) || c == '_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let digits: String = self.source[digits_start..self.pos]
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                if self.peek_char() == Some('n') {
                    self.advance();
                }
                if self.consume_identifier_tail() {
                    return TokenKind::Error(format!(
                        "Invalid number: {}",
                        &self.source[start..self.pos]
                    ));
                }
                return match u64::from_str_radix(&digits, radix) {
                    Ok(n) => TokenKind::Number(n as f64),
                    Err(_) => TokenKind::Error(format!(
                        "Invalid number: {}",
                        &self.source[start..self.pos]
                    )),
                };
            }
        }

        self.consume_digits();
        if self.peek_char() == Some('.') && self.peek_next_char() != Some('.') {
            self.advance();
            self.consume_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let next = self.peek_next_char();
            let signed_digit = matches!(next, Some('+') | Some('-'))
                && self
                    .peek_nth_char(2)
                    .map(|c| c.is_ascii_digit())
                    .unwrap_or(false);
            if next.map(|c| c.is_ascii_digit()).unwrap_or(false) || signed_digit {
                self.advance();
                if signed_digit {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let end = self.pos;
        if self.peek_char() == Some('n') {
            self.advance();
        }
        if self.consume_identifier_tail() {
            return TokenKind::Error(format!(
                "Invalid number: {}",
                &self.source[start..self.pos]
            ));
        }

        let text: String = self.source[start..end]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("Invalid number: {}", &self.source[start..end])),
        }
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consume identifier characters glued onto a number (`3px`). Returns
    /// whether any were found.
    fn consume_identifier_tail(&mut self) -> bool {
        let mut found = false;
        while let Some(c) = self.peek_char() {
            if is_identifier_part(c) {
                self.advance();
                found = true;
            } else {
                break;
            }
        }
        found
    }

    /// Skip whitespace and comments. An unterminated block comment becomes an
    /// error token covering the comment.
    fn skip_whitespace_and_comments(&mut self) -> Option<Token> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => {
                    let next = self.peek_next_char();
                    if next == Some('/') {
                        // Line comment
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else if next == Some('*') {
                        let start = Span {
                            start: self.pos,
                            end: self.pos,
                            line: self.line,
                            column: self.column,
                        };
                        self.advance(); // /
                        self.advance(); // *
                        loop {
                            match self.peek_char() {
                                None => {
                                    return Some(Token {
                                        kind: TokenKind::Error(
                                            "Unterminated block comment".to_string(),
                                        ),
                                        span: Span {
                                            end: self.pos,
                                            ..start
                                        },
                                    });
                                }
                                Some('*') if self.peek_next_char() == Some('/') => {
                                    self.advance();
                                    self.advance();
                                    break;
                                }
                                _ => {
                                    self.advance();
                                }
                            }
                        }
                    } else {
                        return None;
                    }
                }
                _ => return None,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        self.peek_nth_char(1)
    }

    fn peek_nth_char(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(c)
        } else {
            None
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '!' | '<' | '>' | '&' | '|' | '+' | '-' | '*' | '%' | '^' | '~' | '?' | '/'
    )
}

/// A `/` directly after these tokens starts a regex literal rather than a
/// division.
fn regex_may_follow(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::LBrace
        | TokenKind::LParen
        | TokenKind::LBracket
        | TokenKind::Colon
        | TokenKind::Comma
        | TokenKind::Semicolon
        | TokenKind::Arrow
        | TokenKind::Spread
        | TokenKind::Operator(_) => true,
        TokenKind::Identifier(word) => matches!(
            word.as_str(),
            "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "new" | "delete"
                | "void" | "throw" | "instanceof" | "yield" | "await"
        ),
        _ => false,
    }
}

/// Tokenize `source` in one call.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_object_literal_tokens() {
        assert_eq!(
            kinds("{ name: 'age', min: -1, ok: true, }"),
            vec![
                TokenKind::LBrace,
                TokenKind::Identifier("name".to_string()),
                TokenKind::Colon,
                TokenKind::String("age".to_string()),
                TokenKind::Comma,
                TokenKind::Identifier("min".to_string()),
                TokenKind::Colon,
                TokenKind::Operator("-".to_string()),
                TokenKind::Number(1.0),
                TokenKind::Comma,
                TokenKind::Identifier("ok".to_string()),
                TokenKind::Colon,
                TokenKind::True,
                TokenKind::Comma,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = kinds("a // trailing }\n/* block { */ b");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_regex_vs_division() {
        let tokens = kinds("x: /a[/]b\\/c/gi, y: a / b");
        assert!(tokens.contains(&TokenKind::Regex {
            pattern: "a[/]b\\/c".to_string(),
            flags: "gi".to_string(),
        }));
        assert!(tokens.contains(&TokenKind::Operator("/".to_string())));
    }

    #[test]
    fn test_template_with_nested_braces() {
        let tokens = kinds("`hi ${ { a: '}' }.a } there`");
        match &tokens[0] {
            TokenKind::Template {
                text,
                substitutions,
            } => {
                assert!(*substitutions);
                assert!(text.starts_with("hi ${"));
                assert!(text.ends_with(" there"));
            }
            other => panic!("expected template, got {:?}", other),
        }
        assert_eq!(tokens[1], TokenKind::Eof);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("0x1F")[0], TokenKind::Number(31.0));
        assert_eq!(kinds("1_000")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5e3")[0], TokenKind::Number(2500.0));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("10n")[0], TokenKind::Number(10.0));
        assert!(matches!(kinds("3px")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#""a\nA\u{1F600}\x41\'""#)[0],
            TokenKind::String("a\nA\u{1F600}A'".to_string())
        );
    }

    #[test]
    fn test_arrow_and_spread() {
        let tokens = kinds("(v) => ...rest");
        assert!(tokens.contains(&TokenKind::Arrow));
        assert!(tokens.contains(&TokenKind::Spread));
    }

    #[test]
    fn test_unterminated_constructs_produce_errors() {
        for source in ["'abc", "`abc ${", "/* never closed", "x = /abc"] {
            let tokens = tokenize(source);
            assert!(
                tokens.iter().any(|t| matches!(t.kind, TokenKind::Error(_))),
                "no error token for {:?}",
                source
            );
            assert!(tokens.last().map(Token::is_eof).unwrap_or(false));
        }
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = tokenize("{\n  a: 1\n}");
        let a = &tokens[1];
        assert_eq!((a.span.line, a.span.column), (2, 3));
        let close = &tokens[4];
        assert_eq!((close.span.line, close.span.column), (3, 1));
    }

    #[test]
    fn test_with_position_offsets_first_line() {
        let tokens = Lexer::with_position("a", 7, 4).tokenize();
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (7, 4));
        assert_eq!(tokens[0].span.start, 0);
    }
}
