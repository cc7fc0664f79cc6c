//! Lexer token types

use std::fmt;

// ============================================================================
// TOKENS
// ============================================================================

/// Token kinds for the JavaScript subset that form source is written in.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Delimiters
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    Semicolon,
    Arrow,
    Spread,

    /// Any other run of operator characters (`=`, `-`, `&&`, `?`, `?.`...).
    Operator(String),

    // Literals
    String(String),
    /// Template literal body. `substitutions` is true when it contains `${}`.
    Template { text: String, substitutions: bool },
    Regex { pattern: String, flags: String },
    Number(f64),
    Identifier(String),
    True,
    False,
    Null,
    Undefined,

    // Special
    Eof,
    Error(String),
}

impl TokenKind {
    pub fn is_open(&self) -> bool {
        matches!(self, TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket)
    }

    /// The closing delimiter matching an opening one.
    pub fn closer(&self) -> Option<TokenKind> {
        match self {
            TokenKind::LBrace => Some(TokenKind::RBrace),
            TokenKind::LParen => Some(TokenKind::RParen),
            TokenKind::LBracket => Some(TokenKind::RBracket),
            _ => None,
        }
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        matches!(self, TokenKind::Identifier(s) if s == name)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Arrow => f.write_str("'=>'"),
            TokenKind::Spread => f.write_str("'...'"),
            TokenKind::Operator(op) => write!(f, "operator '{}'", op),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Template { .. } => f.write_str("template literal"),
            TokenKind::Regex { pattern, flags } => write!(f, "regex /{}/{}", pattern, flags),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::Null => f.write_str("'null'"),
            TokenKind::Undefined => f.write_str("'undefined'"),
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::Error(msg) => write!(f, "invalid token ({})", msg),
        }
    }
}

/// Source location span. `start`/`end` are byte offsets into the lexed text;
/// `line`/`column` are 1-based and may be shifted to the original input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
