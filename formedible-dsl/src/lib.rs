//! FORMEDIBLE DSL - Form Source Parser
//!
//! This crate turns AI-generated or hand-written form source (JavaScript
//! object literals with embedded zod-style validator chains) into a validated
//! [`ParsedFormConfig`](formedible_core::ParsedFormConfig). Nothing in the
//! source is ever executed.
//!
//! Architecture:
//! ```text
//! Raw text (chat completion, pasted code, imported JSON)
//!     ↓
//! Guard pre-check (maxCodeLength)
//!     ↓
//! Normalizer (fences, prose, const bindings)
//!     ↓
//! Extractor (token stream → top-level entries)
//!     ↓
//! Schema Reconstructor + Field Tree Builder
//!     ↓
//! Guard post-check (names, types, depth, placement)
//!     ↓
//! Config Emitter → ParseOutcome { config, warnings, sourceDigest }
//!     ↓
//! Source Printer (for round-trip testing)
//! ```

pub mod diagnostics;
pub mod emit;
pub mod extract;
pub mod fields;
pub mod guard;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod printer;
pub mod schema;
pub mod stream;

// Re-export key types for convenience
pub use diagnostics::Diagnostics;
pub use extract::{ExtractError, Expr, ObjectLiteral, SourceTokens};
pub use fields::{infer_rule, FieldBuilder};
pub use guard::{explain, render};
pub use lexer::{tokenize, Lexer, Span, Token, TokenKind};
pub use normalize::{normalize, Bindings, NormalizedSource, SourceOrigin};
pub use parser::*;
pub use printer::{to_fenced_source, to_source};
pub use schema::{RuleMap, SchemaReconstructor};
pub use stream::CompletionBuffer;
