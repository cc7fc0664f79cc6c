//! Fuzz target for the form source lexer
//!
//! Arbitrary UTF-8 must tokenize without panicking, always end in `Eof`,
//! and produce spans that stay inside the input.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use formedible_dsl::{Lexer, TokenKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let tokens = Lexer::new(input).tokenize();

        assert!(!tokens.is_empty(), "tokenize always yields Eof");
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));

        for token in &tokens {
            assert!(token.span.start <= token.span.end);
            assert!(token.span.end <= input.len());
            assert!(input.is_char_boundary(token.span.start));
            assert!(token.span.line >= 1);
            assert!(token.span.column >= 1);
        }
    }
});
