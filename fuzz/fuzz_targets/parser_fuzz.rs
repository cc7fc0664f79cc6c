//! Fuzz target for the full parse pipeline
//!
//! Arbitrary text must parse to a config or a typed error, never panic.
//! Successful parses must be deterministic and keep the depth bound.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use formedible_core::ParserConfig;
use formedible_dsl::{parse_with_config, printer::to_source};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let config = ParserConfig::default().with_max_nesting_depth(4);
        match parse_with_config(input, config) {
            Ok(outcome) => {
                assert!(outcome.config.max_depth() <= config.max_nesting_depth);
                let again = parse_with_config(input, config).expect("second parse");
                assert_eq!(outcome, again, "parsing is deterministic");

                // Printed source must parse back.
                let printed = to_source(&outcome.config);
                let reparsed = parse_with_config(&printed, config).expect("printed source parses");
                assert_eq!(reparsed.config.field_names(), outcome.config.field_names());
            }
            Err(err) => {
                assert!(!err.message.is_empty(), "errors carry a message");
            }
        }
    }
});
