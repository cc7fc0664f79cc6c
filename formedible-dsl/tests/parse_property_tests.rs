//! Property-Based Tests for the parse pipeline
//!
//! Properties:
//! - Imported JSON keeps field order and required flags
//! - Nesting depth d parses iff d <= maxNestingDepth
//! - Oversized input fails before extraction
//! - Unknown types are reported with value and index
//! - Parsing is deterministic, fenced or not
//! - Printed source parses back to the same names, types and required flags

use formedible_core::{ErrorKind, ParserConfig};
use formedible_dsl::{parse, parse_with_config, to_fenced_source, to_source, FormedibleParser, Stage};
use formedible_test_utils::fixtures;
use formedible_test_utils::generators::*;
use formedible_test_utils::FieldSpec;
use formedible_test_utils::FormSourceBuilder;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_json_import_keeps_order_and_required((specs, json) in arb_json_form()) {
        let outcome = parse(&json).expect("valid JSON form parses");
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        prop_assert_eq!(outcome.config.field_names(), names);
        for (spec, field) in specs.iter().zip(&outcome.config.fields) {
            prop_assert_eq!(field.field_type.as_str(), spec.field_type.as_str());
            prop_assert_eq!(field.required, spec.required.unwrap_or(false));
        }
    }

    #[test]
    fn prop_depth_limit_is_exact(levels in 0usize..10, max in 1usize..9) {
        let config = ParserConfig::default().with_max_nesting_depth(max);
        let result = parse_with_config(&fixtures::nested_array_form(levels), config);
        if levels <= max {
            let outcome = result.expect("within the limit");
            prop_assert_eq!(outcome.config.max_depth(), levels);
        } else {
            let err = result.expect_err("past the limit");
            prop_assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
            prop_assert_eq!(err.context.depth, Some(max + 1));
        }
    }

    #[test]
    fn prop_oversized_input_never_reaches_extraction(
        text in "[ -~\n]{1,200}",
        limit in 0usize..64,
    ) {
        prop_assume!(text.len() > limit);
        let parser = FormedibleParser::new(ParserConfig::default().with_max_code_length(limit));
        let mut stages = Vec::new();
        let err = parser
            .parse_with_observer(&text, |stage| stages.push(stage))
            .expect_err("too large");
        prop_assert_eq!(err.kind, ErrorKind::SourceTooLarge);
        prop_assert_eq!(stages, vec![Stage::PreCheck]);
    }

    #[test]
    fn prop_unknown_type_is_reported(
        specs in arb_field_specs(6),
        bad_type in arb_unknown_field_type(),
        position in any::<prop::sample::Index>(),
    ) {
        let index = position.index(specs.len() + 1);
        let mut fields = specs.clone();
        fields.insert(index, FieldSpec::new("unknownTypeField", bad_type.clone()));
        prop_assume!(specs.iter().all(|s| s.name != "unknownTypeField"));

        let source = FormSourceBuilder::new().fields(fields).build();
        let err = parse(&source).expect_err("unknown type");
        prop_assert_eq!(err.kind, ErrorKind::UnknownFieldType);
        prop_assert!(err.message.contains(&bad_type));
        let expected_index = format!("index {}", index);
        prop_assert!(err.message.contains(&expected_index));
    }

    #[test]
    fn prop_parsing_is_idempotent(builder in arb_form_builder()) {
        let bare = builder.build();
        let first = parse(&bare).expect("generated form parses");
        let second = parse(&bare).expect("generated form parses");
        prop_assert_eq!(&first, &second);

        let fenced = parse(&builder.fenced()).expect("fenced form parses");
        prop_assert_eq!(&fenced.config, &first.config);
        prop_assert_eq!(&fenced.source_digest, &first.source_digest);
    }

    #[test]
    fn prop_printed_source_round_trips(builder in arb_form_builder()) {
        let original = parse(&builder.build()).expect("generated form parses").config;
        for printed in [to_source(&original), to_fenced_source(&original)] {
            let reparsed = parse(&printed).expect("printed form parses").config;
            prop_assert_eq!(reparsed.field_names(), original.field_names());
            for (a, b) in original.fields.iter().zip(&reparsed.fields) {
                prop_assert_eq!(&a.field_type, &b.field_type);
                prop_assert_eq!(a.required, b.required);
                prop_assert_eq!(&a.label, &b.label);
            }
            prop_assert_eq!(&reparsed.title, &original.title);
        }
    }
}
