//! Property-based tests for the extension header grammar.
//!
//! These tests use proptest to round-trip generated parameter sets through
//! the serializer and parser, and to fuzz the parser for panics.

use proptest::prelude::*;
use rsext::{parse_header, serialize_params, Params, Value};

/// Strategy for generating HTTP token strings usable as names and keys.
fn token_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.-]{0,11}"
}

/// Strategy for header-safe text values.
///
/// All-digit strings are excluded: they serialize unquoted and decode back
/// as integers, which is the documented normalization rather than a bug.
fn text_value_strategy() -> impl Strategy<Value = Value> {
    "[ -~]{0,12}"
        .prop_filter("all-digit text normalizes to an integer", |s| {
            s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit())
        })
        .prop_map(Value::text)
}

fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Flag),
        any::<u64>().prop_map(Value::Int),
        text_value_strategy(),
    ]
}

/// Strategy for scalar or multi values. Multi lists hold at least two
/// elements; a one-element list reparses as its scalar.
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar_value_strategy(),
        1 => prop::collection::vec(scalar_value_strategy(), 2..4).prop_map(Value::Multi),
    ]
}

fn params_strategy() -> impl Strategy<Value = Params> {
    prop::collection::vec((token_strategy(), value_strategy()), 0..5).prop_map(|entries| {
        let mut params = Params::new();
        let mut seen = std::collections::HashSet::new();
        for (key, value) in entries {
            if seen.insert(key.clone()) {
                params.insert(key, value);
            }
        }
        params
    })
}

proptest! {
    // =========================================================================
    // Property 1: Roundtrip - parse(serialize(name, params)) == (name, params)
    // =========================================================================
    #[test]
    fn test_roundtrip_single_offer(
        name in token_strategy(),
        params in params_strategy()
    ) {
        let header = serialize_params(&name, &params);
        let offers = parse_header(&header);
        prop_assert!(offers.is_ok(), "parse failed: {:?} for {:?}", offers, header);
        let offers = offers.unwrap();

        prop_assert_eq!(offers.len(), 1);
        let (parsed_name, parsed_params) = offers.iter().next().unwrap();
        prop_assert_eq!(parsed_name, name.as_str());
        prop_assert_eq!(parsed_params, &params);
    }

    // =========================================================================
    // Property 2: Roundtrip over a comma-joined header of several offers
    // =========================================================================
    #[test]
    fn test_roundtrip_assembled_header(
        offers_in in prop::collection::vec((token_strategy(), params_strategy()), 1..4)
    ) {
        let header = offers_in
            .iter()
            .map(|(name, params)| serialize_params(name, params))
            .collect::<Vec<_>>()
            .join(", ");

        let parsed = parse_header(&header);
        prop_assert!(parsed.is_ok(), "parse failed: {:?} for {:?}", parsed, header);
        let parsed = parsed.unwrap();

        prop_assert_eq!(parsed.len(), offers_in.len());
        for ((parsed_name, parsed_params), (name, params)) in
            parsed.iter().zip(offers_in.iter())
        {
            prop_assert_eq!(parsed_name, name.as_str());
            prop_assert_eq!(parsed_params, params);
        }
    }

    // =========================================================================
    // Property 3: by_name returns every duplicate offer in header order
    // =========================================================================
    #[test]
    fn test_by_name_collects_duplicates(
        name in token_strategy(),
        params_list in prop::collection::vec(params_strategy(), 1..4)
    ) {
        let header = params_list
            .iter()
            .map(|params| serialize_params(&name, params))
            .collect::<Vec<_>>()
            .join(", ");

        let parsed = parse_header(&header).unwrap();
        let collected = parsed.by_name(&name);
        prop_assert_eq!(collected.len(), params_list.len());
        for (parsed_params, params) in collected.iter().zip(params_list.iter()) {
            prop_assert_eq!(*parsed_params, params);
        }
    }

    // =========================================================================
    // Property 4: The parser never panics, whatever the input
    // =========================================================================
    #[test]
    fn test_parser_never_panics(input in any::<String>()) {
        let _ = parse_header(&input);
    }

    #[test]
    fn test_parser_never_panics_on_ascii(input in "[\\x00-\\x7f]{0,64}") {
        let _ = parse_header(&input);
    }
}
