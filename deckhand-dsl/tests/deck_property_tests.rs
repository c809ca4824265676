//! Property-Based Tests for the deck pipeline
//!
//! Properties, for decks generated valid under the fixture schema:
//! - validation reports nothing
//! - validation is idempotent
//! - legacy → structured → legacy revalidates to an equivalent typed deck
//! - unknown sections and keys only ever produce warnings and survive
//!   conversion verbatim, including keys named like a child section and
//!   children of repeated sections
//! - quoted tokens read back as the text they were built from

use deckhand_core::{quote_token, DiagnosticKind, EmitConfig, Severity};
use deckhand_dsl::converter::{from_structured, to_structured, ConvertOptions};
use deckhand_dsl::lexer::{Lexer, LineKind};
use deckhand_dsl::{parse, print_deck, validate, StructuredTree};
use deckhand_test_utils::assertions::{assert_clean, assert_equivalent, assert_only_warnings};
use deckhand_test_utils::fixtures::fixture_schema;
use deckhand_test_utils::generators::{arb_deck_with_unknowns, arb_valid_deck};
use proptest::prelude::*;
use serde_yaml::Value as Yaml;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_valid_decks_validate_clean(deck in arb_valid_deck()) {
        let schema = fixture_schema();
        let parsed = parse(&deck);
        assert_clean(&parsed.diagnostics);
        let validated = validate(&parsed.deck, &schema);
        assert_clean(&validated.diagnostics);
    }

    #[test]
    fn prop_validation_is_idempotent(deck in arb_deck_with_unknowns()) {
        let schema = fixture_schema();
        let parsed = parse(&deck.deck);
        let first = validate(&parsed.deck, &schema);
        let second = validate(&parsed.deck, &schema);
        prop_assert_eq!(&first.diagnostics, &second.diagnostics);
        prop_assert_eq!(&first.deck, &second.deck);
    }

    #[test]
    fn prop_structured_round_trip(deck in arb_valid_deck(), record_order in any::<bool>()) {
        let schema = fixture_schema();
        let options = ConvertOptions { record_order, ..ConvertOptions::default() };
        let first = validate(&parse(&deck).deck, &schema);

        let tree = to_structured(&first.deck, &schema, &options);
        let yaml = tree.to_yaml_string(false).unwrap();
        let tree = StructuredTree::from_yaml_str(&yaml).unwrap();
        let raw = from_structured(&tree, &schema).unwrap();
        let text = print_deck(&raw, &EmitConfig::default());

        let reparsed = parse(&text);
        assert_clean(&reparsed.diagnostics);
        let second = validate(&reparsed.deck, &schema);
        assert_clean(&second.diagnostics);
        assert_equivalent(&first.deck, &second.deck);
    }

    #[test]
    fn prop_unknowns_are_warnings_and_kept_verbatim(case in arb_deck_with_unknowns()) {
        let schema = fixture_schema();
        let parsed = parse(&case.deck);
        assert_clean(&parsed.diagnostics);
        let validated = validate(&parsed.deck, &schema);
        assert_only_warnings(&validated.diagnostics);

        let unknown_keys = validated.diagnostics.of_kind(DiagnosticKind::UnknownParameter).count();
        let unknown_sections = validated.diagnostics.of_kind(DiagnosticKind::UnknownSection).count();
        prop_assert_eq!(unknown_keys, case.keys.len());
        prop_assert_eq!(unknown_sections, case.unknown_sections);

        let tree = to_structured(&validated.deck, &schema, &ConvertOptions::default());
        for (section, key, value) in &case.keys {
            let mapping = tree.get(section).unwrap();
            prop_assert_eq!(mapping.get(key.as_str()), Some(&Yaml::String(value.clone())));
        }
        for (key, expected) in &case.sections {
            prop_assert_eq!(tree.get(key).unwrap(), expected);
        }

        // Back to legacy text: same warnings, same verbatim values.
        let raw = from_structured(&tree, &schema).unwrap();
        let text = print_deck(&raw, &EmitConfig::default());
        let reparsed = parse(&text);
        assert_clean(&reparsed.diagnostics);
        let again = validate(&reparsed.deck, &schema);
        prop_assert!(again.diagnostics.iter().all(|d| d.severity == Severity::Warning));
        prop_assert_eq!(again.diagnostics.len(), validated.diagnostics.len());
        assert_equivalent(&validated.deck, &again.deck);
    }

    #[test]
    fn prop_quoted_tokens_read_back(text in "[ -~\t]{0,16}") {
        let markers = vec!["//".to_string()];
        let line = format!("KEY {}", quote_token(&text, &markers));
        let lexed: Vec<_> = Lexer::new(&line, &markers).collect();
        prop_assert_eq!(lexed.len(), 1);
        match &lexed[0].kind {
            LineKind::Entry { tokens, .. } => {
                prop_assert_eq!(tokens.len(), 2);
                prop_assert_eq!(&tokens[1].text, &text);
            }
            other => prop_assert!(false, "unexpected line {:?}", other),
        }
    }
}
