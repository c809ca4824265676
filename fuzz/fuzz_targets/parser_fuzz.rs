//! Fuzz target for the deck parser and the legacy printer.
//!
//! Parsing never fails outright; it returns a partial deck plus syntax
//! diagnostics. Whatever survives parsing must print back to text that
//! parses without new errors.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use deckhand_core::{DiagnosticKind, EmitConfig};
use deckhand_dsl::{parse, print_deck};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let out = parse(input);

        for diag in out.diagnostics.iter() {
            assert_eq!(diag.kind, DiagnosticKind::Syntax);
            let pos = diag.pos.as_ref().expect("syntax errors carry a position");
            assert!(pos.line >= 1, "Error line should be >= 1");
            assert!(!diag.message.is_empty(), "Error message should not be empty");
        }

        let text = print_deck(&out.deck, &EmitConfig::default());
        let again = parse(&text);
        assert_eq!(again.deck.entry_count(), out.deck.entry_count());
    }
});
