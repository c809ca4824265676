//! Fuzz target for the deck line lexer.
//!
//! Any UTF-8 input must lex without panicking, one line per source line,
//! with spans that stay inside the input.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use deckhand_dsl::lexer::{Lexer, LineKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let markers = vec!["//".to_string()];
        let lines: Vec<_> = Lexer::new(input, &markers).collect();

        assert_eq!(lines.len(), input.split_terminator('\n').count());

        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line.number(), i + 1, "Line numbers are consecutive");
            assert!(line.span.start <= line.span.end, "Span start should be <= end");
            assert!(line.span.end <= input.len(), "Span stays inside the input");
            assert!(line.span.column >= 1, "Column numbers should be >= 1");

            if let LineKind::Entry { tokens, .. } = &line.kind {
                assert!(!tokens.is_empty(), "Entries carry at least one token");
                for token in tokens {
                    assert!(token.span.end <= input.len());
                    assert_eq!(token.span.line, line.number());
                }
            }
        }
    }
});
