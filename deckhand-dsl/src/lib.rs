//! deckhand DSL - legacy deck parser, validator & structured converter
//!
//! Reads solver input decks in the legacy sectioned text format, checks them
//! against a versioned schema, and converts them to and from a structured
//! (YAML/JSON) tree without loss.
//!
//! Architecture:
//! ```text
//! Legacy text (.dat)
//!     ↓
//! Lexer (line classification, tokens)
//!     ↓
//! Parser (RawDeck, syntax diagnostics)
//!     ↓
//! Validator (TypedDeck + diagnostics, against a SchemaVersion)
//!     ↓
//! Converter (StructuredTree)  ⇄  Pretty printer (legacy text)
//! ```

pub mod batch;
pub mod converter;
pub mod document;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pretty_printer;
pub mod session;
pub mod validator;

// Re-export key types for convenience
pub use batch::{process_files, BatchSummary, FileOutcome};
pub use converter::{
    from_structured, from_structured_with, raw_to_structured, to_structured, ConvertOptions,
    Converted, ORDER_KEY,
};
pub use document::{StructuredTree, Tolerance, INCLUDES};
pub use error::{ConvertError, DeckError, DeckResult, TreeError};
pub use parser::{parse, DeckParser, ParseOutput, RawDeck, RawEntry, RawSection};
pub use pretty_printer::{print_deck, write_deck};
pub use session::{Report, Session};
pub use validator::{validate, DeckValidator, TypedDeck, Validated};
