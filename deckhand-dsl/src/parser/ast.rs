//! Raw deck tree produced by the parser.
//!
//! Nothing here is typed: entries keep their verbatim comment-free text and
//! their tokens so unknown content can be reproduced exactly.

use crate::lexer::{Span, Token};
use deckhand_core::{needs_quotes, quote_token, Diagnostics, SourcePos};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// RAW TREE
// ============================================================================

/// Root of a parsed deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeck {
    /// Source name used in diagnostic positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Arc<str>>,
    /// Top-level section occurrences in source order.
    pub sections: Vec<RawSection>,
}

impl RawDeck {
    pub fn new() -> Self {
        Self::default()
    }

    /// All top-level occurrences named `name`, in source order.
    pub fn occurrences<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawSection> + 'a {
        self.sections.iter().filter(move |s| s.name == name)
    }

    /// Every section occurrence, depth first.
    pub fn walk(&self) -> Vec<&RawSection> {
        let mut out = Vec::new();
        for section in &self.sections {
            section.collect_into(&mut out);
        }
        out
    }

    /// Number of entry lines across the whole tree.
    pub fn entry_count(&self) -> usize {
        self.walk().iter().map(|s| s.entries.len()).sum()
    }
}

/// One occurrence of a section header and its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSection {
    /// Last path component.
    pub name: String,
    /// Full `/`-separated path.
    pub path: String,
    /// Span of the header name; `None` for implicit parents and sections
    /// built from structured input.
    pub span: Option<Span>,
    /// Created to hold a nested header whose parent never appeared.
    pub implicit: bool,
    pub entries: Vec<RawEntry>,
    pub children: Vec<RawSection>,
}

impl RawSection {
    pub fn new(path: impl Into<String>, span: Option<Span>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            path,
            span,
            implicit: false,
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn implicit(path: impl Into<String>) -> Self {
        Self {
            implicit: true,
            ..Self::new(path, None)
        }
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a RawSection>) {
        out.push(self);
        for child in &self.children {
            child.collect_into(out);
        }
    }
}

/// One body line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Comment-free text, trimmed, exactly as written.
    pub text: String,
    pub tokens: Vec<Token>,
    pub span: Span,
    /// Keyed line built from structured input; printed with the key padded.
    #[serde(default)]
    pub align_key: bool,
}

impl RawEntry {
    /// Build an entry from token strings, quoting where the lexer needs it.
    /// Token spans are relative to `text` and carry line 0.
    pub fn from_parts<S: AsRef<str>>(parts: &[S], comment_markers: &[String], align_key: bool) -> Self {
        let mut text = String::new();
        let mut tokens = Vec::with_capacity(parts.len());
        for part in parts {
            if !text.is_empty() {
                text.push(' ');
            }
            let start = text.len();
            let rendered = quote_token(part.as_ref(), comment_markers);
            text.push_str(&rendered);
            tokens.push(Token {
                text: part.as_ref().to_string(),
                quoted: needs_quotes(part.as_ref(), comment_markers),
                span: Span::synthetic(start, text.len()),
            });
        }
        Self {
            span: Span::synthetic(0, text.len()),
            text,
            tokens,
            align_key,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.tokens.first().map(|t| t.text.as_str())
    }

    /// Tokens after the key.
    pub fn values(&self) -> &[Token] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    /// Verbatim text after the key token.
    pub fn value_text(&self) -> &str {
        match (self.tokens.first(), self.tokens.get(1)) {
            (Some(key), Some(_)) => {
                let offset = key.span.end - self.span.start;
                self.text.get(offset..).map(str::trim_start).unwrap_or("")
            }
            _ => "",
        }
    }
}

pub(crate) fn span_pos(file: Option<Arc<str>>, span: &Span) -> Option<SourcePos> {
    if span.is_synthetic() {
        None
    } else {
        Some(SourcePos::new(file, span.line, span.column))
    }
}

// ============================================================================
// PARSE RESULT
// ============================================================================

/// Line-level syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// A best-effort tree plus every syntax diagnostic found on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub deck: RawDeck,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_quotes_and_value_text() {
        let markers = vec!["//".to_string()];
        let entry = RawEntry::from_parts(&["OUTPUT_DIR", "my results"], &markers, true);
        assert_eq!(entry.text, "OUTPUT_DIR \"my results\"");
        assert_eq!(entry.key(), Some("OUTPUT_DIR"));
        assert_eq!(entry.values()[0].text, "my results");
        assert!(entry.values()[0].quoted);
        assert_eq!(entry.value_text(), "\"my results\"");
        assert!(entry.span.is_synthetic());
    }

    #[test]
    fn test_value_text_without_values() {
        let entry = RawEntry::from_parts(&["FLAG"], &[], false);
        assert_eq!(entry.value_text(), "");
        assert!(entry.values().is_empty());
    }

    #[test]
    fn test_section_name_from_path() {
        let section = RawSection::new("STRUCTURAL DYNAMIC/GENALPHA", None);
        assert_eq!(section.name, "GENALPHA");
        assert_eq!(section.path, "STRUCTURAL DYNAMIC/GENALPHA");
        assert!(!section.implicit);
        assert!(RawSection::implicit("A").implicit);
    }
}
