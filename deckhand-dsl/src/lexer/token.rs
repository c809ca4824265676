//! Lexer token types

use serde::{Deserialize, Serialize};

// ============================================================================
// LEXER TYPES
// ============================================================================

/// Source location span. Offsets are byte offsets into the whole deck text;
/// `line` and `column` are 1-based, `column` counts characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Span {
    /// Span for generated text that has no source line.
    pub fn synthetic(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            line: 0,
            column: start + 1,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

/// One whitespace-delimited token of an entry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token text; for quoted tokens the unescaped contents without quotes.
    pub text: String,
    pub quoted: bool,
    pub span: Span,
}

/// Classification of a single source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Empty, whitespace-only, or comment-only.
    Blank,
    /// `--...-- NAME`; the name is trimmed and may contain `/`.
    Header { name: String },
    /// Body line: comment-free text and its tokens.
    Entry { text: String, tokens: Vec<Token> },
    /// Malformed line. `column` is 1-based.
    Error { message: String, column: usize },
}

/// A lexed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    /// Span of the meaningful text (header name, entry text, or the whole line).
    pub span: Span,
}

impl Line {
    pub fn number(&self) -> usize {
        self.span.line
    }
}
