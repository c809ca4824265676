//! Tolerant line-oriented parser.
//!
//! A malformed line produces one `Syntax` diagnostic and parsing resumes on
//! the next line, so a single typo never hides the rest of the deck.

use super::ast::*;
use crate::error::DeckError;
use crate::lexer::*;
use deckhand_core::{Diagnostic, DiagnosticKind, Diagnostics, ParserConfig, SourcePos};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

/// Parse deck text with the default configuration.
pub fn parse(source: &str) -> ParseOutput {
    DeckParser::new(&ParserConfig::default()).parse(source)
}

/// Parser for the legacy deck format.
pub struct DeckParser<'c> {
    config: &'c ParserConfig,
    file: Option<Arc<str>>,
}

impl<'c> DeckParser<'c> {
    pub fn new(config: &'c ParserConfig) -> Self {
        Self { config, file: None }
    }

    /// Name reported in diagnostic positions.
    pub fn with_file(mut self, file: impl Into<Arc<str>>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Read the whole stream, then parse it. Fails only when the stream is
    /// unreadable or not UTF-8.
    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ParseOutput, DeckError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| DeckError::Io {
            path: self.file.as_deref().unwrap_or("<stream>").to_string(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| DeckError::Encoding {
            path: self.file.as_deref().unwrap_or("<stream>").to_string(),
            offset: e.utf8_error().valid_up_to(),
        })?;
        Ok(self.parse(&text))
    }

    pub fn parse(&self, source: &str) -> ParseOutput {
        let mut state = ParseState::new(self.file.clone());

        for line in Lexer::new(source, &self.config.comment_markers) {
            match line.kind {
                LineKind::Blank => {}
                LineKind::Error { message, column } => {
                    state.syntax_error(ParseError {
                        message,
                        line: line.span.line,
                        column,
                    });
                }
                LineKind::Header { name } => {
                    if self.config.end_marker.as_deref() == Some(name.as_str()) {
                        tracing::trace!(line = line.span.line, "end marker reached");
                        break;
                    }
                    state.open_section(&name, line.span);
                }
                LineKind::Entry { text, tokens } => {
                    state.push_entry(RawEntry {
                        text,
                        tokens,
                        span: line.span,
                        align_key: false,
                    });
                }
            }
        }

        tracing::debug!(
            sections = state.deck.sections.len(),
            errors = state.diagnostics.len(),
            "parsed deck"
        );
        ParseOutput {
            deck: state.deck,
            diagnostics: state.diagnostics,
        }
    }
}

// ============================================================================
// PARSE STATE
// ============================================================================

enum Cursor {
    /// No header seen yet.
    Start,
    /// Index path from the root to the section receiving entries.
    In(Vec<usize>),
    /// After a malformed header; body lines are skipped until the next one.
    Skipping,
}

struct ParseState {
    deck: RawDeck,
    diagnostics: Diagnostics,
    cursor: Cursor,
    /// Most recent top-level occurrence of each name.
    last_top_level: HashMap<String, usize>,
}

impl ParseState {
    fn new(file: Option<Arc<str>>) -> Self {
        Self {
            deck: RawDeck {
                file,
                sections: Vec::new(),
            },
            diagnostics: Diagnostics::new(),
            cursor: Cursor::Start,
            last_top_level: HashMap::new(),
        }
    }

    fn open_section(&mut self, name: &str, span: Span) {
        let parts: Vec<&str> = name.split('/').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            self.syntax_error(ParseError {
                message: format!(
                    "section header '{}' has an empty path component; lines up to the next header are ignored",
                    name
                ),
                line: span.line,
                column: span.column,
            });
            self.cursor = Cursor::Skipping;
            return;
        }

        let path = parts.join("/");
        tracing::trace!(line = span.line, section = %path, "section header");

        let (top, rest) = match parts.split_first() {
            Some(split) => split,
            None => return,
        };

        if rest.is_empty() {
            self.deck.sections.push(RawSection::new(path, Some(span)));
            let idx = self.deck.sections.len() - 1;
            self.last_top_level.insert(top.to_string(), idx);
            self.cursor = Cursor::In(vec![idx]);
            return;
        }

        let top_idx = match self.last_top_level.get(*top) {
            Some(&idx) => idx,
            None => {
                self.deck.sections.push(RawSection::implicit(*top));
                let idx = self.deck.sections.len() - 1;
                self.last_top_level.insert(top.to_string(), idx);
                idx
            }
        };

        let mut indices = vec![top_idx];
        let mut node = &mut self.deck.sections[top_idx];
        let middle = &rest[..rest.len() - 1];
        for part in middle {
            let child_idx = match node.children.iter().rposition(|c| c.name == *part) {
                Some(idx) => idx,
                None => {
                    let child_path = format!("{}/{}", node.path, part);
                    node.children.push(RawSection::implicit(child_path));
                    node.children.len() - 1
                }
            };
            indices.push(child_idx);
            node = &mut node.children[child_idx];
        }
        node.children.push(RawSection::new(path, Some(span)));
        indices.push(node.children.len() - 1);
        self.cursor = Cursor::In(indices);
    }

    fn push_entry(&mut self, entry: RawEntry) {
        match &self.cursor {
            Cursor::In(indices) => {
                if let Some(section) = section_at(&mut self.deck.sections, indices) {
                    section.entries.push(entry);
                }
            }
            Cursor::Skipping => {}
            Cursor::Start => {
                self.syntax_error(ParseError {
                    message: "entry before the first section header".to_string(),
                    line: entry.span.line,
                    column: entry.span.column,
                });
            }
        }
    }

    fn syntax_error(&mut self, err: ParseError) {
        let path = match &self.cursor {
            Cursor::In(indices) => section_path(&self.deck.sections, indices),
            _ => String::new(),
        };
        self.diagnostics.push(
            Diagnostic::error(DiagnosticKind::Syntax, path, err.message)
                .at(SourcePos::new(self.deck.file.clone(), err.line, err.column)),
        );
    }
}

fn section_at<'a>(sections: &'a mut [RawSection], indices: &[usize]) -> Option<&'a mut RawSection> {
    let (first, rest) = indices.split_first()?;
    let mut node = sections.get_mut(*first)?;
    for &idx in rest {
        node = node.children.get_mut(idx)?;
    }
    Some(node)
}

fn section_path(sections: &[RawSection], indices: &[usize]) -> String {
    let mut node: Option<&RawSection> = None;
    for (depth, &idx) in indices.iter().enumerate() {
        node = if depth == 0 {
            sections.get(idx)
        } else {
            node.and_then(|n| n.children.get(idx))
        };
    }
    node.map(|n| n.path.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(deck: &RawDeck) -> Vec<&str> {
        deck.sections.iter().map(|s| s.path.as_str()).collect()
    }

    #[test]
    fn test_parse_sections_and_entries() {
        let out = parse(
            "// header comment\n\
             --------PROBLEM TYPE\n\
             PROBLEMTYPE Structure\n\
             ----IO\n\
             OUTPUT_BIN yes\n\
             STRUCT_STRESS Cauchy // trailing\n",
        );
        assert!(out.diagnostics.is_empty(), "{}", out.diagnostics);
        assert_eq!(names(&out.deck), vec!["PROBLEM TYPE", "IO"]);
        let io = &out.deck.sections[1];
        assert_eq!(io.entries.len(), 2);
        assert_eq!(io.entries[1].text, "STRUCT_STRESS Cauchy");
        assert_eq!(io.entries[1].value_text(), "Cauchy");
        assert_eq!(io.span.map(|s| s.line), Some(4));
    }

    #[test]
    fn test_duplicate_sections_preserved_in_order() {
        let out = parse("--FUNCT\nA 1\n--FUNCT\nA 2\n");
        assert_eq!(names(&out.deck), vec!["FUNCT", "FUNCT"]);
        assert_eq!(out.deck.occurrences("FUNCT").count(), 2);
        assert_eq!(out.deck.sections[1].entries[0].value_text(), "2");
    }

    #[test]
    fn test_nested_headers() {
        let out = parse(
            "--DYN\nNUMSTEP 5\n--DYN/GENALPHA\nRHO_INF 0.5\n--OTHER/CHILD\nX 1\n",
        );
        assert!(out.diagnostics.is_empty());
        assert_eq!(names(&out.deck), vec!["DYN", "OTHER"]);
        let dyn_section = &out.deck.sections[0];
        assert_eq!(dyn_section.children.len(), 1);
        assert_eq!(dyn_section.children[0].path, "DYN/GENALPHA");
        assert_eq!(dyn_section.children[0].entries.len(), 1);

        let other = &out.deck.sections[1];
        assert!(other.implicit);
        assert!(other.span.is_none());
        assert_eq!(other.children[0].name, "CHILD");
        assert_eq!(out.deck.walk().len(), 4);
    }

    #[test]
    fn test_nested_header_attaches_to_latest_occurrence() {
        let out = parse("--F\n--F\n--F/G\nK v\n");
        assert!(out.deck.sections[0].children.is_empty());
        assert_eq!(out.deck.sections[1].children.len(), 1);
    }

    #[test]
    fn test_end_marker_stops_parsing() {
        let out = parse("--A\nK 1\n--END\n--B\nK 2\n");
        assert_eq!(names(&out.deck), vec!["A"]);

        let config = ParserConfig {
            end_marker: None,
            ..ParserConfig::default()
        };
        let out = DeckParser::new(&config).parse("--A\n--END\n--B\n");
        assert_eq!(names(&out.deck), vec!["A", "END", "B"]);
    }

    #[test]
    fn test_unterminated_quote_recovers() {
        let mut source = String::from("--IO\n");
        for i in 2..42 {
            source.push_str(&format!("K{} {}\n", i, i));
        }
        source.push_str("TITLE \"unterminated\n--MATERIALS\nMAT 1 MODEL elastic\n");

        let out = DeckParser::new(&ParserConfig::default())
            .with_file("deck.dat")
            .parse(&source);
        assert_eq!(out.diagnostics.len(), 1);
        let diag = &out.diagnostics.as_slice()[0];
        assert_eq!(diag.kind, DiagnosticKind::Syntax);
        assert_eq!(diag.pos.as_ref().map(|p| p.line), Some(42));
        assert_eq!(diag.path, "IO");
        assert_eq!(names(&out.deck), vec!["IO", "MATERIALS"]);
        assert_eq!(out.deck.sections[1].entries.len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        let out = parse("ORPHAN 1\n--A\n== BAD\nK 1\n--A/ /C\nLOST 1\n--B\nK 2\n");
        let lines: Vec<usize> = out
            .diagnostics
            .iter()
            .filter_map(|d| d.pos.as_ref().map(|p| p.line))
            .collect();
        assert_eq!(lines, vec![1, 3, 5]);
        assert!(out.diagnostics.iter().all(|d| d.kind == DiagnosticKind::Syntax));
        assert_eq!(names(&out.deck), vec!["A", "B"]);
        assert_eq!(out.deck.sections[0].entries.len(), 1);
        assert_eq!(out.deck.sections[1].entries.len(), 1);
    }

    #[test]
    fn test_parse_reader_rejects_invalid_utf8() {
        let config = ParserConfig::default();
        let bytes: &[u8] = b"--A\nK \xff\n";
        let err = DeckParser::new(&config).parse_reader(bytes).unwrap_err();
        assert!(matches!(err, DeckError::Encoding { offset: 6, .. }));

        let ok = DeckParser::new(&config).parse_reader(&b"--A\nK 1\n"[..]).unwrap();
        assert_eq!(ok.deck.entry_count(), 1);
    }
}
