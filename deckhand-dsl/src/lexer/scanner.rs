//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

// ============================================================================
// LINE LEXER
// ============================================================================

/// Splits a deck into lines and classifies each one in a single pass.
pub struct Lexer<'a> {
    source: &'a str,
    comment_markers: &'a [String],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str, comment_markers: &'a [String]) -> Self {
        Self {
            source,
            comment_markers,
            pos: 0,
            line: 1,
        }
    }

    /// Lex the entire source into a vector of lines.
    pub fn tokenize(&mut self) -> Vec<Line> {
        self.by_ref().collect()
    }
}

impl Iterator for Lexer<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.pos >= self.source.len() {
            return None;
        }

        let rest = &self.source[self.pos..];
        let (raw, consumed) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let line = LineScanner::new(raw, self.pos, self.line, self.comment_markers).scan();
        self.pos += consumed;
        self.line += 1;
        Some(line)
    }
}

// ============================================================================
// SINGLE LINE SCANNER
// ============================================================================

struct LineScanner<'a> {
    text: &'a str,
    base: usize,
    line: usize,
    chars: Peekable<CharIndices<'a>>,
    column: usize,
    comment_markers: &'a [String],
}

impl<'a> LineScanner<'a> {
    fn new(text: &'a str, base: usize, line: usize, comment_markers: &'a [String]) -> Self {
        Self {
            text,
            base,
            line,
            chars: text.char_indices().peekable(),
            column: 1,
            comment_markers,
        }
    }

    fn scan(mut self) -> Line {
        self.skip_whitespace();
        let idx = self.index();
        let rest = &self.text[idx..];

        if rest.is_empty() || self.at_comment(idx) {
            return self.whole_line(LineKind::Blank);
        }
        if rest.starts_with("--") {
            return self.scan_header();
        }
        if rest.starts_with("==") || rest.starts_with("**") {
            let column = self.column;
            return self.whole_line(LineKind::Error {
                message: format!("unknown section marker '{}'", &rest[..2]),
                column,
            });
        }
        self.scan_entry()
    }

    /// Scan `--...-- NAME`.
    fn scan_header(mut self) -> Line {
        let header_column = self.column;
        while self.peek_char() == Some('-') {
            self.advance();
        }
        self.skip_whitespace();

        let name_start = self.index();
        let name_column = self.column;
        let mut name_end = name_start;
        while let Some((idx, _)) = self.chars.peek().copied() {
            if self.at_comment(idx) {
                break;
            }
            self.advance();
            name_end = self.index();
        }

        let raw_name = &self.text[name_start..name_end];
        let name = raw_name.trim_end();
        if name.is_empty() {
            return self.whole_line(LineKind::Error {
                message: "section header has no name".to_string(),
                column: header_column,
            });
        }

        Line {
            kind: LineKind::Header {
                name: name.to_string(),
            },
            span: Span {
                start: self.base + name_start,
                end: self.base + name_start + name.len(),
                line: self.line,
                column: name_column,
            },
        }
    }

    /// Scan `token (WS+ token)* comment?`.
    fn scan_entry(mut self) -> Line {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            self.skip_whitespace();
            let Some((idx, c)) = self.chars.peek().copied() else {
                break;
            };
            if self.at_comment(idx) {
                break;
            }

            let token = if c == '"' {
                match self.scan_quoted() {
                    Ok(token) => token,
                    Err(column) => {
                        return self.whole_line(LineKind::Error {
                            message: "unterminated quoted string".to_string(),
                            column,
                        })
                    }
                }
            } else {
                self.scan_bare()
            };
            tokens.push(token);
        }

        // The first character was neither whitespace nor a comment, so at
        // least one token exists.
        let (first, last) = match (tokens.first(), tokens.last()) {
            (Some(f), Some(l)) => (f.span, l.span),
            _ => return self.whole_line(LineKind::Blank),
        };
        let text = self.text[first.start - self.base..last.end - self.base].to_string();

        Line {
            kind: LineKind::Entry { text, tokens },
            span: Span {
                start: first.start,
                end: last.end,
                line: self.line,
                column: first.column,
            },
        }
    }

    fn scan_bare(&mut self) -> Token {
        let start = self.index();
        let column = self.column;

        while let Some((idx, c)) = self.chars.peek().copied() {
            if c.is_whitespace() || c == '"' || self.at_comment(idx) {
                break;
            }
            self.advance();
        }

        let end = self.index();
        Token {
            text: self.text[start..end].to_string(),
            quoted: false,
            span: self.span(start, end, column),
        }
    }

    /// Scan a quoted token with escape sequences. On failure returns the
    /// column of the opening quote.
    fn scan_quoted(&mut self) -> Result<Token, usize> {
        let start = self.index();
        let column = self.column;
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None => return Err(column),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        let end = self.index();
        Ok(Token {
            text: value,
            quoted: true,
            span: self.span(start, end, column),
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn whole_line(&self, kind: LineKind) -> Line {
        Line {
            kind,
            span: self.span(0, self.text.len(), 1),
        }
    }

    fn span(&self, start: usize, end: usize, column: usize) -> Span {
        Span {
            start: self.base + start,
            end: self.base + end,
            line: self.line,
            column,
        }
    }

    fn at_comment(&self, idx: usize) -> bool {
        let rest = &self.text[idx..];
        self.comment_markers
            .iter()
            .any(|m| !m.is_empty() && rest.starts_with(m.as_str()))
    }

    fn index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.text.len())
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.column += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Line> {
        let markers = vec!["//".to_string()];
        Lexer::new(source, &markers).tokenize()
    }

    fn texts(line: &Line) -> Vec<&str> {
        match &line.kind {
            LineKind::Entry { tokens, .. } => tokens.iter().map(|t| t.text.as_str()).collect(),
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_header_and_entries() {
        let lines = lex("--------PROBLEM TYPE\nPROBLEMTYPE  Structure // comment\n\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0].kind,
            LineKind::Header {
                name: "PROBLEM TYPE".to_string()
            }
        );
        assert_eq!(lines[0].span.column, 9);
        assert_eq!(texts(&lines[1]), vec!["PROBLEMTYPE", "Structure"]);
        match &lines[1].kind {
            LineKind::Entry { text, .. } => assert_eq!(text, "PROBLEMTYPE  Structure"),
            _ => unreachable!(),
        }
        assert_eq!(lines[1].number(), 2);
        assert_eq!(lines[2].kind, LineKind::Blank);
    }

    #[test]
    fn test_quoted_tokens_keep_whitespace_and_markers() {
        let lines = lex("NAME \"two words // not a comment\" tail\r\n");
        let tokens = match &lines[0].kind {
            LineKind::Entry { tokens, .. } => tokens.clone(),
            _ => panic!("expected entry"),
        };
        assert_eq!(tokens[1].text, "two words // not a comment");
        assert!(tokens[1].quoted);
        assert_eq!(tokens[2].text, "tail");
        assert_eq!(tokens[2].span.column, 35);
    }

    #[test]
    fn test_escapes() {
        let lines = lex(r#"K "a\"b\\c\nd""#);
        assert_eq!(texts(&lines[0]), vec!["K", "a\"b\\c\nd"]);
    }

    #[test]
    fn test_unterminated_quote() {
        let lines = lex("A 1\nB \"open\nC 2");
        assert_eq!(
            lines[1].kind,
            LineKind::Error {
                message: "unterminated quoted string".to_string(),
                column: 3
            }
        );
        assert_eq!(lines[1].number(), 2);
        assert_eq!(texts(&lines[2]), vec!["C", "2"]);
    }

    #[test]
    fn test_comment_inside_bare_token() {
        let lines = lex("PATH a//b\n   // only a comment\n");
        assert_eq!(texts(&lines[0]), vec!["PATH", "a"]);
        assert_eq!(lines[1].kind, LineKind::Blank);
    }

    #[test]
    fn test_malformed_markers() {
        let lines = lex("== FOO\n** BAR\n--   \n");
        assert!(matches!(lines[0].kind, LineKind::Error { column: 1, .. }));
        assert!(matches!(lines[1].kind, LineKind::Error { .. }));
        assert!(matches!(
            lines[2].kind,
            LineKind::Error { ref message, .. } if message.contains("no name")
        ));
    }

    #[test]
    fn test_spans_are_absolute() {
        let source = "--A\nKEY value\n";
        let lines = lex(source);
        let tokens = match &lines[1].kind {
            LineKind::Entry { tokens, .. } => tokens.clone(),
            _ => panic!("expected entry"),
        };
        assert_eq!(&source[tokens[1].span.start..tokens[1].span.end], "value");
        assert_eq!(&source[lines[0].span.start..lines[0].span.end], "A");
    }

    #[test]
    fn test_negative_numbers_are_not_headers() {
        let lines = lex("YIELD -5\n-1 2 3\n");
        assert_eq!(texts(&lines[0]), vec!["YIELD", "-5"]);
        assert_eq!(texts(&lines[1]), vec!["-1", "2", "3"]);
    }
}
