//! Single-deck processing pipeline.
//!
//! ```text
//! legacy text ─parse─▶ RawDeck ─validate─▶ TypedDeck ─convert─▶ StructuredTree
//! StructuredTree ─from_structured─▶ RawDeck ─print─▶ legacy text
//! ```
//!
//! A [`Session`] borrows one schema and owns one configuration; every call is
//! independent.

use crate::converter::{from_structured_with, to_structured, ConvertOptions, Converted};
use crate::document::StructuredTree;
use crate::error::{DeckError, DeckResult};
use crate::parser::{DeckParser, RawDeck};
use crate::pretty_printer::print_deck;
use crate::validator::{DeckValidator, TypedDeck};
use deckhand_core::{DeckConfig, Diagnostics, SchemaVersion};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Outcome of checking one deck.
#[derive(Debug, Clone, PartialEq)]
pub struct Report<'s> {
    pub raw: RawDeck,
    pub typed: TypedDeck<'s>,
    /// Syntax and validation findings, ordered by position.
    pub diagnostics: Diagnostics,
}

impl Report<'_> {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

#[derive(Debug, Clone)]
pub struct Session<'s> {
    schema: &'s SchemaVersion,
    config: DeckConfig,
}

impl<'s> Session<'s> {
    pub fn new(schema: &'s SchemaVersion) -> Self {
        Self {
            schema,
            config: DeckConfig::default(),
        }
    }

    /// Use `config`, rejecting invalid values.
    pub fn with_config(mut self, config: DeckConfig) -> DeckResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn schema(&self) -> &'s SchemaVersion {
        self.schema
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::from_config(&self.config)
    }

    /// Parse and validate deck text. `file` names the source in diagnostics.
    pub fn check_str(&self, source: &str, file: Option<&str>) -> Report<'s> {
        let parser = DeckParser::new(&self.config.parser);
        let parsed = match file {
            Some(name) => parser.with_file(name).parse(source),
            None => parser.parse(source),
        };
        self.finish(parsed.deck, parsed.diagnostics)
    }

    pub fn check_file(&self, path: impl AsRef<Path>) -> DeckResult<Report<'s>> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| DeckError::Io {
            path: name.clone(),
            source,
        })?;
        let parsed = DeckParser::new(&self.config.parser)
            .with_file(name.as_str())
            .parse_reader(BufReader::new(file))?;
        Ok(self.finish(parsed.deck, parsed.diagnostics))
    }

    /// Validate an already parsed deck.
    pub fn check_raw(&self, raw: RawDeck) -> Report<'s> {
        self.finish(raw, Diagnostics::new())
    }

    /// Legacy text to structured tree. Findings are returned, not raised.
    pub fn to_structured_str(&self, source: &str, file: Option<&str>) -> Converted {
        let report = self.check_str(source, file);
        self.convert(&report)
    }

    pub fn to_structured_file(&self, path: impl AsRef<Path>) -> DeckResult<Converted> {
        let report = self.check_file(path)?;
        Ok(self.convert(&report))
    }

    pub fn convert(&self, report: &Report<'s>) -> Converted {
        Converted {
            tree: to_structured(&report.typed, self.schema, &self.convert_options()),
            diagnostics: report.diagnostics.clone(),
        }
    }

    /// Structured tree to legacy text. Fails only on shape errors.
    pub fn to_legacy(&self, tree: &StructuredTree) -> DeckResult<String> {
        let raw = from_structured_with(tree, self.schema, &self.convert_options())?;
        Ok(print_deck(&raw, &self.config.emit))
    }

    /// Validate a structured tree through its legacy form. Diagnostics carry
    /// no source positions.
    pub fn check_tree(&self, tree: &StructuredTree) -> DeckResult<Report<'s>> {
        let raw = from_structured_with(tree, self.schema, &self.convert_options())?;
        Ok(self.check_raw(raw))
    }

    fn finish(&self, raw: RawDeck, mut diagnostics: Diagnostics) -> Report<'s> {
        let validated = DeckValidator::new(self.schema)
            .with_config(self.config.validation)
            .validate(&raw);
        diagnostics.extend(validated.diagnostics);
        if self.config.validation.warnings_as_errors {
            diagnostics.escalate_warnings();
        }
        diagnostics.sort_by_position();

        tracing::debug!(
            file = raw.file.as_deref().unwrap_or("<memory>"),
            errors = diagnostics.error_count(),
            total = diagnostics.len(),
            "checked deck"
        );

        Report {
            typed: validated.deck,
            raw,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::metadata::load_str;
    use deckhand_core::DiagnosticKind;
    use std::io::Write;

    const SCHEMA: &str = r#"
version: s1
sections:
  - name: IO
    required: true
    parameters:
      - { name: OUTPUT, type: path }
      - { name: STEPS, type: integer, min: 1 }
"#;

    #[test]
    fn test_check_merges_syntax_and_validation() {
        let schema = load_str(SCHEMA).unwrap();
        let session = Session::new(&schema);
        let report = session.check_str("--IO\nSTEPS 0\nOUTPUT \"unterminated\n", Some("deck.dat"));
        let kinds: Vec<_> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::DomainViolation, DiagnosticKind::Syntax]);
        let pos = report.diagnostics.as_slice()[0].pos.as_ref().unwrap();
        assert_eq!(pos.file.as_deref(), Some("deck.dat"));
        assert_eq!(pos.line, 2);
    }

    #[test]
    fn test_legacy_structured_legacy() {
        let schema = load_str(SCHEMA).unwrap();
        let session = Session::new(&schema);
        let converted = session.to_structured_str("--IO\nOUTPUT out/dir\nSTEPS 5\n", None);
        assert!(converted.diagnostics.is_empty());

        let text = session.to_legacy(&converted.tree).unwrap();
        let again = session.check_str(&text, None);
        assert!(again.diagnostics.is_empty(), "{}", again.diagnostics);
        assert_eq!(
            again.typed.value("IO", "STEPS"),
            Some(&deckhand_core::Value::Integer(5))
        );
    }

    #[test]
    fn test_config_controls_pipeline() {
        let schema = load_str(SCHEMA).unwrap();
        let config = DeckConfig::from_toml_str(
            "[parser]\ncomment_markers = [\"#\"]\n[validation]\nwarnings_as_errors = true\n",
        )
        .unwrap();
        let session = Session::new(&schema).with_config(config).unwrap();
        let report = session.check_str("--IO\nSTEPS 2 # two\nEXTRA 1\n", None);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.has_errors());

        let mut bad = DeckConfig::default();
        bad.emit.header_width = 0;
        assert!(matches!(
            Session::new(&schema).with_config(bad),
            Err(DeckError::Config(_))
        ));
    }

    #[test]
    fn test_check_file_and_tree() {
        let schema = load_str(SCHEMA).unwrap();
        let session = Session::new(&schema);

        let path = std::env::temp_dir().join(format!("deckhand-session-{}.dat", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(b"--IO\nSTEPS 3\n").unwrap();
        }
        let report = session.check_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!report.has_errors());

        let missing = session.check_file(path.with_extension("missing"));
        assert!(matches!(missing, Err(DeckError::Io { .. })));

        let tree = StructuredTree::from_yaml_str("IO: { STEPS: 0 }\n").unwrap();
        let report = session.check_tree(&tree).unwrap();
        assert_eq!(report.diagnostics.error_count(), 1);
        assert!(report.diagnostics.as_slice()[0].pos.is_none());
    }
}
