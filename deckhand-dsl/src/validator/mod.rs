//! Validation & coercion engine.
//!
//! Walks a [`RawDeck`] against a [`SchemaVersion`] and produces a
//! [`TypedDeck`] plus diagnostics. Per-parameter problems never abort the
//! walk; the caller decides which severities are fatal.
//!
//! # Passes per section occurrence
//!
//! ```text
//! resolve section → coerce entries → conditions → uniqueness
//! ```
//!
//! Missing required sections are checked once the whole deck has been walked.

pub mod typed;

pub use typed::*;

use crate::lexer::{Span, Token};
use crate::parser::ast::span_pos;
use crate::parser::{RawDeck, RawEntry, RawSection};
use deckhand_core::{
    closest_match, coerce_tokens, Diagnostic, DiagnosticKind, Diagnostics, Layout, RecordLayout,
    SchemaVersion, SectionSpec, SourcePos, ValidationConfig, Value,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Validation result: a complete typed tree and every finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<'s> {
    pub deck: TypedDeck<'s>,
    pub diagnostics: Diagnostics,
}

impl Validated<'_> {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Validate with the default configuration.
pub fn validate<'s>(raw: &RawDeck, schema: &'s SchemaVersion) -> Validated<'s> {
    DeckValidator::new(schema).validate(raw)
}

/// Schema-driven validator. Holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct DeckValidator<'s> {
    schema: &'s SchemaVersion,
    config: ValidationConfig,
}

impl<'s> DeckValidator<'s> {
    pub fn new(schema: &'s SchemaVersion) -> Self {
        Self {
            schema,
            config: ValidationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &'s SchemaVersion {
        self.schema
    }

    pub fn validate(&self, raw: &RawDeck) -> Validated<'s> {
        let mut walk = Walk {
            schema: self.schema,
            config: self.config,
            file: raw.file.clone(),
            diagnostics: Diagnostics::new(),
            unique_seen: HashMap::new(),
        };

        let sections = walk.level(&raw.sections, Scope::Root, None);

        if !self.config.sections_only {
            for spec in self.schema.sections() {
                if spec.required && !raw.sections.iter().any(|s| s.name == spec.name) {
                    walk.diagnostics.push(Diagnostic::error(
                        DiagnosticKind::MissingSection,
                        spec.name.clone(),
                        format!("required section '{}' is missing", spec.name),
                    ));
                }
            }
        }

        let mut diagnostics = walk.diagnostics;
        if self.config.warnings_as_errors {
            diagnostics.escalate_warnings();
        }
        diagnostics.sort_by_position();

        tracing::debug!(
            sections = sections.len(),
            errors = diagnostics.error_count(),
            warnings = diagnostics.len() - diagnostics.error_count(),
            "validated deck"
        );

        Validated {
            deck: TypedDeck {
                file: raw.file.clone(),
                sections,
            },
            diagnostics,
        }
    }
}

// ============================================================================
// WALK
// ============================================================================

#[derive(Clone, Copy)]
enum Scope<'s> {
    Root,
    Known(&'s SectionSpec),
    Unknown,
}

struct Walk<'s> {
    schema: &'s SchemaVersion,
    config: ValidationConfig,
    file: Option<Arc<str>>,
    diagnostics: Diagnostics,
    /// (section path, parameter) → rendered value → path of first holder.
    unique_seen: HashMap<(String, String), HashMap<String, String>>,
}

/// Pseudo-parameter name under which record ids are checked for uniqueness.
const RECORD_ID: &str = "#id";

impl<'s> Walk<'s> {
    fn level(
        &mut self,
        raws: &[RawSection],
        scope: Scope<'s>,
        parent_display: Option<&str>,
    ) -> Vec<TypedSection<'s>> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut explicit: HashMap<&str, usize> = HashMap::new();
        let mut out = Vec::with_capacity(raws.len());

        for raw in raws {
            let occurrence = {
                let n = occurrences.entry(raw.name.as_str()).or_insert(0);
                *n += 1;
                *n
            };
            if !raw.implicit {
                *explicit.entry(raw.name.as_str()).or_insert(0) += 1;
            }

            let spec = match scope {
                Scope::Root => self.schema.section(&raw.name),
                Scope::Known(parent) => parent.subsection(&raw.name),
                Scope::Unknown => None,
            };

            let base = match parent_display {
                Some(p) => format!("{}/{}", p, raw.name),
                None => raw.name.clone(),
            };
            let label = match spec {
                Some(s) if s.is_repeatable() => format!("{}[{}]", base, occurrence),
                _ => base,
            };
            let header_pos = raw.span.and_then(|s| self.pos(&s));

            let body = match spec {
                None => {
                    let suggestion = match scope {
                        Scope::Root => closest_match(&raw.name, self.schema.section_names()),
                        Scope::Known(parent) => closest_match(
                            &raw.name,
                            parent.subsections().iter().map(|s| s.name.as_str()),
                        ),
                        Scope::Unknown => None,
                    };
                    let mut diag = Diagnostic::warning(
                        DiagnosticKind::UnknownSection,
                        label.clone(),
                        format!("unknown section '{}'; content kept unvalidated", raw.path),
                    )
                    .with_suggestion(suggestion);
                    diag.pos = header_pos.clone();
                    self.diagnostics.push(diag);
                    SectionBody::Unvalidated(raw.entries.clone())
                }
                Some(spec) => {
                    if !spec.is_repeatable()
                        && !raw.implicit
                        && explicit.get(raw.name.as_str()).copied().unwrap_or(0) > 1
                    {
                        let mut diag = Diagnostic::error(
                            DiagnosticKind::DuplicateSection,
                            label.clone(),
                            format!("section '{}' may occur only once", raw.path),
                        );
                        diag.pos = header_pos.clone();
                        self.diagnostics.push(diag);
                    }
                    match &spec.layout {
                        Layout::Keyed => SectionBody::Keyed(self.keyed(spec, raw, &label, header_pos.clone())),
                        Layout::Records(layout) => {
                            SectionBody::Records(self.records(spec, layout, raw, &label))
                        }
                    }
                }
            };

            let child_scope = match spec {
                Some(s) => Scope::Known(s),
                None => Scope::Unknown,
            };
            let children = self.level(&raw.children, child_scope, Some(&label));

            if let Some(spec) = spec {
                if !self.config.sections_only {
                    for sub in spec.subsections() {
                        if sub.required && !raw.children.iter().any(|c| c.name == sub.name) {
                            let mut diag = Diagnostic::error(
                                DiagnosticKind::MissingSection,
                                format!("{}/{}", label, sub.name),
                                format!("required section '{}/{}' is missing", raw.path, sub.name),
                            );
                            diag.pos = header_pos.clone();
                            self.diagnostics.push(diag);
                        }
                    }
                }
            }

            tracing::debug!(section = %label, entries = raw.entries.len(), "validated section");

            out.push(TypedSection {
                name: raw.name.clone(),
                path: raw.path.clone(),
                spec,
                span: raw.span,
                implicit: raw.implicit,
                occurrence,
                body,
                children,
            });
        }

        out
    }

    // ========================================================================
    // KEYED SECTIONS
    // ========================================================================

    fn keyed(
        &mut self,
        spec: &'s SectionSpec,
        raw: &RawSection,
        display: &str,
        header_pos: Option<SourcePos>,
    ) -> Vec<TypedEntry<'s>> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(raw.entries.len());

        for entry in &raw.entries {
            let Some((key, values)) = entry.tokens.split_first() else {
                continue;
            };
            let raw_text = entry.value_text().to_string();
            entries.push(self.entry(spec, key, values, raw_text, display, &mut seen));
        }

        self.conditions(spec, &entries, display, header_pos, !raw.implicit);
        self.uniqueness(spec, &raw.path, &entries, display);
        entries
    }

    // ========================================================================
    // RECORDS SECTIONS
    // ========================================================================

    fn records(
        &mut self,
        spec: &'s SectionSpec,
        layout: &RecordLayout,
        raw: &RawSection,
        display: &str,
    ) -> Vec<TypedRecord<'s>> {
        let mut records = Vec::with_capacity(raw.entries.len());

        for entry in &raw.entries {
            let id = self.record_id(layout, entry, display);
            let Some(id) = id else {
                records.push(TypedRecord {
                    id: None,
                    entries: Vec::new(),
                    text: entry.text.clone(),
                    span: entry.span,
                });
                continue;
            };

            let record_path = format!("{}.{}[{}]", display, layout.keyword, id);
            if layout.unique_ids {
                let pos = entry.tokens.get(1).and_then(|t| self.pos(&t.span));
                self.check_unique(&raw.path, RECORD_ID, id.to_string(), &record_path, pos, || {
                    format!("duplicate {} id {}", layout.keyword, id)
                });
            }

            let mut seen = HashSet::new();
            let mut entries = Vec::new();
            let tokens = &entry.tokens;
            let mut i = 2;
            while i < tokens.len() {
                // Known keys take exactly `size` values; unknown keys run to
                // the next bare known name.
                let j = match spec.parameter(&tokens[i].text) {
                    Some(param) => (i + 1 + param.size).min(tokens.len()),
                    None => {
                        let mut j = i + 1;
                        while j < tokens.len()
                            && (tokens[j].quoted || spec.parameter(&tokens[j].text).is_none())
                        {
                            j += 1;
                        }
                        j
                    }
                };
                let values = &tokens[i + 1..j];
                let raw_text = slice_tokens(entry, values);
                entries.push(self.entry(spec, &tokens[i], values, raw_text, &record_path, &mut seen));
                i = j;
            }

            let anchor = self.pos(&entry.span);
            self.conditions(spec, &entries, &record_path, anchor, true);
            self.uniqueness(spec, &raw.path, &entries, &record_path);

            records.push(TypedRecord {
                id: Some(id),
                entries,
                text: entry.text.clone(),
                span: entry.span,
            });
        }

        records
    }

    /// Check `KEYWORD id` at the start of a record line.
    fn record_id(&mut self, layout: &RecordLayout, entry: &RawEntry, display: &str) -> Option<i64> {
        let keyword = entry.tokens.first()?;
        if keyword.text != layout.keyword {
            let diag = Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                display.to_string(),
                format!(
                    "expected record keyword '{}', found '{}'",
                    layout.keyword, keyword.text
                ),
            );
            self.push_at(diag, &keyword.span);
            return None;
        }

        let Some(id_token) = entry.tokens.get(1) else {
            let diag = Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                format!("{}.{}", display, layout.keyword),
                "record is missing its integer id",
            );
            self.push_at(diag, &keyword.span);
            return None;
        };

        match id_token.text.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                let diag = Diagnostic::error(
                    DiagnosticKind::TypeMismatch,
                    format!("{}.{}", display, layout.keyword),
                    format!("record id must be an integer, found '{}'", id_token.text),
                );
                self.push_at(diag, &id_token.span);
                None
            }
        }
    }

    // ========================================================================
    // SHARED CHECKS
    // ========================================================================

    /// Resolve and coerce one key with its value tokens.
    fn entry(
        &mut self,
        spec: &'s SectionSpec,
        key: &Token,
        values: &[Token],
        raw: String,
        owner: &str,
        seen: &mut HashSet<String>,
    ) -> TypedEntry<'s> {
        let path = format!("{}.{}", owner, key.text);
        let value_span = match (values.first(), values.last()) {
            (Some(first), Some(last)) => Span {
                start: first.span.start,
                end: last.span.end,
                line: first.span.line,
                column: first.span.column,
            },
            _ => key.span,
        };

        let status = if !seen.insert(key.text.clone()) {
            let diag = Diagnostic::error(
                DiagnosticKind::DuplicateParameter,
                path,
                format!("parameter '{}' is given more than once", key.text),
            );
            self.push_at(diag, &key.span);
            EntryStatus::Invalid
        } else {
            match spec.parameter(&key.text) {
                None => {
                    let suggestion = closest_match(
                        &key.text,
                        spec.parameters().iter().map(|p| p.name.as_str()),
                    );
                    let diag = Diagnostic::warning(
                        DiagnosticKind::UnknownParameter,
                        path,
                        format!("unknown parameter '{}'; value kept verbatim", key.text),
                    )
                    .with_suggestion(suggestion);
                    self.push_at(diag, &key.span);
                    EntryStatus::Unknown
                }
                Some(param) => {
                    let texts: Vec<&str> = values.iter().map(|t| t.text.as_str()).collect();
                    match coerce_tokens(param, &texts) {
                        Ok(value) => EntryStatus::Valid(TypedValue {
                            value,
                            spec: param,
                            span: value_span,
                        }),
                        Err(err) => {
                            let diag = Diagnostic::error(
                                err.kind,
                                path,
                                format!("{} (expected {})", err.message, param.expectation()),
                            )
                            .with_suggestion(err.suggestion);
                            self.push_at(diag, &value_span);
                            EntryStatus::Invalid
                        }
                    }
                }
            }
        };

        TypedEntry {
            key: key.text.clone(),
            status,
            span: key.span,
            raw,
        }
    }

    /// Evaluate validity conditions and requiredness for one owner (section
    /// occurrence or record).
    fn conditions(
        &mut self,
        spec: &'s SectionSpec,
        entries: &[TypedEntry<'s>],
        owner: &str,
        anchor: Option<SourcePos>,
        check_required: bool,
    ) {
        let mut by_key: HashMap<&str, &TypedEntry<'s>> = HashMap::new();
        for entry in entries {
            by_key.entry(entry.key.as_str()).or_insert(entry);
        }
        let invalid: HashSet<&str> = entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Invalid))
            .map(|e| e.key.as_str())
            .collect();
        let lookup = |name: &str| -> Option<Value> {
            match by_key.get(name).and_then(|e| e.value()) {
                Some(v) => Some(v.clone()),
                None => spec.parameter(name).and_then(|p| p.default.clone()),
            }
        };

        let mut found = Vec::new();
        for param in spec.parameters() {
            let active = match &param.condition {
                None => true,
                Some(condition) => {
                    if condition.references().iter().any(|r| invalid.contains(r)) {
                        continue;
                    }
                    condition.holds(&lookup)
                }
            };

            match by_key.get(param.name.as_str()) {
                Some(entry) if !active => {
                    let condition = param.condition.as_ref().map(|c| c.source()).unwrap_or("");
                    let mut diag = Diagnostic::warning(
                        DiagnosticKind::ConditionallyIrrelevant,
                        format!("{}.{}", owner, param.name),
                        format!("condition '{}' does not hold; value is ignored", condition),
                    );
                    diag.pos = self.pos(&entry.span);
                    found.push(diag);
                }
                None if active && check_required && param.required && param.default.is_none() => {
                    let reason = match &param.condition {
                        Some(c) => format!("required parameter is missing (condition '{}' holds)", c.source()),
                        None => "required parameter is missing".to_string(),
                    };
                    let mut diag = Diagnostic::error(
                        DiagnosticKind::MissingRequired,
                        format!("{}.{}", owner, param.name),
                        reason,
                    );
                    diag.pos = anchor.clone();
                    found.push(diag);
                }
                _ => {}
            }
        }

        for diag in found {
            self.diagnostics.push(diag);
        }
    }

    fn uniqueness(
        &mut self,
        spec: &'s SectionSpec,
        scope: &str,
        entries: &[TypedEntry<'s>],
        owner: &str,
    ) {
        for entry in entries {
            let EntryStatus::Valid(typed) = &entry.status else {
                continue;
            };
            if !spec.parameter(&entry.key).is_some_and(|p| p.unique) {
                continue;
            }
            let path = format!("{}.{}", owner, entry.key);
            let pos = self.pos(&typed.span);
            self.check_unique(scope, &entry.key, typed.value.to_string(), &path, pos, || {
                format!("value {} of '{}' is not unique", typed.value, entry.key)
            });
        }
    }

    fn check_unique(
        &mut self,
        scope: &str,
        param: &str,
        rendered: String,
        path: &str,
        pos: Option<SourcePos>,
        message: impl FnOnce() -> String,
    ) {
        let holders = self
            .unique_seen
            .entry((scope.to_string(), param.to_string()))
            .or_default();
        match holders.get(&rendered) {
            Some(first) => {
                let mut diag = Diagnostic::error(
                    DiagnosticKind::UniquenessViolation,
                    path.to_string(),
                    format!("{}; first used at {}", message(), first),
                );
                diag.pos = pos;
                self.diagnostics.push(diag);
            }
            None => {
                holders.insert(rendered, path.to_string());
            }
        }
    }

    fn pos(&self, span: &Span) -> Option<SourcePos> {
        span_pos(self.file.clone(), span)
    }

    fn push_at(&mut self, mut diag: Diagnostic, span: &Span) {
        diag.pos = self.pos(span);
        self.diagnostics.push(diag);
    }
}

/// Verbatim text covered by `tokens` within `entry`.
fn slice_tokens(entry: &RawEntry, tokens: &[Token]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => {
            let start = first.span.start - entry.span.start;
            let end = last.span.end - entry.span.start;
            entry.text.get(start..end).unwrap_or_default().to_string()
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use deckhand_core::metadata::load_str;

    const SCHEMA: &str = r#"
version: t1
sections:
  - name: PROBLEM TYPE
    required: true
    parameters:
      - { name: PROBLEMTYPE, type: enum, choices: [Structure, Fluid], required: true }
  - name: DYN
    parameters:
      - { name: DYNAMICTYPE, type: enum, choices: [Statics, OneStepTheta], default: Statics }
      - { name: NUMSTEP, type: integer, min: 1 }
      - { name: THETA, type: real, min: 0, max: 1, condition: "DYNAMICTYPE == 'OneStepTheta'" }
    subsections:
      - name: GENALPHA
        parameters:
          - { name: RHO_INF, type: real, min: 0, max: 1 }
  - name: MATERIALS
    records: { keyword: MAT, unique_ids: true }
    parameters:
      - { name: MODEL, type: enum, choices: [elastic, plastic], required: true }
      - { name: YIELD, type: real, min: 0, condition: "MODEL == 'plastic'" }
      - { name: LABEL, type: string }
  - name: FUNCT
    repeatable: true
    parameters:
      - { name: NAME, type: string, unique: true }
"#;

    fn run(deck: &str) -> (Diagnostics, usize) {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse(deck);
        assert!(parsed.diagnostics.is_empty(), "{}", parsed.diagnostics);
        let validated = validate(&parsed.deck, &schema);
        let count = validated.deck.sections.len();
        (validated.diagnostics, count)
    }

    fn kinds(diags: &Diagnostics) -> Vec<(DiagnosticKind, String)> {
        diags.iter().map(|d| (d.kind, d.path.clone())).collect()
    }

    #[test]
    fn test_valid_deck_has_no_errors() {
        let (diags, count) = run(
            "--PROBLEM TYPE\nPROBLEMTYPE Structure\n--DYN\nNUMSTEP 10\n--DYN/GENALPHA\nRHO_INF 0.9\n\
             --MATERIALS\nMAT 1 MODEL elastic\nMAT 2 MODEL plastic YIELD 250.0\n",
        );
        assert!(diags.is_empty(), "{}", diags);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_record_domain_violation_path() {
        let (diags, _) = run("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--MATERIALS\nMAT 1 MODEL plastic YIELD -5\n");
        assert_eq!(
            kinds(&diags),
            vec![(DiagnosticKind::DomainViolation, "MATERIALS.MAT[1].YIELD".to_string())]
        );
        assert_eq!(diags.as_slice()[0].pos.as_ref().map(|p| p.line), Some(4));
    }

    #[test]
    fn test_conditions() {
        // THETA present while DYNAMICTYPE defaults to Statics.
        let (diags, _) = run("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--DYN\nTHETA 0.5\n");
        assert_eq!(
            kinds(&diags),
            vec![(DiagnosticKind::ConditionallyIrrelevant, "DYN.THETA".to_string())]
        );
        assert!(!diags.has_errors());

        let (diags, _) = run("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--DYN\nDYNAMICTYPE OneStepTheta\n");
        assert_eq!(
            kinds(&diags),
            vec![(DiagnosticKind::MissingRequired, "DYN.THETA".to_string())]
        );

        // Condition false and parameter absent: nothing to report.
        let (diags, _) = run("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--DYN\nNUMSTEP 1\n");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_record_values_may_spell_parameter_names() {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse(
            "--PROBLEM TYPE\nPROBLEMTYPE Structure\n--MATERIALS\nMAT 1 LABEL MODEL MODEL elastic\n\
             MAT 2 MODEL plastic NOTE \"YIELD\" x YIELD 1.5\n",
        );
        let result = validate(&parsed.deck, &schema);
        assert_eq!(
            kinds(&result.diagnostics),
            vec![(DiagnosticKind::UnknownParameter, "MATERIALS.MAT[2].NOTE".to_string())]
        );

        let mats = result.deck.section("MATERIALS").unwrap();
        let first = mats.record(1).unwrap();
        assert_eq!(first.value("LABEL"), Some(&Value::Str("MODEL".into())));
        assert_eq!(first.value("MODEL"), Some(&Value::Str("elastic".into())));

        let second = mats.record(2).unwrap();
        let note = second.entries.iter().find(|e| e.key == "NOTE").unwrap();
        assert_eq!(note.raw, "\"YIELD\" x");
        assert_eq!(second.value("YIELD"), Some(&Value::Real(1.5)));
    }

    #[test]
    fn test_condition_skipped_when_reference_invalid() {
        let (diags, _) = run("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--MATERIALS\nMAT 1 MODEL plastik\n");
        let found = kinds(&diags);
        assert_eq!(
            found,
            vec![(DiagnosticKind::DomainViolation, "MATERIALS.MAT[1].MODEL".to_string())]
        );
        assert_eq!(diags.as_slice()[0].suggestion.as_deref(), Some("plastic"));
    }

    #[test]
    fn test_unknowns_are_warnings() {
        let (diags, _) = run(
            "--PROBLEM TYPE\nPROBLEMTYPE Structure\nPROBLEMTYP Fluid\n--MATERIAL\nMAT 1 MODEL elastic\n",
        );
        assert!(!diags.has_errors());
        let found = kinds(&diags);
        assert_eq!(
            found,
            vec![
                (DiagnosticKind::UnknownParameter, "PROBLEM TYPE.PROBLEMTYP".to_string()),
                (DiagnosticKind::UnknownSection, "MATERIAL".to_string()),
            ]
        );
        assert_eq!(diags.as_slice()[0].suggestion.as_deref(), Some("PROBLEMTYPE"));
        assert_eq!(diags.as_slice()[1].suggestion.as_deref(), Some("MATERIALS"));
    }

    #[test]
    fn test_duplicates_and_uniqueness() {
        let (diags, _) = run(
            "--PROBLEM TYPE\nPROBLEMTYPE Structure\n--DYN\nNUMSTEP 1\nNUMSTEP 2\n--DYN\n\
             --FUNCT\nNAME a\n--FUNCT\nNAME a\n--MATERIALS\nMAT 1 MODEL elastic\nMAT 1 MODEL elastic\n",
        );
        assert_eq!(
            kinds(&diags),
            vec![
                (DiagnosticKind::DuplicateParameter, "DYN.NUMSTEP".to_string()),
                (DiagnosticKind::DuplicateSection, "DYN".to_string()),
                (DiagnosticKind::UniquenessViolation, "FUNCT[2].NAME".to_string()),
                (DiagnosticKind::UniquenessViolation, "MATERIALS.MAT[1]".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_section_and_sections_only() {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse("--DYN\nNUMSTEP 1\n");
        let strict = validate(&parsed.deck, &schema);
        assert_eq!(
            kinds(&strict.diagnostics),
            vec![(DiagnosticKind::MissingSection, "PROBLEM TYPE".to_string())]
        );

        let relaxed = DeckValidator::new(&schema)
            .with_config(ValidationConfig {
                sections_only: true,
                ..ValidationConfig::default()
            })
            .validate(&parsed.deck);
        assert!(relaxed.diagnostics.is_empty());
    }

    #[test]
    fn test_record_header_errors() {
        let (diags, _) = run(
            "--PROBLEM TYPE\nPROBLEMTYPE Structure\n--MATERIALS\nMATT 1 MODEL elastic\nMAT x MODEL elastic\n",
        );
        assert_eq!(
            kinds(&diags),
            vec![
                (DiagnosticKind::TypeMismatch, "MATERIALS".to_string()),
                (DiagnosticKind::TypeMismatch, "MATERIALS.MAT".to_string()),
            ]
        );
    }

    #[test]
    fn test_warnings_as_errors() {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--EXTRA\nA 1\n");
        let result = DeckValidator::new(&schema)
            .with_config(ValidationConfig {
                warnings_as_errors: true,
                ..ValidationConfig::default()
            })
            .validate(&parsed.deck);
        assert!(result.has_errors());
    }

    #[test]
    fn test_idempotent() {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse("--DYN\nTHETA 2\nFOO bar\n--NOPE\nx\n");
        let first = validate(&parsed.deck, &schema);
        let second = validate(&parsed.deck, &schema);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.deck, second.deck);
    }

    #[test]
    fn test_typed_tree_access() {
        let schema = load_str(SCHEMA).unwrap();
        let parsed = parse("--PROBLEM TYPE\nPROBLEMTYPE Fluid\n--DYN/GENALPHA\nRHO_INF 0.25\n--MATERIALS\nMAT 7 MODEL elastic UNKNOWN \"a b\"\n");
        let result = validate(&parsed.deck, &schema);
        assert_eq!(
            result.deck.value("PROBLEM TYPE", "PROBLEMTYPE"),
            Some(&Value::Str("Fluid".into()))
        );
        assert_eq!(result.deck.value("DYN/GENALPHA", "RHO_INF"), Some(&Value::Real(0.25)));
        let mats = result.deck.section("MATERIALS").unwrap();
        let record = mats.record(7).unwrap();
        assert_eq!(record.value("MODEL"), Some(&Value::Str("elastic".into())));
        let unknown = record.entries.iter().find(|e| e.key == "UNKNOWN").unwrap();
        assert_eq!(unknown.raw, "\"a b\"");
        assert!(result.deck.section("DYN").unwrap().implicit);
    }
}
