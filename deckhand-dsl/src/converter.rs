//! Structured converter.
//!
//! Forward: [`TypedDeck`] → [`StructuredTree`]. Reverse: [`StructuredTree`] →
//! [`RawDeck`], which the legacy printer turns back into text.
//!
//! # Shapes
//!
//! ```text
//! keyed section         → mapping (sub-sections nested by short name)
//! repeated section      → list of the shapes above
//! records section       → list of mappings, keyword first, or raw strings
//! unknown section       → list of raw line strings
//! child of records/unknown section → root key "PARENT/CHILD"
//! child named like a key of its keyed parent → root key "PARENT/CHILD"
//! ```
//!
//! A hoisted key names the last occurrence of each parent. Any other
//! occurrence is written `NAME[k]` (1-based), so `EXTRA[1]/NOTES` belongs to
//! the first of several `EXTRA` sections.

use crate::document::StructuredTree;
use crate::error::ConvertError;
use crate::lexer::{Lexer, LineKind, Span, Token};
use crate::parser::{RawDeck, RawEntry, RawSection};
use crate::validator::{
    validate, EntryStatus, SectionBody, TypedDeck, TypedEntry, TypedRecord, TypedSection,
};
use deckhand_core::{
    coerce_native, escape_string, native_tokens, quote_token, DeckConfig, Diagnostics, Layout, ParameterSpec,
    SchemaVersion, SectionSpec, Value,
};
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::HashMap;

/// Mapping key holding the original key order.
pub const ORDER_KEY: &str = "__order__";

/// Conversion options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Write [`ORDER_KEY`] into every mapping.
    pub record_order: bool,
    /// Markers the generated legacy text must avoid in bare tokens.
    pub comment_markers: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            record_order: false,
            comment_markers: vec!["//".to_string()],
        }
    }
}

impl ConvertOptions {
    pub fn from_config(config: &DeckConfig) -> Self {
        Self {
            record_order: config.emit.record_order,
            comment_markers: config.parser.comment_markers.clone(),
        }
    }
}

/// A structured tree and the validation findings of the deck it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub tree: StructuredTree,
    pub diagnostics: Diagnostics,
}

// ============================================================================
// FORWARD
// ============================================================================

/// Convert a validated deck into a structured tree.
pub fn to_structured(deck: &TypedDeck<'_>, schema: &SchemaVersion, options: &ConvertOptions) -> StructuredTree {
    let mut forward = Forward {
        options,
        hoisted: Vec::new(),
    };
    let mut root = Mapping::new();
    let mut order = Vec::new();

    for (name, group) in group_by_name(deck.sections.iter()) {
        let value = forward.group_value(name, &group);
        insert_first(&mut root, &mut order, name, value);
    }

    // Hoisted sections may hoist their own children in turn.
    while !forward.hoisted.is_empty() {
        for (key, group) in std::mem::take(&mut forward.hoisted) {
            let value = forward.group_value(&key, &group);
            insert_first(&mut root, &mut order, &key, value);
        }
    }

    if options.record_order {
        root = with_order(root, order);
    }

    tracing::debug!(
        schema = schema.version(),
        sections = root.len(),
        "converted deck to structured tree"
    );
    StructuredTree::from_mapping(root)
}

/// Validate a raw deck, then convert it. Conversion runs even when
/// validation reports errors; invalid values pass through as raw text.
pub fn raw_to_structured(raw: &RawDeck, schema: &SchemaVersion, options: &ConvertOptions) -> Converted {
    let validated = validate(raw, schema);
    let tree = to_structured(&validated.deck, schema, options);
    Converted {
        tree,
        diagnostics: validated.diagnostics,
    }
}

/// Hoisted root key and the sibling occurrences it holds.
type Hoisted<'d, 's> = (String, Vec<&'d TypedSection<'s>>);

struct Forward<'o, 'd, 's> {
    options: &'o ConvertOptions,
    hoisted: Vec<Hoisted<'d, 's>>,
}

impl<'o, 'd, 's> Forward<'o, 'd, 's> {
    /// `key` is the hoisting key of the group; occurrences other than the
    /// last get an `[k]` suffix for their own children.
    fn group_value(&mut self, key: &str, group: &[&'d TypedSection<'s>]) -> Yaml {
        let repeatable = group
            .first()
            .and_then(|s| s.spec)
            .is_some_and(SectionSpec::is_repeatable);
        if repeatable || group.len() > 1 {
            let last = group.len();
            Yaml::Sequence(
                group
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| {
                        let occurrence_key = if i + 1 < last {
                            format!("{}[{}]", key, i + 1)
                        } else {
                            key.to_string()
                        };
                        self.section_value(&occurrence_key, s)
                    })
                    .collect(),
            )
        } else {
            group.first().map_or(Yaml::Null, |&s| self.section_value(key, s))
        }
    }

    fn section_value(&mut self, key: &str, section: &'d TypedSection<'s>) -> Yaml {
        match &section.body {
            SectionBody::Keyed(entries) => {
                let mut map = Mapping::new();
                let mut order = Vec::new();
                for entry in entries {
                    insert_first(&mut map, &mut order, &entry.key, entry_value(entry));
                }
                for (name, group) in group_by_name(section.children.iter()) {
                    let child_key = format!("{}/{}", key, name);
                    if map.contains_key(name) {
                        // A key of this section already holds the name.
                        self.hoisted.push((child_key, group));
                        continue;
                    }
                    let value = self.group_value(&child_key, &group);
                    insert_first(&mut map, &mut order, name, value);
                }
                if self.options.record_order {
                    map = with_order(map, order);
                }
                Yaml::Mapping(map)
            }
            SectionBody::Records(records) => {
                self.hoist_children(key, section);
                let keyword = section
                    .spec
                    .and_then(SectionSpec::records)
                    .map_or("", |r| r.keyword.as_str());
                Yaml::Sequence(
                    records
                        .iter()
                        .map(|r| self.record_value(keyword, r))
                        .collect(),
                )
            }
            SectionBody::Unvalidated(entries) => {
                self.hoist_children(key, section);
                Yaml::Sequence(entries.iter().map(|e| Yaml::String(e.text.clone())).collect())
            }
        }
    }

    fn hoist_children(&mut self, key: &str, section: &'d TypedSection<'s>) {
        for (name, group) in group_by_name(section.children.iter()) {
            self.hoisted.push((format!("{}/{}", key, name), group));
        }
    }

    fn record_value(&self, keyword: &str, record: &TypedRecord<'_>) -> Yaml {
        let Some(id) = record.id else {
            return Yaml::String(record.text.clone());
        };
        let mut map = Mapping::new();
        map.insert(Yaml::String(keyword.to_string()), Yaml::Number(id.into()));
        let mut order = Vec::new();
        for entry in &record.entries {
            insert_first(&mut map, &mut order, &entry.key, entry_value(entry));
        }
        if self.options.record_order {
            map = with_order(map, order);
        }
        Yaml::Mapping(map)
    }
}

fn entry_value(entry: &TypedEntry<'_>) -> Yaml {
    match &entry.status {
        EntryStatus::Valid(typed) => native(&typed.value),
        EntryStatus::Invalid | EntryStatus::Unknown => Yaml::String(entry.raw.clone()),
    }
}

/// Native structured form of a coerced value.
pub fn native(value: &Value) -> Yaml {
    match value {
        Value::Integer(i) => Yaml::Number((*i).into()),
        Value::Real(r) => Yaml::Number((*r).into()),
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Str(s) => Yaml::String(s.clone()),
        Value::List(items) => Yaml::Sequence(items.iter().map(native).collect()),
    }
}

fn group_by_name<'d, 's, I>(sections: I) -> Vec<(&'d str, Vec<&'d TypedSection<'s>>)>
where
    I: Iterator<Item = &'d TypedSection<'s>>,
    's: 'd,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&'d str, Vec<&'d TypedSection<'s>>)> = Vec::new();
    for section in sections {
        match index.get(section.name.as_str()) {
            Some(&i) => groups[i].1.push(section),
            None => {
                index.insert(section.name.as_str(), groups.len());
                groups.push((section.name.as_str(), vec![section]));
            }
        }
    }
    groups
}

/// Insert unless the key is already taken; a repeated key keeps its first value.
fn insert_first(map: &mut Mapping, order: &mut Vec<String>, key: &str, value: Yaml) {
    let key_value = Yaml::String(key.to_string());
    if !map.contains_key(&key_value) {
        map.insert(key_value, value);
        order.push(key.to_string());
    }
}

fn with_order(map: Mapping, order: Vec<String>) -> Mapping {
    let mut out = Mapping::with_capacity(map.len() + 1);
    out.insert(
        Yaml::String(ORDER_KEY.to_string()),
        Yaml::Sequence(order.into_iter().map(Yaml::String).collect()),
    );
    out.extend(map);
    out
}

// ============================================================================
// REVERSE
// ============================================================================

/// Rebuild a raw deck from a structured tree with default options.
pub fn from_structured(tree: &StructuredTree, schema: &SchemaVersion) -> Result<RawDeck, ConvertError> {
    from_structured_with(tree, schema, &ConvertOptions::default())
}

/// Rebuild a raw deck from any structured value; the root must be a mapping.
pub fn from_value(value: &Yaml, schema: &SchemaVersion, options: &ConvertOptions) -> Result<RawDeck, ConvertError> {
    match value {
        Yaml::Mapping(map) => Reverse { schema, options }.deck(map),
        other => Err(ConvertError::NotAMapping {
            found: describe(other).to_string(),
        }),
    }
}

pub fn from_structured_with(
    tree: &StructuredTree,
    schema: &SchemaVersion,
    options: &ConvertOptions,
) -> Result<RawDeck, ConvertError> {
    Reverse { schema, options }.deck(tree.as_mapping())
}

struct Reverse<'a> {
    schema: &'a SchemaVersion,
    options: &'a ConvertOptions,
}

impl Reverse<'_> {
    fn deck(&self, root: &Mapping) -> Result<RawDeck, ConvertError> {
        let keys = ordered_keys(root, "", |name| self.schema.section_position(name))?;
        let mut deck = RawDeck::new();
        let mut hoisted = Vec::new();

        for (name, value) in keys {
            if name.contains('/') {
                hoisted.push((name, value));
                continue;
            }
            check_header(name, &self.options.comment_markers)?;
            let spec = self.schema.section(name);
            deck.sections.extend(self.occurrences(name, spec, value)?);
        }

        // Parents first so deeper paths find them.
        hoisted.sort_by_key(|(name, _)| name.matches('/').count());
        for (key, value) in hoisted {
            check_header(key, &self.options.comment_markers)?;
            let components: Vec<&str> = key.split('/').collect();
            let Some((name, parents)) = components.split_last() else {
                continue;
            };
            let (siblings, parent_path) = locate(&mut deck.sections, parents);
            let path = format!("{}/{}", parent_path, name);
            siblings.extend(self.occurrences(&path, self.schema.resolve_path(&path), value)?);
        }

        tracing::debug!(sections = deck.sections.len(), "rebuilt raw deck from structured tree");
        Ok(deck)
    }

    /// Every occurrence a structured value describes for one section name.
    fn occurrences(
        &self,
        path: &str,
        spec: Option<&SectionSpec>,
        value: &Yaml,
    ) -> Result<Vec<RawSection>, ConvertError> {
        let records = spec.is_some_and(|s| matches!(s.layout, Layout::Records(_)));
        match value {
            Yaml::Null => Ok(vec![RawSection::new(path, None)]),
            Yaml::Mapping(map) if !records => Ok(vec![self.keyed(path, spec, map)?]),
            Yaml::Sequence(items) if records => {
                if !items.is_empty() && items.iter().all(Yaml::is_sequence) {
                    items
                        .iter()
                        .map(|item| self.records(path, spec, item.as_sequence().map_or(&[][..], Vec::as_slice)))
                        .collect()
                } else {
                    Ok(vec![self.records(path, spec, items)?])
                }
            }
            Yaml::Sequence(items)
                if !items.is_empty() && items.iter().all(|i| i.is_mapping() || i.is_null()) =>
            {
                items
                    .iter()
                    .map(|item| match item {
                        Yaml::Mapping(map) => self.keyed(path, spec, map),
                        _ => Ok(RawSection::new(path, None)),
                    })
                    .collect()
            }
            Yaml::Sequence(items) if spec.is_none() => {
                if !items.is_empty() && items.iter().all(Yaml::is_sequence) {
                    items
                        .iter()
                        .map(|item| self.lines(path, item.as_sequence().map_or(&[][..], Vec::as_slice)))
                        .collect()
                } else {
                    Ok(vec![self.lines(path, items)?])
                }
            }
            other => Err(ConvertError::Shape {
                section: path.to_string(),
                expected: match (spec, records) {
                    (Some(_), true) => "a list of records",
                    (Some(_), false) => "a mapping or a list of mappings",
                    (None, _) => "a list of lines or a mapping",
                }
                .to_string(),
                found: describe(other).to_string(),
            }),
        }
    }

    fn keyed(&self, path: &str, spec: Option<&SectionSpec>, map: &Mapping) -> Result<RawSection, ConvertError> {
        let mut section = RawSection::new(path, None);
        let position = |name: &str| spec.and_then(|s| keyed_position(s, name));

        for (key, value) in ordered_keys(map, path, position)? {
            let child_path = format!("{}/{}", path, key);
            let nested = value.is_mapping() || value.is_sequence();
            if let Some(param) = spec.and_then(|s| s.parameter(key)) {
                let text = self.value_text(path, key, Some(param), value, None)?;
                section.entries.push(self.entry(path, key, &text, true)?);
            } else if let Some(sub) = spec
                .and_then(|s| s.subsection(key))
                .filter(|_| nested || value.is_null())
            {
                check_header(key, &self.options.comment_markers)?;
                section.children.extend(self.occurrences(&child_path, Some(sub), value)?);
            } else if nested {
                check_header(key, &self.options.comment_markers)?;
                section.children.extend(self.occurrences(&child_path, None, value)?);
            } else {
                // Scalars under a sub-section name are unknown keys.
                let text = self.value_text(path, key, None, value, None)?;
                section.entries.push(self.entry(path, key, &text, true)?);
            }
        }

        section.implicit = section.entries.is_empty() && !section.children.is_empty();
        Ok(section)
    }

    fn records(&self, path: &str, spec: Option<&SectionSpec>, items: &[Yaml]) -> Result<RawSection, ConvertError> {
        let mut section = RawSection::new(path, None);
        let (Some(spec), Some(layout)) = (spec, spec.and_then(SectionSpec::records)) else {
            return self.lines(path, items);
        };
        let keyword = layout.keyword.as_str();

        for item in items {
            let line = match item {
                Yaml::Mapping(map) => {
                    let id = map
                        .get(keyword)
                        .and_then(native_tokens)
                        .filter(|t| t.len() == 1)
                        .ok_or_else(|| ConvertError::MissingRecordId {
                            section: path.to_string(),
                            keyword: keyword.to_string(),
                        })?;
                    let mut line = format!("{} {}", keyword, quote_token(&id[0], &self.options.comment_markers));
                    let position = |name: &str| spec.parameter_position(name);
                    for (key, value) in ordered_keys(map, path, position)? {
                        if key == keyword {
                            continue;
                        }
                        let text = self.value_text(path, key, spec.parameter(key), value, Some(spec))?;
                        line.push(' ');
                        line.push_str(&self.join(key, &text));
                    }
                    line
                }
                other => self.line_text(path, other)?,
            };
            if let Some(entry) = self.relex(path, &line, false)? {
                section.entries.push(entry);
            }
        }
        Ok(section)
    }

    /// Unknown section body: one verbatim line per item.
    fn lines(&self, path: &str, items: &[Yaml]) -> Result<RawSection, ConvertError> {
        let mut section = RawSection::new(path, None);
        for item in items {
            let line = self.line_text(path, item)?;
            if let Some(entry) = self.relex(path, &line, false)? {
                section.entries.push(entry);
            }
        }
        Ok(section)
    }

    fn line_text(&self, path: &str, item: &Yaml) -> Result<String, ConvertError> {
        match item {
            Yaml::String(s) => Ok(s.clone()),
            Yaml::Mapping(_) | Yaml::Sequence(_) | Yaml::Null => Err(ConvertError::Shape {
                section: path.to_string(),
                expected: "a line of text".to_string(),
                found: describe(item).to_string(),
            }),
            scalar => Ok(native_tokens(scalar).map(|t| t.join(" ")).unwrap_or_default()),
        }
    }

    /// Legacy text for the value of one key. Strings that do not coerce for
    /// a known key, and all strings of unknown keys, are written verbatim.
    /// Inside a record (`record` set) tokens spelling a parameter name are
    /// quoted so they cannot be read as the next key.
    fn value_text(
        &self,
        section: &str,
        key: &str,
        param: Option<&ParameterSpec>,
        value: &Yaml,
        record: Option<&SectionSpec>,
    ) -> Result<String, ConvertError> {
        if let Yaml::String(s) = value {
            let verbatim = match param {
                Some(param) => coerce_native(param, value).is_err(),
                None => true,
            };
            if verbatim {
                return Ok(s.clone());
            }
        }
        if value.is_null() {
            return Ok(String::new());
        }
        let tokens = native_tokens(value).ok_or_else(|| ConvertError::UnwritableValue {
            section: section.to_string(),
            key: key.to_string(),
        })?;
        Ok(tokens
            .iter()
            .map(|t| match record {
                Some(spec) if spec.parameter(t).is_some() => format!("\"{}\"", escape_string(t)),
                _ => quote_token(t, &self.options.comment_markers),
            })
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn join(&self, key: &str, value_text: &str) -> String {
        let key = quote_token(key, &self.options.comment_markers);
        if value_text.is_empty() {
            key
        } else {
            format!("{} {}", key, value_text)
        }
    }

    fn entry(&self, section: &str, key: &str, value_text: &str, align_key: bool) -> Result<RawEntry, ConvertError> {
        let line = self.join(key, value_text);
        self.relex(section, &line, align_key)?
            .ok_or_else(|| ConvertError::UnwritableValue {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Lex generated text back into an entry so tokens match what a reader
    /// of the printed deck will see. Blank text yields `None`.
    fn relex(&self, section: &str, text: &str, align_key: bool) -> Result<Option<RawEntry>, ConvertError> {
        let unwritable = || ConvertError::UnwritableValue {
            section: section.to_string(),
            key: text.split_whitespace().next().unwrap_or_default().to_string(),
        };
        let mut lines = Lexer::new(text, &self.options.comment_markers);
        let line = lines.next();
        if lines.next().is_some() {
            return Err(unwritable());
        }
        match line.map(|l| l.kind) {
            None | Some(LineKind::Blank) => Ok(None),
            Some(LineKind::Entry { text, tokens }) => {
                let base = tokens.first().map_or(0, |t| t.span.start);
                let tokens = tokens
                    .into_iter()
                    .map(|t| Token {
                        span: Span::synthetic(t.span.start - base, t.span.end - base),
                        ..t
                    })
                    .collect();
                Ok(Some(RawEntry {
                    span: Span::synthetic(0, text.len()),
                    text,
                    tokens,
                    align_key,
                }))
            }
            Some(LineKind::Header { .. }) | Some(LineKind::Error { .. }) => Err(unwritable()),
        }
    }
}

/// Parameters first, then sub-sections.
fn keyed_position(spec: &SectionSpec, name: &str) -> Option<usize> {
    spec.parameter_position(name)
        .or_else(|| spec.subsection_position(name).map(|i| spec.parameters().len() + i))
}

/// Keys in emission order: the [`ORDER_KEY`] list, then known keys by
/// `position`, then unknown keys in mapping order.
fn ordered_keys<'m, F>(map: &'m Mapping, section: &str, position: F) -> Result<Vec<(&'m str, &'m Yaml)>, ConvertError>
where
    F: Fn(&str) -> Option<usize>,
{
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Some(key) = key.as_str() else {
            return Err(ConvertError::Shape {
                section: section.to_string(),
                expected: "string keys".to_string(),
                found: describe(key).to_string(),
            });
        };
        if key != ORDER_KEY {
            entries.push((key, value));
        }
    }

    let mut out = Vec::with_capacity(entries.len());
    if let Some(order) = map.get(ORDER_KEY) {
        let bad_order = || ConvertError::BadOrder {
            section: section.to_string(),
            key: ORDER_KEY.to_string(),
        };
        for name in order.as_sequence().ok_or_else(bad_order)? {
            let name = name.as_str().ok_or_else(bad_order)?;
            if let Some(i) = entries.iter().position(|(k, _)| *k == name) {
                out.push(entries.remove(i));
            }
        }
    }

    let (mut known, unknown): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|(k, _)| position(k).is_some());
    known.sort_by_key(|(k, _)| position(k));
    out.extend(known);
    out.extend(unknown);
    Ok(out)
}

/// Find the child list a hoisted key attaches to, and the real path of its
/// parent. A plain component picks the last section of that name; `NAME[k]`
/// picks the k-th `NAME` unless a section is literally called `NAME[k]`.
/// Missing parents are created implicit.
fn locate<'a>(mut level: &'a mut Vec<RawSection>, parents: &[&str]) -> (&'a mut Vec<RawSection>, String) {
    let mut path = String::new();
    for component in parents {
        let found = level.iter().rposition(|s| s.name == *component).or_else(|| {
            let (name, k) = split_occurrence(component)?;
            level
                .iter()
                .enumerate()
                .filter(|(_, s)| s.name == name)
                .nth(k - 1)
                .map(|(i, _)| i)
        });
        let index = match found {
            Some(i) => i,
            None => {
                let implicit_path = if path.is_empty() {
                    component.to_string()
                } else {
                    format!("{}/{}", path, component)
                };
                level.push(RawSection::implicit(implicit_path));
                level.len() - 1
            }
        };
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&level[index].name);
        level = &mut level[index].children;
    }
    (level, path)
}

/// `NAME[k]` with `k >= 1`.
fn split_occurrence(component: &str) -> Option<(&str, usize)> {
    let (name, k) = component.strip_suffix(']')?.rsplit_once('[')?;
    let k = k.parse::<usize>().ok().filter(|&k| k > 0)?;
    Some((name, k))
}

fn check_header(name: &str, comment_markers: &[String]) -> Result<(), ConvertError> {
    let bad = name.trim() != name
        || name.split('/').any(|part| part.trim().is_empty())
        || name.contains(['\n', '\r'])
        || comment_markers.iter().any(|m| name.contains(m.as_str()));
    if bad {
        Err(ConvertError::UnwritableHeader {
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn describe(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a list",
        Yaml::Mapping(_) => "a mapping",
        Yaml::Tagged(_) => "a tagged value",
    }
}
