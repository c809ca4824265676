//! Validated deck tree.
//!
//! Borrows the schema it was validated against; raw text is copied so the
//! tree outlives the [`RawDeck`](crate::parser::RawDeck) it came from.

use crate::lexer::Span;
use crate::parser::RawEntry;
use deckhand_core::{ParameterSpec, SectionSpec, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Root of a validated deck.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDeck<'s> {
    pub file: Option<Arc<str>>,
    pub sections: Vec<TypedSection<'s>>,
}

/// One validated section occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedSection<'s> {
    pub name: String,
    pub path: String,
    /// `None` when the section is not in the schema.
    pub spec: Option<&'s SectionSpec>,
    pub span: Option<Span>,
    pub implicit: bool,
    /// 1-based index among same-named siblings.
    pub occurrence: usize,
    pub body: SectionBody<'s>,
    pub children: Vec<TypedSection<'s>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody<'s> {
    Keyed(Vec<TypedEntry<'s>>),
    Records(Vec<TypedRecord<'s>>),
    /// Raw lines of a section the schema does not know.
    Unvalidated(Vec<RawEntry>),
}

/// One record line of a records-layout section.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord<'s> {
    /// `None` when the keyword or id was malformed; the line is then kept
    /// only as `text`.
    pub id: Option<i64>,
    pub entries: Vec<TypedEntry<'s>>,
    /// Verbatim comment-free line.
    pub text: String,
    pub span: Span,
}

/// One key and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedEntry<'s> {
    pub key: String,
    pub status: EntryStatus<'s>,
    pub span: Span,
    /// Verbatim value text.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus<'s> {
    Valid(TypedValue<'s>),
    /// Known key whose value failed coercion or a constraint.
    Invalid,
    /// Key not declared in the schema.
    Unknown,
}

/// A coerced value tagged with the spec it was checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue<'s> {
    pub value: Value,
    pub spec: &'s ParameterSpec,
    pub span: Span,
}

impl<'s> TypedDeck<'s> {
    /// Top-level occurrences named `name`.
    pub fn occurrences<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TypedSection<'s>> + 'a {
        self.sections.iter().filter(move |s| s.name == name)
    }

    /// First occurrence of a section by `/`-separated path.
    pub fn section(&self, path: &str) -> Option<&TypedSection<'s>> {
        let mut parts = path.split('/');
        let first = parts.next()?;
        let mut node = self.sections.iter().find(|s| s.name == first)?;
        for part in parts {
            node = node.children.iter().find(|c| c.name == part)?;
        }
        Some(node)
    }

    /// Coerced value of `key` in the first occurrence of `section`.
    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)?.value(key)
    }

    /// Same section occurrences, key sets and coerced values. Spans,
    /// implicit parents and raw spelling of valid values are ignored.
    pub fn equivalent(&self, other: &TypedDeck<'_>) -> bool {
        sections_equivalent(&self.sections, &other.sections)
    }
}

impl<'s> TypedSection<'s> {
    pub fn entries(&self) -> &[TypedEntry<'s>] {
        match &self.body {
            SectionBody::Keyed(entries) => entries,
            _ => &[],
        }
    }

    pub fn records(&self) -> &[TypedRecord<'s>] {
        match &self.body {
            SectionBody::Records(records) => records,
            _ => &[],
        }
    }

    pub fn entry(&self, key: &str) -> Option<&TypedEntry<'s>> {
        self.entries().iter().find(|e| e.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entry(key).and_then(TypedEntry::value)
    }

    pub fn record(&self, id: i64) -> Option<&TypedRecord<'s>> {
        self.records().iter().find(|r| r.id == Some(id))
    }
}

impl<'s> TypedRecord<'s> {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(TypedEntry::value)
    }
}

impl<'s> TypedEntry<'s> {
    pub fn value(&self) -> Option<&Value> {
        match &self.status {
            EntryStatus::Valid(typed) => Some(&typed.value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.status, EntryStatus::Valid(_))
    }
}

// ============================================================================
// EQUIVALENCE
// ============================================================================

/// Occurrences are compared per path in order; different paths may appear
/// in any order.
fn sections_equivalent(a: &[TypedSection<'_>], b: &[TypedSection<'_>]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let (ga, gb) = (group_by_path(a), group_by_path(b));
    ga.len() == gb.len()
        && ga.iter().all(|(path, xs)| {
            gb.get(path).is_some_and(|ys| {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|(&i, &j)| {
                        let (x, y) = (&a[i], &b[j]);
                        x.occurrence == y.occurrence
                            && body_equivalent(&x.body, &y.body)
                            && sections_equivalent(&x.children, &y.children)
                    })
            })
        })
}

fn group_by_path<'a>(sections: &'a [TypedSection<'_>]) -> BTreeMap<&'a str, Vec<usize>> {
    let mut by_path: BTreeMap<&'a str, Vec<usize>> = BTreeMap::new();
    for (i, s) in sections.iter().enumerate() {
        by_path.entry(s.path.as_str()).or_default().push(i);
    }
    by_path
}

fn body_equivalent(a: &SectionBody<'_>, b: &SectionBody<'_>) -> bool {
    match (a, b) {
        (SectionBody::Keyed(x), SectionBody::Keyed(y)) => entries_equivalent(x, y),
        (SectionBody::Records(x), SectionBody::Records(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|(r, s)| {
                    r.id == s.id
                        && match r.id {
                            Some(_) => entries_equivalent(&r.entries, &s.entries),
                            None => r.text == s.text,
                        }
                })
        }
        (SectionBody::Unvalidated(x), SectionBody::Unvalidated(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(e, f)| e.text == f.text)
        }
        _ => false,
    }
}

/// Key sets compared without regard to order; values must match per key.
fn entries_equivalent(a: &[TypedEntry<'_>], b: &[TypedEntry<'_>]) -> bool {
    a.len() == b.len()
        && a.iter().all(|e| {
            b.iter()
                .any(|f| f.key == e.key && entry_values_equal(e, f))
        })
}

fn entry_values_equal(a: &TypedEntry<'_>, b: &TypedEntry<'_>) -> bool {
    match (&a.status, &b.status) {
        (EntryStatus::Valid(x), EntryStatus::Valid(y)) => x.value == y.value,
        (EntryStatus::Invalid, EntryStatus::Invalid) | (EntryStatus::Unknown, EntryStatus::Unknown) => {
            a.raw == b.raw
        }
        _ => false,
    }
}
