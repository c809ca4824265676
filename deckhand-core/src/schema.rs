//! In-memory schema model for one metadata version.
//!
//! A [`SchemaVersion`] is built once by the metadata loader and is immutable
//! afterwards, so it can be shared by reference across threads validating
//! different decks.

use crate::condition::Condition;
use crate::value::{Number, Value};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// PARAMETER SPECS
// ============================================================================

/// Primitive parameter types.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Integer,
    Real,
    Boolean,
    String,
    /// Closed set of allowed string values, in declaration order.
    Enum(Vec<String>),
    Path,
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Real => "real",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Enum(_) => "enum",
            ParamType::Path => "path",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Real)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ParamType::String | ParamType::Path)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Enum(choices) => write!(f, "one of [{}]", choices.join(", ")),
            other => f.write_str(other.name()),
        }
    }
}

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: Number,
    pub exclusive: bool,
}

/// Allowed numeric range; both ends optional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Range {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl Range {
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether a numeric value lies inside the range.
    pub fn contains(&self, value: &Value) -> bool {
        use std::cmp::Ordering::*;
        let above_min = match self.min {
            None => true,
            Some(b) => match b.value.cmp_value(value) {
                Some(Greater) => true,
                Some(Equal) => !b.exclusive,
                _ => false,
            },
        };
        let below_max = match self.max {
            None => true,
            Some(b) => match b.value.cmp_value(value) {
                Some(Less) => true,
                Some(Equal) => !b.exclusive,
                _ => false,
            },
        };
        above_min && below_max
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => write!(
                f,
                "{}{}, {}{}",
                if lo.exclusive { "(" } else { "[" },
                lo.value,
                hi.value,
                if hi.exclusive { ")" } else { "]" }
            ),
            (Some(lo), None) => write!(f, "{} {}", if lo.exclusive { ">" } else { ">=" }, lo.value),
            (None, Some(hi)) => write!(f, "{} {}", if hi.exclusive { "<" } else { "<=" }, hi.value),
            (None, None) => f.write_str("any"),
        }
    }
}

/// Full-match regex constraint for string and path parameters.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Specification of one parameter within a section.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    /// Number of value tokens; values with `size > 1` are lists.
    pub size: usize,
    pub default: Option<Value>,
    /// Required whenever the condition (if any) holds.
    pub required: bool,
    pub condition: Option<Condition>,
    pub range: Range,
    pub pattern: Option<Pattern>,
    /// Value must be distinct across all occurrences/records of the section.
    pub unique: bool,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            size: 1,
            default: None,
            required: false,
            condition: None,
            range: Range::default(),
            pattern: None,
            unique: false,
            description: None,
        }
    }

    /// Human-readable description of the expected value, for diagnostics.
    pub fn expectation(&self) -> String {
        let mut out = if self.size > 1 {
            format!("{} values of type {}", self.size, self.ty)
        } else {
            self.ty.to_string()
        };
        if !self.range.is_unbounded() {
            out.push_str(&format!(" in {}", self.range));
        }
        out
    }
}

// ============================================================================
// SECTION SPECS
// ============================================================================

/// How often a section may occur in a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Single,
    Repeatable,
}

/// How body lines of a section are read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Layout {
    /// Every line is `KEY value...`.
    #[default]
    Keyed,
    /// Every line is a record: `KEYWORD id (KEY value...)*`.
    Records(RecordLayout),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub keyword: String,
    pub unique_ids: bool,
}

/// Specification of one section (or sub-section).
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub name: String,
    pub cardinality: Cardinality,
    pub layout: Layout,
    pub required: bool,
    pub description: Option<String>,
    parameters: Vec<ParameterSpec>,
    parameter_index: HashMap<String, usize>,
    subsections: Vec<SectionSpec>,
    subsection_index: HashMap<String, usize>,
}

impl SectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::Single,
            layout: Layout::Keyed,
            required: false,
            description: None,
            parameters: Vec::new(),
            parameter_index: HashMap::new(),
            subsections: Vec::new(),
            subsection_index: HashMap::new(),
        }
    }

    /// Append a parameter. Returns `false` (and changes nothing) if the name is
    /// already declared.
    pub fn push_parameter(&mut self, param: ParameterSpec) -> bool {
        if self.parameter_index.contains_key(&param.name) {
            return false;
        }
        self.parameter_index
            .insert(param.name.clone(), self.parameters.len());
        self.parameters.push(param);
        true
    }

    /// Append a sub-section. Returns `false` if the name is already declared.
    pub fn push_subsection(&mut self, section: SectionSpec) -> bool {
        if self.subsection_index.contains_key(&section.name) {
            return false;
        }
        self.subsection_index
            .insert(section.name.clone(), self.subsections.len());
        self.subsections.push(section);
        true
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameter_index.get(name).map(|&i| &self.parameters[i])
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Declaration position of a parameter, used for schema-order emission.
    pub fn parameter_position(&self, name: &str) -> Option<usize> {
        self.parameter_index.get(name).copied()
    }

    pub fn subsection(&self, name: &str) -> Option<&SectionSpec> {
        self.subsection_index.get(name).map(|&i| &self.subsections[i])
    }

    pub fn subsections(&self) -> &[SectionSpec] {
        &self.subsections
    }

    pub fn subsection_position(&self, name: &str) -> Option<usize> {
        self.subsection_index.get(name).copied()
    }

    pub fn is_repeatable(&self) -> bool {
        self.cardinality == Cardinality::Repeatable
    }

    pub fn records(&self) -> Option<&RecordLayout> {
        match &self.layout {
            Layout::Records(r) => Some(r),
            Layout::Keyed => None,
        }
    }
}

// ============================================================================
// SCHEMA VERSION
// ============================================================================

/// One loaded metadata snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaVersion {
    version: String,
    digest: String,
    sections: Vec<SectionSpec>,
    section_index: HashMap<String, usize>,
}

impl SchemaVersion {
    pub(crate) fn new(version: String, digest: String) -> Self {
        Self {
            version,
            digest,
            sections: Vec::new(),
            section_index: HashMap::new(),
        }
    }

    pub(crate) fn push_section(&mut self, section: SectionSpec) -> bool {
        if self.section_index.contains_key(&section.name) {
            return false;
        }
        self.section_index
            .insert(section.name.clone(), self.sections.len());
        self.sections.push(section);
        true
    }

    /// Version tag from the metadata, or the digest when none was given.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Hex SHA-256 of the metadata bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&SectionSpec> {
        self.section_index.get(name).map(|&i| &self.sections[i])
    }

    pub fn section_position(&self, name: &str) -> Option<usize> {
        self.section_index.get(name).copied()
    }

    /// Resolve a `/`-separated section path such as `STRUCTURAL DYNAMIC/GENALPHA`.
    pub fn resolve_path(&self, path: &str) -> Option<&SectionSpec> {
        let mut parts = path.split('/');
        let mut spec = self.section(parts.next()?)?;
        for part in parts {
            spec = spec.subsection(part)?;
        }
        Some(spec)
    }

    /// Names of all top-level sections, in declaration order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }
}
