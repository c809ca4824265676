//! Structured-tree documents.
//!
//! A [`StructuredTree`] is the hierarchical form of a deck: a mapping of
//! section name to section value. Besides conversion it supports whole-section
//! editing, splitting into include files, and tolerant comparison.

use crate::converter::ORDER_KEY;
use crate::error::{DeckError, DeckResult, TreeError};
use deckhand_core::{closest_match, Layout, SchemaVersion};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value as Yaml};
use std::fs;
use std::path::Path;

/// Section listing other documents whose sections are pulled in.
pub const INCLUDES: &str = "INCLUDES";

/// Ordered mapping of section name → section value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredTree {
    root: Mapping,
}

/// Numeric tolerance for [`StructuredTree::compare`].
///
/// Reals `a` and `b` match when `|a - b| <= atol + rtol * |b|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
    /// Let an integer on one side match a real on the other.
    pub allow_int_as_float: bool,
    pub equal_nan: bool,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1.0e-5,
            atol: 1.0e-8,
            allow_int_as_float: false,
            equal_nan: false,
        }
    }
}

impl Tolerance {
    pub fn exact() -> Self {
        Self {
            rtol: 0.0,
            atol: 0.0,
            ..Self::default()
        }
    }
}

impl StructuredTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Wrap a structured value. An empty document is an empty tree.
    pub fn from_value(value: Yaml) -> Result<Self, TreeError> {
        match value {
            Yaml::Mapping(root) => Ok(Self { root }),
            Yaml::Null => Ok(Self::new()),
            _ => Err(TreeError::NotAMapping),
        }
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn into_mapping(self) -> Mapping {
        self.root
    }

    pub fn to_value(&self) -> Yaml {
        Yaml::Mapping(self.root.clone())
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.section_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Section names, sorted.
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .root
            .keys()
            .filter_map(Yaml::as_str)
            .filter(|k| *k != ORDER_KEY)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        name != ORDER_KEY && self.root.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Yaml, TreeError> {
        match self.root.get(name) {
            Some(value) if name != ORDER_KEY => Ok(value),
            _ => Err(self.unknown(name)),
        }
    }

    /// Set a whole section, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: Yaml) -> Option<Yaml> {
        let name = name.into();
        let previous = self.root.insert(Yaml::String(name.clone()), value);
        if previous.is_some() {
            tracing::warn!(section = %name, "section was overwritten");
        }
        previous
    }

    pub fn remove(&mut self, name: &str) -> Result<Yaml, TreeError> {
        if name == ORDER_KEY {
            return Err(self.unknown(name));
        }
        match self.root.shift_remove(name) {
            Some(value) => Ok(value),
            None => Err(self.unknown(name)),
        }
    }

    /// Add every section of `other`. Fails without changes when a section
    /// is defined on both sides.
    pub fn combine(&mut self, other: StructuredTree) -> Result<(), TreeError> {
        let overlap: Vec<String> = other
            .section_names()
            .into_iter()
            .filter(|name| self.contains(name))
            .map(str::to_string)
            .collect();
        if !overlap.is_empty() {
            return Err(TreeError::Overlap { sections: overlap });
        }
        self.overwrite(other);
        Ok(())
    }

    /// Add every section of `other`, replacing whole sections on conflict.
    pub fn overwrite(&mut self, other: StructuredTree) {
        for (key, value) in other.root {
            match key {
                Yaml::String(name) if name != ORDER_KEY => {
                    self.insert(name, value);
                }
                Yaml::String(_) => {}
                key => {
                    self.root.insert(key, value);
                }
            }
        }
    }

    /// Move the named sections into a second tree: `(rest, selected)`.
    pub fn split(&self, names: &[&str]) -> Result<(StructuredTree, StructuredTree), TreeError> {
        let mut rest = self.clone();
        let mut selected = StructuredTree::new();
        for name in names {
            let value = rest.remove(name)?;
            selected.insert(*name, value);
        }
        Ok((rest, selected))
    }

    /// Like [`split`](Self::split), and list `include` in the rest's
    /// `INCLUDES` section so the two halves resolve back into one.
    pub fn split_with_include(
        &self,
        names: &[&str],
        include: &str,
    ) -> Result<(StructuredTree, StructuredTree), TreeError> {
        let (mut rest, selected) = self.split(names)?;
        let entry = Yaml::String(include.to_string());
        match rest.root.get_mut(INCLUDES) {
            Some(Yaml::Sequence(items)) => items.push(entry),
            Some(Yaml::Null) | None => {
                rest.root
                    .insert(Yaml::String(INCLUDES.to_string()), Yaml::Sequence(vec![entry]));
            }
            Some(_) => return Err(TreeError::BadIncludes),
        }
        Ok((rest, selected))
    }

    /// Only sections that are not records sections (nor hoisted children of one).
    pub fn header_only(&self, schema: &SchemaVersion) -> StructuredTree {
        let mut root = Mapping::new();
        for (key, value) in &self.root {
            let is_records = key.as_str().is_some_and(|name| {
                let top = name.split('/').next().unwrap_or(name);
                schema
                    .section(top)
                    .is_some_and(|s| matches!(s.layout, Layout::Records(_)))
            });
            if !is_records {
                root.insert(key.clone(), value.clone());
            }
        }
        StructuredTree { root }
    }

    /// Replace the `INCLUDES` section with the sections of each listed
    /// document. `loader` maps an include name to its tree.
    pub fn resolve_includes<F>(&mut self, mut loader: F) -> Result<(), TreeError>
    where
        F: FnMut(&str) -> Result<StructuredTree, String>,
    {
        let Some(includes) = self.root.shift_remove(INCLUDES) else {
            return Ok(());
        };
        let includes = match includes {
            Yaml::Sequence(items) => items,
            Yaml::Null => Vec::new(),
            _ => return Err(TreeError::BadIncludes),
        };

        for include in &includes {
            let name = include.as_str().ok_or(TreeError::BadIncludes)?;
            tracing::debug!(include = name, "resolving include");
            let tree = loader(name).map_err(|reason| TreeError::Include {
                include: name.to_string(),
                reason,
            })?;
            self.combine(tree)?;
        }
        Ok(())
    }

    /// Compare with numeric tolerance; the error names the first difference.
    pub fn compare(&self, other: &StructuredTree, tolerance: &Tolerance) -> Result<(), TreeError> {
        compare_mappings("", &self.root, &other.root, tolerance)
    }

    pub fn approx_eq(&self, other: &StructuredTree, tolerance: &Tolerance) -> bool {
        self.compare(other, tolerance).is_ok()
    }

    /// Copy with sections in alphabetical order.
    pub fn sorted(&self) -> StructuredTree {
        let mut entries: Vec<(&Yaml, &Yaml)> = self.root.iter().collect();
        entries.sort_by(|(a, _), (b, _)| key_name(a).cmp(&key_name(b)));
        StructuredTree {
            root: entries
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    // ========================================================================
    // TEXT I/O
    // ========================================================================

    pub fn from_yaml_str(text: &str) -> DeckResult<Self> {
        let value: Yaml = serde_yaml::from_str(text).map_err(|e| DeckError::Structured {
            reason: e.to_string(),
        })?;
        Ok(Self::from_value(value)?)
    }

    pub fn from_json_str(text: &str) -> DeckResult<Self> {
        let value: Yaml = serde_json::from_str(text).map_err(|e| DeckError::Structured {
            reason: e.to_string(),
        })?;
        Ok(Self::from_value(value)?)
    }

    pub fn to_yaml_string(&self, sort_sections: bool) -> DeckResult<String> {
        let tree = if sort_sections { self.sorted() } else { self.clone() };
        serde_yaml::to_string(&tree).map_err(|e| DeckError::Structured {
            reason: e.to_string(),
        })
    }

    pub fn to_json_string(&self, sort_sections: bool) -> DeckResult<String> {
        let tree = if sort_sections { self.sorted() } else { self.clone() };
        serde_json::to_string_pretty(&tree).map_err(|e| DeckError::Structured {
            reason: e.to_string(),
        })
    }

    /// Read a `.json` file as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> DeckResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DeckError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if is_json(path) {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    pub fn write_path(&self, path: impl AsRef<Path>, sort_sections: bool) -> DeckResult<()> {
        let path = path.as_ref();
        let text = if is_json(path) {
            self.to_json_string(sort_sections)?
        } else {
            self.to_yaml_string(sort_sections)?
        };
        fs::write(path, text).map_err(|source| DeckError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn unknown(&self, name: &str) -> TreeError {
        TreeError::UnknownSection {
            name: name.to_string(),
            suggestion: closest_match(name, self.section_names()),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

// ============================================================================
// COMPARISON
// ============================================================================

fn key_name(key: &Yaml) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => format!("{:?}", key),
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn mismatch(path: &str, reason: impl Into<String>) -> TreeError {
    TreeError::Mismatch {
        path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
        reason: reason.into(),
    }
}

fn compare_mappings(path: &str, a: &Mapping, b: &Mapping, tolerance: &Tolerance) -> Result<(), TreeError> {
    let order = Yaml::String(ORDER_KEY.to_string());
    for (key, left) in a {
        if *key == order {
            continue;
        }
        let name = key_name(key);
        let right = b
            .get(key)
            .ok_or_else(|| mismatch(&child_path(path, &name), "missing on the right"))?;
        compare_values(&child_path(path, &name), left, right, tolerance)?;
    }
    if let Some(key) = b.keys().find(|k| **k != order && !a.contains_key(*k)) {
        return Err(mismatch(&child_path(path, &key_name(key)), "missing on the left"));
    }
    Ok(())
}

fn compare_values(path: &str, a: &Yaml, b: &Yaml, tolerance: &Tolerance) -> Result<(), TreeError> {
    match (a, b) {
        (Yaml::Number(x), Yaml::Number(y)) => compare_numbers(path, x, y, tolerance),
        (Yaml::Mapping(x), Yaml::Mapping(y)) => compare_mappings(path, x, y, tolerance),
        (Yaml::Sequence(x), Yaml::Sequence(y)) => {
            if x.len() != y.len() {
                return Err(mismatch(path, format!("length {} != {}", x.len(), y.len())));
            }
            for (i, (left, right)) in x.iter().zip(y).enumerate() {
                compare_values(&format!("{}[{}]", path, i), left, right, tolerance)?;
            }
            Ok(())
        }
        (Yaml::Tagged(x), Yaml::Tagged(y)) if x.tag == y.tag => compare_values(path, &x.value, &y.value, tolerance),
        _ if a == b => Ok(()),
        _ => Err(mismatch(path, format!("{:?} != {:?}", a, b))),
    }
}

fn compare_numbers(path: &str, a: &Number, b: &Number, tolerance: &Tolerance) -> Result<(), TreeError> {
    let (int_a, int_b) = (!a.is_f64(), !b.is_f64());
    if int_a && int_b {
        return if a == b {
            Ok(())
        } else {
            Err(mismatch(path, format!("{} != {}", a, b)))
        };
    }
    if int_a != int_b && !tolerance.allow_int_as_float {
        return Err(mismatch(path, format!("{} and {} differ in type", a, b)));
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(mismatch(path, format!("{} != {}", a, b)));
    };
    let close = if x.is_nan() || y.is_nan() {
        tolerance.equal_nan && x.is_nan() && y.is_nan()
    } else if x.is_infinite() || y.is_infinite() {
        x == y
    } else {
        (x - y).abs() <= tolerance.atol + tolerance.rtol * y.abs()
    };
    if close {
        Ok(())
    } else {
        Err(mismatch(path, format!("{} is not within tolerance of {}", x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::metadata::load_str;

    fn tree(text: &str) -> StructuredTree {
        StructuredTree::from_yaml_str(text).unwrap()
    }

    #[test]
    fn test_section_listing_and_lookup() {
        let t = tree("__order__: [B, A]\nB: {x: 1}\nA: [line]\n");
        assert_eq!(t.section_names(), vec!["A", "B"]);
        assert_eq!(t.len(), 2);
        assert!(t.get("A").is_ok());
        assert_eq!(
            t.get("AA").unwrap_err(),
            TreeError::UnknownSection {
                name: "AA".into(),
                suggestion: Some("A".into()),
            }
        );
        assert!(t.get(ORDER_KEY).is_err());
    }

    #[test]
    fn test_insert_remove() {
        let mut t = StructuredTree::new();
        assert!(t.insert("A", Yaml::Null).is_none());
        assert_eq!(t.insert("A", Yaml::Bool(true)), Some(Yaml::Null));
        assert_eq!(t.remove("A").unwrap(), Yaml::Bool(true));
        assert!(matches!(t.remove("A"), Err(TreeError::UnknownSection { .. })));
        assert!(t.is_empty());
    }

    #[test]
    fn test_combine_rejects_overlap() {
        let mut left = tree("A: 1\nB: 2\n");
        let err = left.combine(tree("B: 3\nC: 4\n")).unwrap_err();
        assert_eq!(err, TreeError::Overlap { sections: vec!["B".into()] });
        assert!(!left.contains("C"));

        left.combine(tree("C: 4\n")).unwrap();
        assert_eq!(left.section_names(), vec!["A", "B", "C"]);

        left.overwrite(tree("A: 9\n"));
        assert_eq!(left.get("A").unwrap(), &Yaml::Number(9.into()));
    }

    #[test]
    fn test_split_and_includes_round_trip() {
        let full = tree("A: 1\nB: 2\nC: 3\n");
        let (rest, part) = full.split_with_include(&["B"], "part.yaml").unwrap();
        assert_eq!(rest.section_names(), vec!["A", "C", INCLUDES]);
        assert_eq!(part.section_names(), vec!["B"]);

        let mut joined = rest.clone();
        joined
            .resolve_includes(|name| {
                assert_eq!(name, "part.yaml");
                Ok(part.clone())
            })
            .unwrap();
        assert!(joined.approx_eq(&full, &Tolerance::exact()));

        assert!(matches!(full.split(&["Z"]), Err(TreeError::UnknownSection { .. })));
    }

    #[test]
    fn test_include_failures() {
        let mut t = tree("INCLUDES: [a.yaml]\nA: 1\n");
        let err = t.resolve_includes(|_| Err("not found".to_string())).unwrap_err();
        assert_eq!(
            err,
            TreeError::Include {
                include: "a.yaml".into(),
                reason: "not found".into(),
            }
        );

        let mut t = tree("INCLUDES: 5\n");
        assert_eq!(t.resolve_includes(|_| Ok(StructuredTree::new())), Err(TreeError::BadIncludes));

        let mut t = tree("INCLUDES: [a.yaml]\nA: 1\n");
        let err = t.resolve_includes(|_| Ok(tree("A: 2\n"))).unwrap_err();
        assert!(matches!(err, TreeError::Overlap { .. }));
    }

    #[test]
    fn test_header_only_drops_records_sections() {
        let schema = load_str(
            "sections:\n  - name: MATERIALS\n    records: { keyword: MAT }\n    parameters:\n      - { name: E, type: real }\n  - name: IO\n",
        )
        .unwrap();
        let t = tree("IO: {}\nMATERIALS: [{MAT: 1, E: 1.0}]\nMATERIALS/NOTES: [x]\nOTHER: [y]\n");
        assert_eq!(t.header_only(&schema).section_names(), vec!["IO", "OTHER"]);
    }

    #[test]
    fn test_compare_with_tolerance() {
        let a = tree("A: { x: 1.0, y: [1, 2.5], z: 3 }\n");
        let b = tree("A: { x: 1.000001, y: [1, 2.5], z: 3.0 }\n");
        let err = a.compare(&b, &Tolerance::default()).unwrap_err();
        assert_eq!(
            err,
            TreeError::Mismatch {
                path: "A.z".into(),
                reason: "3 and 3.0 differ in type".into(),
            }
        );

        let loose = Tolerance {
            allow_int_as_float: true,
            ..Tolerance::default()
        };
        assert!(a.approx_eq(&b, &loose));
        assert!(!a.approx_eq(&b, &Tolerance { allow_int_as_float: true, ..Tolerance::exact() }));

        let nan = tree("A: .nan\n");
        assert!(!nan.approx_eq(&nan, &Tolerance::default()));
        assert!(nan.approx_eq(&nan, &Tolerance { equal_nan: true, ..Tolerance::default() }));

        let missing = a.compare(&tree("A: { x: 1.0, y: [1, 2.5] }\n"), &loose).unwrap_err();
        assert!(matches!(missing, TreeError::Mismatch { ref path, .. } if path == "A.z"));
    }

    #[test]
    fn test_text_io() {
        let t = tree("B: 1\nA: [x, y]\n");
        let sorted = t.to_yaml_string(true).unwrap();
        assert!(sorted.find("A:").unwrap() < sorted.find("B:").unwrap());

        let json = t.to_json_string(false).unwrap();
        let back = StructuredTree::from_json_str(&json).unwrap();
        assert_eq!(back, t);

        assert!(matches!(
            StructuredTree::from_yaml_str("- 1\n- 2\n"),
            Err(DeckError::Tree(TreeError::NotAMapping))
        ));
        assert!(matches!(
            StructuredTree::from_json_str("{"),
            Err(DeckError::Structured { .. })
        ));
        assert!(StructuredTree::from_yaml_str("~\n").unwrap().is_empty());
    }
}
