//! Metadata loader.
//!
//! Decodes a YAML or JSON metadata document, checks that it is internally
//! consistent and builds a [`SchemaVersion`]. Any inconsistency fails the
//! whole load; nothing downstream ever sees a half-valid schema.

use crate::coerce::coerce_native;
use crate::condition::Condition;
use crate::error::SchemaError;
use crate::schema::{
    Bound, Cardinality, Layout, ParamType, ParameterSpec, Pattern, Range, RecordLayout,
    SchemaVersion, SectionSpec,
};
use crate::value::Number;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// DOCUMENT FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataDoc {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    sections: Vec<SectionDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionDoc {
    name: String,
    #[serde(default)]
    repeatable: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    records: Option<RecordsDoc>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterDoc>,
    #[serde(default)]
    subsections: Vec<SectionDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordsDoc {
    keyword: String,
    #[serde(default)]
    unique_ids: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TypeDoc {
    Integer,
    Real,
    Boolean,
    String,
    Enum,
    Path,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterDoc {
    name: String,
    #[serde(rename = "type")]
    ty: TypeDoc,
    #[serde(default = "default_size")]
    size: usize,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    choices: Option<Vec<String>>,
    #[serde(default)]
    min: Option<Number>,
    #[serde(default)]
    max: Option<Number>,
    #[serde(default)]
    min_exclusive: bool,
    #[serde(default)]
    max_exclusive: bool,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    description: Option<String>,
}

fn default_size() -> usize {
    1
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Load a schema from YAML (or JSON, which YAML accepts) text.
pub fn load_str(text: &str) -> Result<SchemaVersion, SchemaError> {
    load_bytes(text.as_bytes())
}

/// Load a schema from raw metadata bytes (YAML or JSON).
pub fn load_bytes(bytes: &[u8]) -> Result<SchemaVersion, SchemaError> {
    let doc: MetadataDoc = serde_yaml::from_slice(bytes).map_err(|e| SchemaError::Decode {
        reason: e.to_string(),
    })?;
    build(doc, bytes)
}

/// Load a schema from strict JSON bytes.
pub fn load_json(bytes: &[u8]) -> Result<SchemaVersion, SchemaError> {
    let doc: MetadataDoc = serde_json::from_slice(bytes).map_err(|e| SchemaError::Decode {
        reason: e.to_string(),
    })?;
    build(doc, bytes)
}

/// Read and load a metadata file.
pub fn load_file(path: impl AsRef<Path>) -> Result<SchemaVersion, SchemaError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        load_json(&bytes)
    } else {
        load_bytes(&bytes)
    }
}

/// Lowercase hex SHA-256 of the metadata bytes.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ============================================================================
// BUILD & CHECK
// ============================================================================

fn build(doc: MetadataDoc, bytes: &[u8]) -> Result<SchemaVersion, SchemaError> {
    let digest = digest(bytes);
    let version = doc.version.unwrap_or_else(|| digest.clone());
    let mut schema = SchemaVersion::new(version, digest);

    for section_doc in doc.sections {
        let section = build_section(section_doc, None)?;
        let name = section.name.clone();
        if !schema.push_section(section) {
            return Err(SchemaError::DuplicateSection { section: name });
        }
    }

    tracing::debug!(
        version = schema.version(),
        sections = schema.sections().len(),
        "loaded schema"
    );
    Ok(schema)
}

fn build_section(doc: SectionDoc, parent: Option<&str>) -> Result<SectionSpec, SchemaError> {
    let path = match parent {
        Some(p) => format!("{}/{}", p, doc.name),
        None => doc.name.clone(),
    };

    if doc.name.trim().is_empty() {
        return Err(SchemaError::InvalidSection {
            section: path,
            reason: "section name is empty".into(),
        });
    }
    if doc.name.contains('/') {
        return Err(SchemaError::InvalidSection {
            section: path,
            reason: "section name must not contain '/'; declare it as a subsection".into(),
        });
    }

    let mut section = SectionSpec::new(doc.name.clone());
    section.required = doc.required;
    section.description = doc.description;
    if doc.repeatable {
        section.cardinality = Cardinality::Repeatable;
    }

    if let Some(records) = doc.records {
        if records.keyword.trim().is_empty() {
            return Err(SchemaError::InvalidSection {
                section: path,
                reason: "record keyword is empty".into(),
            });
        }
        if doc.parameters.iter().any(|p| p.name == records.keyword) {
            return Err(SchemaError::InvalidSection {
                section: path,
                reason: format!(
                    "record keyword '{}' collides with a parameter name",
                    records.keyword
                ),
            });
        }
        if !doc.subsections.is_empty() {
            return Err(SchemaError::InvalidSection {
                section: path,
                reason: "records sections cannot declare subsections".into(),
            });
        }
        section.layout = Layout::Records(RecordLayout {
            keyword: records.keyword,
            unique_ids: records.unique_ids,
        });
    }

    let declared: HashSet<&str> = doc.parameters.iter().map(|p| p.name.as_str()).collect();
    let mut built = Vec::with_capacity(doc.parameters.len());
    for param_doc in &doc.parameters {
        built.push(build_parameter(param_doc, &path, &declared)?);
    }
    for param in built {
        let name = param.name.clone();
        if !section.push_parameter(param) {
            return Err(SchemaError::DuplicateParameter {
                section: path,
                parameter: name,
            });
        }
    }

    for sub_doc in doc.subsections {
        let sub = build_section(sub_doc, Some(&path))?;
        let name = sub.name.clone();
        if !section.push_subsection(sub) {
            return Err(SchemaError::DuplicateSection {
                section: format!("{}/{}", path, name),
            });
        }
    }

    Ok(section)
}

fn build_parameter(
    doc: &ParameterDoc,
    section: &str,
    declared: &HashSet<&str>,
) -> Result<ParameterSpec, SchemaError> {
    let constraint = |reason: String| SchemaError::InvalidConstraint {
        section: section.to_string(),
        parameter: doc.name.clone(),
        reason,
    };

    if doc.name.trim().is_empty() {
        return Err(constraint("parameter name is empty".into()));
    }
    if doc.size == 0 {
        return Err(constraint("size must be at least 1".into()));
    }

    let ty = match (doc.ty, &doc.choices) {
        (TypeDoc::Enum, Some(choices)) => {
            if choices.is_empty() {
                return Err(constraint("enum declares no choices".into()));
            }
            let mut seen = HashSet::new();
            for choice in choices {
                if !seen.insert(choice.as_str()) {
                    return Err(SchemaError::DuplicateEnumChoice {
                        section: section.to_string(),
                        parameter: doc.name.clone(),
                        choice: choice.clone(),
                    });
                }
            }
            ParamType::Enum(choices.clone())
        }
        (TypeDoc::Enum, None) => return Err(constraint("enum declares no choices".into())),
        (_, Some(_)) => return Err(constraint("choices are only allowed on enum parameters".into())),
        (TypeDoc::Integer, None) => ParamType::Integer,
        (TypeDoc::Real, None) => ParamType::Real,
        (TypeDoc::Boolean, None) => ParamType::Boolean,
        (TypeDoc::String, None) => ParamType::String,
        (TypeDoc::Path, None) => ParamType::Path,
    };

    let mut spec = ParameterSpec::new(doc.name.clone(), ty);
    spec.size = doc.size;
    spec.unique = doc.unique;
    spec.description = doc.description.clone();

    if doc.min.is_some() || doc.max.is_some() {
        if !spec.ty.is_numeric() {
            return Err(constraint(format!(
                "range given for non-numeric type {}",
                spec.ty.name()
            )));
        }
        if let (Some(lo), Some(hi)) = (doc.min, doc.max) {
            if lo.as_f64() > hi.as_f64() {
                return Err(constraint(format!("min {} exceeds max {}", lo, hi)));
            }
        }
        spec.range = Range {
            min: doc.min.map(|value| Bound {
                value,
                exclusive: doc.min_exclusive,
            }),
            max: doc.max.map(|value| Bound {
                value,
                exclusive: doc.max_exclusive,
            }),
        };
    }

    if let Some(source) = &doc.pattern {
        if !spec.ty.is_textual() {
            return Err(constraint(format!(
                "pattern given for non-string type {}",
                spec.ty.name()
            )));
        }
        spec.pattern = Some(Pattern::new(source).map_err(|e| constraint(e.to_string()))?);
    }

    if let Some(source) = &doc.condition {
        let condition = Condition::parse(source).map_err(|e| SchemaError::InvalidCondition {
            section: section.to_string(),
            parameter: doc.name.clone(),
            reason: e.to_string(),
        })?;
        for reference in condition.references() {
            if reference == doc.name {
                return Err(SchemaError::InvalidCondition {
                    section: section.to_string(),
                    parameter: doc.name.clone(),
                    reason: "condition references the parameter itself".into(),
                });
            }
            if !declared.contains(reference) {
                return Err(SchemaError::UndeclaredReference {
                    section: section.to_string(),
                    parameter: doc.name.clone(),
                    reference: reference.to_string(),
                });
            }
        }
        spec.condition = Some(condition);
    }
    spec.required = doc.required.unwrap_or(spec.condition.is_some());

    if let Some(native) = &doc.default {
        let value = coerce_native(&spec, native).map_err(|e| SchemaError::InvalidDefault {
            section: section.to_string(),
            parameter: doc.name.clone(),
            reason: e.message,
        })?;
        spec.default = Some(value);
    }

    Ok(spec)
}
