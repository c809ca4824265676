//! Error types for deck processing

use deckhand_core::{ConfigError, SchemaError};
use thiserror::Error;

/// Structured input whose shape cannot represent a section.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("structured deck must be a mapping of section names, found {found}")]
    NotAMapping { found: String },

    #[error("section '{section}': expected {expected}, found {found}")]
    Shape {
        section: String,
        expected: String,
        found: String,
    },

    #[error("section '{section}': record is missing its '{keyword}' id")]
    MissingRecordId { section: String, keyword: String },

    #[error("section '{section}': key '{key}' has a value that cannot be written as tokens")]
    UnwritableValue { section: String, key: String },

    #[error("section '{section}': {key} must be a list of names")]
    BadOrder { section: String, key: String },

    #[error("'{name}' cannot be written as a section header")]
    UnwritableHeader { name: String },
}

/// Structured-tree document operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("section '{name}' is not present{}", suggestion_suffix(.suggestion))]
    UnknownSection {
        name: String,
        suggestion: Option<String>,
    },

    #[error("sections defined on both sides: {}", .sections.join(", "))]
    Overlap { sections: Vec<String> },

    #[error("include '{include}' could not be loaded: {reason}")]
    Include { include: String, reason: String },

    #[error("INCLUDES must be a list of strings")]
    BadIncludes,

    #[error("structured document must be a mapping at the top level")]
    NotAMapping,

    #[error("trees differ at {path}: {reason}")]
    Mismatch { path: String, reason: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

/// Fatal pipeline failures. Everything recoverable is a diagnostic instead.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8 (first bad byte at offset {offset})")]
    Encoding { path: String, offset: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("structured input could not be decoded: {reason}")]
    Structured { reason: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("worker pool could not be started: {reason}")]
    WorkerPool { reason: String },
}

pub type DeckResult<T> = Result<T, DeckError>;
