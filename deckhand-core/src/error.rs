//! Error types for deckhand operations

use thiserror::Error;

/// Coarse classification of schema failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// The metadata was read but is inconsistent or undecodable.
    MalformedMetadata,
    /// The metadata source could not be read at all.
    Unreadable,
}

/// Metadata loading errors. Fatal: no deck is processed against a schema
/// that failed to load.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Metadata could not be decoded: {reason}")]
    Decode { reason: String },

    #[error("Duplicate section '{section}'")]
    DuplicateSection { section: String },

    #[error("Duplicate parameter '{parameter}' in section '{section}'")]
    DuplicateParameter { section: String, parameter: String },

    #[error("Duplicate choice '{choice}' for {section}.{parameter}")]
    DuplicateEnumChoice {
        section: String,
        parameter: String,
        choice: String,
    },

    #[error("Condition on {section}.{parameter} references undeclared parameter '{reference}'")]
    UndeclaredReference {
        section: String,
        parameter: String,
        reference: String,
    },

    #[error("Invalid condition on {section}.{parameter}: {reason}")]
    InvalidCondition {
        section: String,
        parameter: String,
        reason: String,
    },

    #[error("Invalid default for {section}.{parameter}: {reason}")]
    InvalidDefault {
        section: String,
        parameter: String,
        reason: String,
    },

    #[error("Invalid constraint on {section}.{parameter}: {reason}")]
    InvalidConstraint {
        section: String,
        parameter: String,
        reason: String,
    },

    #[error("Invalid section '{section}': {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("Failed to read metadata from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SchemaError {
    pub fn kind(&self) -> SchemaErrorKind {
        match self {
            SchemaError::Io { .. } => SchemaErrorKind::Unreadable,
            _ => SchemaErrorKind::MalformedMetadata,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration could not be parsed: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Profile lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("Profile '{profile}' points at unregistered schema version '{version}'")]
    UnknownVersion { profile: String, version: String },

    #[error("Profile table could not be parsed: {reason}")]
    Parse { reason: String },
}
