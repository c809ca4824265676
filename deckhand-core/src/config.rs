//! Deck processing configuration.
//!
//! All fields have defaults; a TOML file only needs to name what it changes.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Header name that ends a deck unless configured otherwise.
pub const DEFAULT_END_MARKER: &str = "END";

/// Top-level configuration for one processing session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeckConfig {
    pub parser: ParserConfig,
    pub validation: ValidationConfig,
    pub emit: EmitConfig,
}

/// Legacy-format lexing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Markers that start a comment running to end of line.
    pub comment_markers: Vec<String>,
    /// Header name that terminates the deck. `None` reads to end of input.
    pub end_marker: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            comment_markers: vec!["//".to_string()],
            end_marker: Some(DEFAULT_END_MARKER.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Skip the missing-required-section check.
    pub sections_only: bool,
    /// Promote every warning to an error.
    pub warnings_as_errors: bool,
}

/// Output formatting for legacy text and structured trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitConfig {
    /// Column the section name starts at; the dash run fills the gap.
    pub header_width: usize,
    /// Column values start at for entries generated from structured input.
    pub key_width: usize,
    pub write_end_marker: bool,
    /// Record key order in structured output so it survives a round trip.
    pub record_order: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            header_width: 80,
            key_width: 40,
            write_end_marker: false,
            record_order: false,
        }
    }
}

impl DeckConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DeckConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parser.comment_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "parser.comment_markers".to_string(),
                value: format!("{:?}", self.parser.comment_markers),
                reason: "comment markers must not be empty or whitespace".to_string(),
            });
        }

        // A marker containing a quote would make quoted tokens ambiguous.
        if let Some(marker) = self.parser.comment_markers.iter().find(|m| m.contains('"')) {
            return Err(ConfigError::InvalidValue {
                field: "parser.comment_markers".to_string(),
                value: marker.clone(),
                reason: "comment markers must not contain '\"'".to_string(),
            });
        }

        if let Some(end) = &self.parser.end_marker {
            if end.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "parser.end_marker".to_string(),
                    value: end.clone(),
                    reason: "end marker must not be blank; omit it to disable".to_string(),
                });
            }
        }

        // Room for at least the two dashes that make a header.
        if self.emit.header_width < 2 {
            return Err(ConfigError::InvalidValue {
                field: "emit.header_width".to_string(),
                value: self.emit.header_width.to_string(),
                reason: "header_width must be at least 2".to_string(),
            });
        }

        Ok(())
    }
}
