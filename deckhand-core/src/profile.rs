//! Profile selection.
//!
//! A profile is a named binding to one schema version. Which profile is
//! active is the caller's business; this module only maps names to loaded
//! schemas.

use crate::error::ProfileError;
use crate::schema::SchemaVersion;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Profile name → schema version id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileRegistry {
    #[serde(default)]
    profiles: BTreeMap<String, String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `[profiles]` table, e.g. `release = "2025.1"`.
    pub fn from_toml_str(text: &str) -> Result<Self, ProfileError> {
        toml::from_str(text).map_err(|e| ProfileError::Parse {
            reason: e.to_string(),
        })
    }

    pub fn insert(&mut self, profile: impl Into<String>, version: impl Into<String>) {
        self.profiles.insert(profile.into(), version.into());
    }

    pub fn version_of(&self, profile: &str) -> Option<&str> {
        self.profiles.get(profile).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

/// Schema version id → loaded schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaVersion>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its own version tag.
    pub fn register(&mut self, schema: SchemaVersion) -> Arc<SchemaVersion> {
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.version().to_string(), Arc::clone(&schema));
        schema
    }

    pub fn get(&self, version: &str) -> Option<Arc<SchemaVersion>> {
        self.schemas.get(version).cloned()
    }

    /// Resolve a profile name through `profiles` to a loaded schema.
    pub fn resolve(
        &self,
        profiles: &ProfileRegistry,
        profile: &str,
    ) -> Result<Arc<SchemaVersion>, ProfileError> {
        let version = profiles
            .version_of(profile)
            .ok_or_else(|| ProfileError::UnknownProfile {
                name: profile.to_string(),
            })?;
        self.get(version).ok_or_else(|| ProfileError::UnknownVersion {
            profile: profile.to_string(),
            version: version.to_string(),
        })
    }
}
