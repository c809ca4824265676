//! deckhand core - schema model and shared types
//!
//! Everything the parser, validator and converter must agree on lives here:
//! the schema model and its metadata loader, condition expressions, coerced
//! values, diagnostics, errors and configuration.

pub mod coerce;
pub mod condition;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod metadata;
pub mod profile;
pub mod schema;
pub mod suggest;
pub mod value;

pub use coerce::{coerce_native, coerce_tokens, native_tokens, CoerceError};
pub use condition::{CompareOp, Condition, ConditionError, Expr};
pub use config::{DeckConfig, DEFAULT_END_MARKER, EmitConfig, ParserConfig, ValidationConfig};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity, SourcePos};
pub use error::{ConfigError, ProfileError, SchemaError, SchemaErrorKind};
pub use profile::{ProfileRegistry, SchemaRegistry};
pub use schema::{
    Bound, Cardinality, Layout, ParamType, ParameterSpec, Pattern, Range, RecordLayout,
    SchemaVersion, SectionSpec,
};
pub use suggest::closest_match;
pub use value::{escape_string, needs_quotes, quote_token, Number, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_schema_is_shareable() {
        assert_send_sync::<SchemaVersion>();
        assert_send_sync::<Diagnostics>();
    }
}
