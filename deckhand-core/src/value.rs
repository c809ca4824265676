//! Coerced parameter values and legacy token rendering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// VALUES
// ============================================================================

/// A value after type coercion.
///
/// Enum and path parameters coerce to [`Value::Str`]; parameters declared with
/// `size > 1` coerce to [`Value::List`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Human-readable type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Compare two values the way conditions and range checks need it.
    ///
    /// Integers and reals compare numerically across types; strings compare
    /// lexically; booleans only compare for equality. Returns `None` when the
    /// values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) if a == b => Some(Ordering::Equal),
            (Value::Bool(_), Value::Bool(_)) => None,
            (Value::List(a), Value::List(b)) if a == b => Some(Ordering::Equal),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Whether two values are equal under [`Value::compare`] semantics.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Render the value as legacy-format tokens, quoting strings when needed.
    pub fn to_tokens(&self, comment_markers: &[String]) -> Vec<String> {
        match self {
            Value::List(items) => items
                .iter()
                .flat_map(|item| item.to_tokens(comment_markers))
                .collect(),
            Value::Str(s) => vec![quote_token(s, comment_markers)],
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            // Debug keeps a decimal point or exponent, so the text reparses as real.
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

// ============================================================================
// NUMERIC BOUNDS
// ============================================================================

/// A numeric bound that keeps integer precision when the schema gives one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    /// Compare a coerced value against this bound.
    pub fn cmp_value(self, value: &Value) -> Option<Ordering> {
        match (value, self) {
            (Value::Integer(v), Number::Int(b)) => Some(v.cmp(&b)),
            _ => value.as_f64()?.partial_cmp(&self.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Real(r) => write!(f, "{:?}", r),
        }
    }
}

// ============================================================================
// TOKEN QUOTING
// ============================================================================

/// Whether a bare token would be misread by the legacy lexer.
pub fn needs_quotes(text: &str, comment_markers: &[String]) -> bool {
    text.is_empty()
        || text.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\')
        || comment_markers.iter().any(|m| text.contains(m.as_str()))
        || text.starts_with("--")
        || text.starts_with("==")
        || text.starts_with("**")
}

/// Quote and escape `text` if the lexer could not read it back as one token.
pub fn quote_token(text: &str, comment_markers: &[String]) -> String {
    if needs_quotes(text, comment_markers) {
        format!("\"{}\"", escape_string(text))
    } else {
        text.to_string()
    }
}

pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["//".to_string()]
    }

    #[test]
    fn test_real_display_reparses_as_real() {
        assert_eq!(Value::Real(5.0).to_string(), "5.0");
        assert_eq!(Value::Real(0.1).to_string(), "0.1");
        assert_eq!(Value::Real(1e-12).to_string().parse::<f64>().ok(), Some(1e-12));
    }

    #[test]
    fn test_numeric_compare_across_types() {
        assert_eq!(Value::Integer(2).compare(&Value::Real(2.0)), Some(Ordering::Equal));
        assert_eq!(Value::Real(1.5).compare(&Value::Integer(2)), Some(Ordering::Less));
        assert_eq!(Value::Bool(true).compare(&Value::Integer(1)), None);
        assert!(Value::Str("a".into()).loosely_equals(&Value::Str("a".into())));
    }

    #[test]
    fn test_bound_keeps_integer_precision() {
        let bound = Number::Int(i64::MAX);
        assert_eq!(bound.cmp_value(&Value::Integer(i64::MAX - 1)), Some(Ordering::Less));
        assert_eq!(Number::Real(0.0).cmp_value(&Value::Integer(-5)), Some(Ordering::Less));
    }

    #[test]
    fn test_quote_token() {
        assert_eq!(quote_token("plain", &markers()), "plain");
        assert_eq!(quote_token("two words", &markers()), "\"two words\"");
        assert_eq!(quote_token("a//b", &markers()), "\"a//b\"");
        assert_eq!(quote_token("", &markers()), "\"\"");
        assert_eq!(quote_token("say \"hi\"", &markers()), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_list_tokens() {
        let v = Value::List(vec![Value::Real(0.0), Value::Real(1.5), Value::Integer(3)]);
        assert_eq!(v.to_tokens(&markers()), vec!["0.0", "1.5", "3"]);
    }
}
