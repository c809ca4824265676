//! Token-to-value coercion shared by the metadata loader (defaults) and the
//! deck validator (entries).

use crate::diagnostic::DiagnosticKind;
use crate::schema::{ParamType, ParameterSpec};
use crate::suggest::closest_match;
use crate::value::Value;
use std::fmt;

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CoerceError {
    /// Either [`DiagnosticKind::TypeMismatch`] or [`DiagnosticKind::DomainViolation`].
    pub kind: DiagnosticKind,
    pub message: String,
    pub suggestion: Option<String>,
}

impl CoerceError {
    fn type_mismatch(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::TypeMismatch,
            message: message.into(),
            suggestion: None,
        }
    }

    fn domain(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::DomainViolation,
            message: message.into(),
            suggestion: None,
        }
    }
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Coerce the value tokens of one entry to the parameter's declared type and
/// check its constraints.
pub fn coerce_tokens<S: AsRef<str>>(spec: &ParameterSpec, tokens: &[S]) -> Result<Value, CoerceError> {
    if tokens.len() != spec.size {
        return Err(CoerceError::type_mismatch(format!(
            "expected {} value token{}, found {}",
            spec.size,
            if spec.size == 1 { "" } else { "s" },
            tokens.len()
        )));
    }

    let value = if spec.size == 1 {
        coerce_scalar(spec, tokens[0].as_ref())?
    } else {
        let items = tokens
            .iter()
            .map(|t| coerce_scalar(spec, t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Value::List(items)
    };
    Ok(value)
}

/// Coerce a native structured value (YAML/JSON scalar or sequence).
pub fn coerce_native(spec: &ParameterSpec, native: &serde_yaml::Value) -> Result<Value, CoerceError> {
    let tokens = native_tokens(native).ok_or_else(|| {
        CoerceError::type_mismatch(format!("expected {}, found a mapping", spec.expectation()))
    })?;
    coerce_tokens(spec, &tokens)
}

/// Flatten a structured scalar or sequence of scalars into token text.
pub fn native_tokens(native: &serde_yaml::Value) -> Option<Vec<String>> {
    use serde_yaml::Value as Y;
    match native {
        Y::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(native_scalar(item)?);
            }
            Some(out)
        }
        other => native_scalar(other).map(|s| vec![s]),
    }
}

fn native_scalar(native: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value as Y;
    match native {
        Y::Bool(b) => Some(b.to_string()),
        Y::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:?}", f),
            _ => n.to_string(),
        }),
        Y::String(s) => Some(s.clone()),
        Y::Tagged(tagged) => native_scalar(&tagged.value),
        _ => None,
    }
}

fn coerce_scalar(spec: &ParameterSpec, token: &str) -> Result<Value, CoerceError> {
    let value = match &spec.ty {
        ParamType::Integer => Value::Integer(parse_integer(token)?),
        ParamType::Real => Value::Real(parse_real(token)?),
        ParamType::Boolean => Value::Bool(parse_bool(token)?),
        ParamType::Enum(choices) => {
            if !choices.iter().any(|c| c == token) {
                let mut err = CoerceError::domain(format!(
                    "'{}' is not one of [{}]",
                    token,
                    choices.join(", ")
                ));
                err.suggestion = closest_match(token, choices.iter().map(String::as_str));
                return Err(err);
            }
            Value::Str(token.to_string())
        }
        ParamType::Path => {
            if token.is_empty() {
                return Err(CoerceError::domain("path must not be empty"));
            }
            if token.chars().any(char::is_control) {
                return Err(CoerceError::domain("path contains control characters"));
            }
            Value::Str(token.to_string())
        }
        ParamType::String => Value::Str(token.to_string()),
    };

    if let Some(pattern) = &spec.pattern {
        if let Value::Str(s) = &value {
            if !pattern.is_match(s) {
                return Err(CoerceError::domain(format!(
                    "'{}' does not match pattern '{}'",
                    s,
                    pattern.as_str()
                )));
            }
        }
    }

    if !spec.range.is_unbounded() && !spec.range.contains(&value) {
        return Err(CoerceError::domain(format!(
            "{} is outside the allowed range {}",
            value, spec.range
        )));
    }

    Ok(value)
}

fn parse_integer(token: &str) -> Result<i64, CoerceError> {
    match token.parse::<i64>() {
        Ok(i) => Ok(i),
        Err(e) => {
            use std::num::IntErrorKind::*;
            match e.kind() {
                PosOverflow | NegOverflow => Err(CoerceError::domain(format!(
                    "{} does not fit in a 64-bit integer",
                    token
                ))),
                _ => Err(CoerceError::type_mismatch(format!(
                    "expected integer, found '{}'",
                    token
                ))),
            }
        }
    }
}

fn parse_real(token: &str) -> Result<f64, CoerceError> {
    match token.parse::<f64>() {
        Ok(r) if r.is_finite() => Ok(r),
        Ok(_) => Err(CoerceError::domain(format!("{} is not a finite number", token))),
        Err(_) => Err(CoerceError::type_mismatch(format!(
            "expected real, found '{}'",
            token
        ))),
    }
}

fn parse_bool(token: &str) -> Result<bool, CoerceError> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(CoerceError::type_mismatch(format!(
            "expected boolean (true/false/yes/no), found '{}'",
            token
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Bound, Pattern, Range};
    use crate::value::Number;

    fn spec(ty: ParamType) -> ParameterSpec {
        ParameterSpec::new("P", ty)
    }

    #[test]
    fn test_integer_overflow_is_domain_violation() {
        let err = coerce_tokens(&spec(ParamType::Integer), &["99999999999999999999"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::DomainViolation);
        let err = coerce_tokens(&spec(ParamType::Integer), &["1.5"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::TypeMismatch);
    }

    #[test]
    fn test_real_must_be_finite() {
        assert_eq!(
            coerce_tokens(&spec(ParamType::Real), &["1e-3"]),
            Ok(Value::Real(1e-3))
        );
        assert_eq!(coerce_tokens(&spec(ParamType::Real), &["7"]), Ok(Value::Real(7.0)));
        let err = coerce_tokens(&spec(ParamType::Real), &["inf"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::DomainViolation);
    }

    #[test]
    fn test_boolean_literals() {
        let b = spec(ParamType::Boolean);
        assert_eq!(coerce_tokens(&b, &["Yes"]), Ok(Value::Bool(true)));
        assert_eq!(coerce_tokens(&b, &["FALSE"]), Ok(Value::Bool(false)));
        assert_eq!(
            coerce_tokens(&b, &["1"]).unwrap_err().kind,
            DiagnosticKind::TypeMismatch
        );
    }

    #[test]
    fn test_enum_suggests_closest_choice() {
        let e = spec(ParamType::Enum(vec!["elastic".into(), "plastic".into()]));
        let err = coerce_tokens(&e, &["plastik"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::DomainViolation);
        assert_eq!(err.suggestion.as_deref(), Some("plastic"));
        assert!(err.message.contains("elastic, plastic"));
    }

    #[test]
    fn test_size_mismatch() {
        let mut coord = spec(ParamType::Real);
        coord.size = 3;
        assert_eq!(
            coerce_tokens(&coord, &["0", "1", "2.5"]),
            Ok(Value::List(vec![Value::Real(0.0), Value::Real(1.0), Value::Real(2.5)]))
        );
        let err = coerce_tokens(&coord, &["0", "1"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::TypeMismatch);
    }

    #[test]
    fn test_range_and_pattern() {
        let mut y = spec(ParamType::Real);
        y.range = Range {
            min: Some(Bound {
                value: Number::Int(0),
                exclusive: false,
            }),
            max: None,
        };
        let err = coerce_tokens(&y, &["-5"]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::DomainViolation);

        let mut p = spec(ParamType::Path);
        p.pattern = Some(Pattern::new(r".*\.dat").unwrap());
        assert!(coerce_tokens(&p, &["mesh.dat"]).is_ok());
        assert_eq!(
            coerce_tokens(&p, &["mesh.yaml"]).unwrap_err().kind,
            DiagnosticKind::DomainViolation
        );
    }

    #[test]
    fn test_native_values() {
        let mut coord = spec(ParamType::Real);
        coord.size = 2;
        let native: serde_yaml::Value = serde_yaml::from_str("[0, 1.5]").unwrap();
        assert_eq!(
            coerce_native(&coord, &native),
            Ok(Value::List(vec![Value::Real(0.0), Value::Real(1.5)]))
        );
        let flag: serde_yaml::Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(
            coerce_native(&spec(ParamType::Boolean), &flag),
            Ok(Value::Bool(true))
        );
    }
}
