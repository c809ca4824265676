//! Cross-parameter validity conditions.
//!
//! A condition is a small predicate over sibling parameter values, written in
//! the metadata as text such as `MODEL == 'plastic' and not DYNAMIC`. It is
//! parsed once at schema load time into an [`Expr`] tree and evaluated by a
//! recursive interpreter against already-coerced values.

use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

// ============================================================================
// AST
// ============================================================================

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        })
    }
}

/// Condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Reference to a sibling parameter by name.
    Param(String),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    In {
        needle: Box<Expr>,
        set: Vec<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Evaluate to a value; `None` means an absent parameter.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<Value>
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Expr::Literal(v) => Some(v.clone()),
            Expr::Param(name) => lookup(name),
            _ => Some(Value::Bool(self.holds(lookup))),
        }
    }

    /// Evaluate in boolean context. Absent values and non-booleans are false.
    pub fn holds<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Expr::Literal(v) => v.as_bool().unwrap_or(false),
            Expr::Param(name) => lookup(name).and_then(|v| v.as_bool()).unwrap_or(false),
            Expr::Compare { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.evaluate(lookup), rhs.evaluate(lookup));
                match (lhs, rhs) {
                    (Some(l), Some(r)) => {
                        let ordering = l.compare(&r);
                        match op {
                            CompareOp::Eq => ordering == Some(Ordering::Equal),
                            CompareOp::Ne => ordering != Some(Ordering::Equal),
                            CompareOp::Lt => ordering == Some(Ordering::Less),
                            CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                            CompareOp::Gt => ordering == Some(Ordering::Greater),
                            CompareOp::Ge => {
                                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                            }
                        }
                    }
                    // Absent only ever differs from something.
                    _ => *op == CompareOp::Ne,
                }
            }
            Expr::In { needle, set } => match needle.evaluate(lookup) {
                Some(v) => set
                    .iter()
                    .filter_map(|e| e.evaluate(lookup))
                    .any(|candidate| v.loosely_equals(&candidate)),
                None => false,
            },
            Expr::And(parts) => parts.iter().all(|p| p.holds(lookup)),
            Expr::Or(parts) => parts.iter().any(|p| p.holds(lookup)),
            Expr::Not(inner) => !inner.holds(lookup),
        }
    }

    /// Every parameter name referenced by the expression, in source order.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Param(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Expr::In { needle, set } => {
                needle.collect_references(out);
                for e in set {
                    e.collect_references(out);
                }
            }
            Expr::And(parts) | Expr::Or(parts) => {
                for p in parts {
                    p.collect_references(out);
                }
            }
            Expr::Not(inner) => inner.collect_references(out),
        }
    }
}

/// A parsed condition together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        if !parser.is_at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn holds<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.expr.holds(lookup)
    }

    pub fn references(&self) -> Vec<&str> {
        self.expr.references()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Condition syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("condition error at column {column}: {message}")]
pub struct ConditionError {
    pub message: String,
    pub column: usize,
}

// ============================================================================
// LEXER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(Value),
    Str(String),
    True,
    False,
    And,
    Or,
    Not,
    In,
    Op(CompareOp),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    column: usize,
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            column: 1,
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ConditionError> {
        let mut tokens = Vec::new();
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            let column = self.column;
            let kind = match self.peek_char() {
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        column,
                    });
                    return Ok(tokens);
                }
                Some(c) => self.scan(c, column)?,
            };
            tokens.push(Token { kind, column });
        }
    }

    fn scan(&mut self, c: char, column: usize) -> Result<TokenKind, ConditionError> {
        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            '=' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                }
                TokenKind::Op(CompareOp::Eq)
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Op(CompareOp::Ne)
                } else {
                    TokenKind::Not
                }
            }
            '<' | '>' => {
                self.advance();
                let or_equal = self.peek_char() == Some('=');
                if or_equal {
                    self.advance();
                }
                TokenKind::Op(match (c, or_equal) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    (_, false) => CompareOp::Gt,
                    (_, true) => CompareOp::Ge,
                })
            }
            '&' | '|' => {
                self.advance();
                if self.peek_char() != Some(c) {
                    return Err(ConditionError {
                        message: format!("expected '{c}{c}'"),
                        column,
                    });
                }
                self.advance();
                if c == '&' {
                    TokenKind::And
                } else {
                    TokenKind::Or
                }
            }
            '\'' | '"' => self.scan_string(c, column)?,
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.scan_number(column)?
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),
            other => {
                return Err(ConditionError {
                    message: format!("unexpected character '{other}'"),
                    column,
                })
            }
        };
        Ok(kind)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.offset();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let ident = &self.source[start..self.offset()];
        match ident {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "true" | "True" | "TRUE" => TokenKind::True,
            "false" | "False" | "FALSE" => TokenKind::False,
            _ => TokenKind::Ident(ident.to_string()),
        }
    }

    fn scan_number(&mut self, column: usize) -> Result<TokenKind, ConditionError> {
        let start = self.offset();
        self.advance();
        while matches!(
            self.peek_char(),
            Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '+' || c == '-'
        ) {
            self.advance();
        }
        let text = &self.source[start..self.offset()];
        if let Ok(i) = text.parse::<i64>() {
            return Ok(TokenKind::Number(Value::Integer(i)));
        }
        match text.parse::<f64>() {
            Ok(r) if r.is_finite() => Ok(TokenKind::Number(Value::Real(r))),
            _ => Err(ConditionError {
                message: format!("invalid number '{text}'"),
                column,
            }),
        }
    }

    fn scan_string(&mut self, quote: char, column: usize) -> Result<TokenKind, ConditionError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ConditionError {
                        message: "unterminated string".to_string(),
                        column,
                    })
                }
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some(c) => value.push(c),
                    None => {
                        return Err(ConditionError {
                            message: "unterminated string".to_string(),
                            column,
                        })
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.source.len())
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.column += 1;
        Some(c)
    }
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse_expr(&mut self) -> Result<Expr, ConditionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut parts = vec![self.parse_and()?];
        while self.check(&TokenKind::Or) {
            self.advance();
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut parts = vec![self.parse_unary()?];
        while self.check(&TokenKind::And) {
            self.advance();
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::And(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let lhs = self.parse_atom()?;

        if let TokenKind::Op(op) = self.current().kind {
            self.advance();
            let rhs = self.parse_atom()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }

        if self.check(&TokenKind::In) {
            self.advance();
            self.expect(TokenKind::LBracket, "'['")?;
            let mut set = Vec::new();
            while !self.check(&TokenKind::RBracket) {
                set.push(self.parse_atom()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RBracket, "']'")?;
            return Ok(Expr::In {
                needle: Box::new(lhs),
                set,
            });
        }

        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, ConditionError> {
        let expr = match &self.current().kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Ident(name) => Expr::Param(name.clone()),
            TokenKind::Number(v) => Expr::Literal(v.clone()),
            TokenKind::Str(s) => Expr::Literal(Value::Str(s.clone())),
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            _ => return Err(self.error("expected parameter name or literal")),
        };
        self.advance();
        Ok(expr)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ConditionError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, msg: &str) -> ConditionError {
        ConditionError {
            message: msg.to_string(),
            column: self.current().column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, Value)]) -> impl Fn(&str) -> Option<Value> {
        let map: HashMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_parse_comparison() -> Result<(), ConditionError> {
        let cond = Condition::parse("MODEL == 'plastic'")?;
        assert_eq!(
            cond.expr(),
            &Expr::Compare {
                op: CompareOp::Eq,
                lhs: Box::new(Expr::Param("MODEL".to_string())),
                rhs: Box::new(Expr::Literal(Value::Str("plastic".to_string()))),
            }
        );
        assert!(cond.holds(&env(&[("MODEL", Value::from("plastic"))])));
        assert!(!cond.holds(&env(&[("MODEL", Value::from("elastic"))])));
        Ok(())
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() -> Result<(), ConditionError> {
        let cond = Condition::parse("A == 1 or B == 2 and C == 3")?;
        assert!(matches!(cond.expr(), Expr::Or(parts) if parts.len() == 2));
        assert!(cond.holds(&env(&[("A", Value::Integer(1))])));
        assert!(!cond.holds(&env(&[("B", Value::Integer(2))])));
        Ok(())
    }

    #[test]
    fn test_absent_parameter_semantics() -> Result<(), ConditionError> {
        let lookup = env(&[]);
        assert!(!Condition::parse("X == 1")?.holds(&lookup));
        assert!(Condition::parse("X != 1")?.holds(&lookup));
        assert!(!Condition::parse("X < 1")?.holds(&lookup));
        assert!(!Condition::parse("X in [1, 2]")?.holds(&lookup));
        assert!(Condition::parse("not X")?.holds(&lookup));
        Ok(())
    }

    #[test]
    fn test_numeric_cross_type_and_in() -> Result<(), ConditionError> {
        let lookup = env(&[("DT", Value::Real(0.5)), ("KIND", Value::from("b"))]);
        assert!(Condition::parse("DT >= 0 && DT < 1")?.holds(&lookup));
        assert!(Condition::parse("KIND in ['a', \"b\"]")?.holds(&lookup));
        assert!(Condition::parse("!(KIND == 'a') || false")?.holds(&lookup));
        Ok(())
    }

    #[test]
    fn test_bare_boolean_parameter() -> Result<(), ConditionError> {
        let cond = Condition::parse("DYNAMIC and not RESTART")?;
        assert!(cond.holds(&env(&[
            ("DYNAMIC", Value::Bool(true)),
            ("RESTART", Value::Bool(false)),
        ])));
        assert_eq!(cond.references(), vec!["DYNAMIC", "RESTART"]);
        Ok(())
    }

    #[test]
    fn test_syntax_errors_report_column() {
        let err = Condition::parse("MODEL == ").unwrap_err();
        assert_eq!(err.column, 10);
        assert!(Condition::parse("MODEL == 'plastic").is_err());
        assert!(Condition::parse("A & B").is_err());
        assert!(Condition::parse("A == 1 )").is_err());
        assert!(Condition::parse("A ? 1").is_err());
    }
}
