//! Restricted expression engine for string-form condition tests.
//!
//! Contracts embedded in agent output carry their tests as expression
//! strings. This module evaluates those expressions against a [`Scope`] of
//! named `serde_json::Value` bindings (typically just `data`). The engine is
//! capability-restricted, not a sandbox: an expression can only reach the
//! bindings and builtins explicitly placed in its scope, and any other
//! identifier or function fails with [`ExprError::NotAllowed`]. It is meant
//! for trusted, internally generated contract text.
//!
//! Supported syntax: `null` / `true` / `false`, integer and float literals,
//! single- or double-quoted strings, path access (`data.items[0].name`),
//! comparisons (`==` `!=` `<` `<=` `>` `>=`), short-circuiting `&&` / `||`,
//! unary `!` and `-`, parentheses, and the builtins `len(x)` and
//! `contains(collection, item)`. A missing key or out-of-range index
//! evaluates to `null` rather than an error, so existence checks compose.

mod eval;
mod parse;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unexpected character {ch:?} at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("identifier {0:?} is not in the evaluation scope")]
    NotAllowed(String),

    #[error("function {0:?} is not allowed")]
    UnknownFunction(String),

    #[error("{name}() expects {expected} argument(s), got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Named bindings visible to an expression.
///
/// The scope starts empty; callers bind exactly the values the expression is
/// allowed to see. Binding the same name twice shadows the earlier value.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under `name` (builder-style).
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// Parse and evaluate `source` against `scope`.
pub fn evaluate(source: &str, scope: &Scope) -> Result<Value, ExprError> {
    let ast = parse::parse(source)?;
    eval::eval(&ast, scope)
}

/// Truthiness: `false`, `null`, `0`, `0.0`, and `""` are falsey; everything
/// else (including empty arrays and objects) is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_scope(data: Value) -> Scope {
        Scope::new().bind("data", data)
    }

    #[test]
    fn literal_comparisons() {
        let scope = Scope::new();
        assert_eq!(evaluate("1 < 2", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("2 <= 2", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("'a' == \"a\"", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("1 != 1", &scope).unwrap(), json!(false));
        assert_eq!(evaluate("1 == 1.0", &scope).unwrap(), json!(true));
    }

    #[test]
    fn path_access_reads_nested_fields() {
        let scope = data_scope(json!({"files": ["a.rs", "b.rs"], "meta": {"ok": true}}));
        assert_eq!(evaluate("data.meta.ok", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("data.files[1]", &scope).unwrap(), json!("b.rs"));
    }

    #[test]
    fn missing_path_yields_null() {
        let scope = data_scope(json!({"a": 1}));
        assert_eq!(evaluate("data.missing", &scope).unwrap(), Value::Null);
        assert_eq!(evaluate("data.missing.deeper", &scope).unwrap(), Value::Null);
        assert_eq!(evaluate("data.a[99]", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn unknown_root_is_not_allowed() {
        let scope = data_scope(json!({}));
        let err = evaluate("process.exit", &scope).unwrap_err();
        assert!(
            matches!(err, ExprError::NotAllowed(ref name) if name == "process"),
            "expected NotAllowed, got: {err}"
        );
    }

    #[test]
    fn unknown_function_is_rejected() {
        let scope = data_scope(json!({}));
        let err = evaluate("require('fs')", &scope).unwrap_err();
        assert!(
            matches!(err, ExprError::UnknownFunction(ref name) if name == "require"),
            "expected UnknownFunction, got: {err}"
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right-hand side would fail with NotAllowed if evaluated.
        let scope = data_scope(json!({"ok": true}));
        assert_eq!(evaluate("data.ok || bogus.path", &scope).unwrap(), json!(true));
        assert_eq!(
            evaluate("!data.ok && bogus.path", &scope).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn builtin_len() {
        let scope = data_scope(json!({"files": [1, 2, 3], "name": "abc"}));
        assert_eq!(evaluate("len(data.files)", &scope).unwrap(), json!(3));
        assert_eq!(evaluate("len(data.name) == 3", &scope).unwrap(), json!(true));
    }

    #[test]
    fn builtin_contains() {
        let scope = data_scope(json!({"files": ["a.rs", "b.rs"], "log": "all tests passed"}));
        assert_eq!(
            evaluate("contains(data.files, 'a.rs')", &scope).unwrap(),
            json!(true)
        );
        assert_eq!(
            evaluate("contains(data.log, 'passed')", &scope).unwrap(),
            json!(true)
        );
        assert_eq!(
            evaluate("contains(data.files, 'c.rs')", &scope).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn len_wrong_arity() {
        let scope = data_scope(json!({}));
        let err = evaluate("len()", &scope).unwrap_err();
        assert!(
            matches!(err, ExprError::WrongArity { .. }),
            "expected WrongArity, got: {err}"
        );
    }

    #[test]
    fn unary_not_and_minus() {
        let scope = data_scope(json!({"count": 5}));
        assert_eq!(evaluate("!data.count", &scope).unwrap(), json!(false));
        assert_eq!(evaluate("-data.count < 0", &scope).unwrap(), json!(true));
    }

    #[test]
    fn oversized_literal_compares_by_value() {
        let scope = data_scope(json!({"big": u64::MAX}));
        assert_eq!(
            evaluate("data.big > 9223372036854775808", &scope).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn truthiness_table() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn parse_error_on_garbage() {
        let scope = Scope::new();
        assert!(evaluate("1 +* 2", &scope).is_err());
        assert!(evaluate("", &scope).is_err());
        assert!(evaluate("'unterminated", &scope).is_err());
    }

    #[test]
    fn bind_shadows_earlier_value() {
        let scope = Scope::new()
            .bind("data", json!(1))
            .bind("data", json!(2));
        assert_eq!(evaluate("data", &scope).unwrap(), json!(2));
    }
}
