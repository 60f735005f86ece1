//! Evaluator for the parsed expression AST.

use std::cmp::Ordering;

use serde_json::Value;

use super::parse::{Ast, BinOp, Segment, UnaryOp};
use super::{ExprError, Scope, truthy};

pub(crate) fn eval(ast: &Ast, scope: &Scope) -> Result<Value, ExprError> {
    match ast {
        Ast::Literal(value) => Ok(value.clone()),
        Ast::Path { root, segments } => eval_path(root, segments, scope),
        Ast::Unary { op, expr } => eval_unary(*op, expr, scope),
        Ast::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, scope),
        Ast::Call { name, args } => eval_call(name, args, scope),
    }
}

/// Walk a path from a scope binding. The root must exist in the scope
/// (capability restriction); every segment past it degrades to `null` when
/// the shape does not match, so contracts can probe for optional fields.
fn eval_path(root: &str, segments: &[Segment], scope: &Scope) -> Result<Value, ExprError> {
    let mut current = scope
        .get(root)
        .ok_or_else(|| ExprError::NotAllowed(root.to_string()))?
        .clone();

    for segment in segments {
        current = match segment {
            Segment::Key(key) => match current {
                Value::Object(ref map) => map.get(key).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Segment::Index(index_expr) => {
                let index = eval(index_expr, scope)?;
                match (&current, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| items.get(i as usize))
                        .cloned()
                        .unwrap_or(Value::Null),
                    (Value::Object(map), Value::String(key)) => {
                        map.get(key).cloned().unwrap_or(Value::Null)
                    }
                    _ => Value::Null,
                }
            }
        };
    }

    Ok(current)
}

fn eval_unary(op: UnaryOp, expr: &Ast, scope: &Scope) -> Result<Value, ExprError> {
    let value = eval(expr, scope)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
        UnaryOp::Neg => match value {
            Value::Number(n) => {
                // i64::MIN has no i64 negation; degrade to float.
                if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
                    Ok(Value::from(i))
                } else {
                    Ok(Value::from(-n.as_f64().unwrap_or(0.0)))
                }
            }
            other => Err(ExprError::TypeMismatch(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
    }
}

fn eval_binary(op: BinOp, lhs: &Ast, rhs: &Ast, scope: &Scope) -> Result<Value, ExprError> {
    // && and || short-circuit on truthiness.
    match op {
        BinOp::And => {
            let left = eval(lhs, scope)?;
            if !truthy(&left) {
                return Ok(Value::Bool(false));
            }
            let right = eval(rhs, scope)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        BinOp::Or => {
            let left = eval(lhs, scope)?;
            if truthy(&left) {
                return Ok(Value::Bool(true));
            }
            let right = eval(rhs, scope)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        _ => {}
    }

    let left = eval(lhs, scope)?;
    let right = eval(rhs, scope)?;

    match op {
        BinOp::Eq => Ok(Value::Bool(value_eq(&left, &right))),
        BinOp::NotEq => Ok(Value::Bool(!value_eq(&left, &right))),
        BinOp::Lt => Ok(Value::Bool(value_cmp(&left, &right)? == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(value_cmp(&left, &right)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(value_cmp(&left, &right)? == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(value_cmp(&left, &right)? != Ordering::Less)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(name: &str, args: &[Ast], scope: &Scope) -> Result<Value, ExprError> {
    let values: Vec<Value> = args
        .iter()
        .map(|a| eval(a, scope))
        .collect::<Result<_, _>>()?;

    match name {
        "len" => {
            let [value] = values.as_slice() else {
                return Err(ExprError::WrongArity {
                    name: name.to_string(),
                    expected: 1,
                    got: values.len(),
                });
            };
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ExprError::TypeMismatch(format!(
                        "len() expects a string, array, or object, got {}",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::from(len as u64))
        }
        "contains" => {
            let [haystack, needle] = values.as_slice() else {
                return Err(ExprError::WrongArity {
                    name: name.to_string(),
                    expected: 2,
                    got: values.len(),
                });
            };
            let found = match (haystack, needle) {
                (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
                (Value::Array(items), item) => items.iter().any(|v| value_eq(v, item)),
                (Value::Object(map), Value::String(key)) => map.contains_key(key),
                (other, _) => {
                    return Err(ExprError::TypeMismatch(format!(
                        "contains() expects a string, array, or object, got {}",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::Bool(found))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

/// Structural equality, except that numbers compare by value (`1 == 1.0`).
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for numbers and strings; anything else is a type error.
fn value_cmp(a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).ok_or_else(|| {
                ExprError::TypeMismatch("cannot order non-finite numbers".to_string())
            })
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (x, y) => Err(ExprError::TypeMismatch(format!(
            "cannot order {} against {}",
            type_name(x),
            type_name(y)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Scope, evaluate};
    use serde_json::json;

    #[test]
    fn object_index_by_string_key() {
        let scope = Scope::new().bind("data", json!({"metrics": {"pass_rate": 0.9}}));
        assert_eq!(
            evaluate("data.metrics['pass_rate'] > 0.5", &scope).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn ordering_mixed_types_is_a_type_error() {
        let scope = Scope::new().bind("data", json!({"a": "x"}));
        assert!(evaluate("data.a < 3", &scope).is_err());
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let scope = Scope::new();
        assert_eq!(evaluate("'abc' < 'abd'", &scope).unwrap(), json!(true));
    }

    #[test]
    fn negating_i64_min_degrades_to_float() {
        let scope = Scope::new().bind("data", json!({"count": i64::MIN}));
        assert_eq!(evaluate("-data.count > 0", &scope).unwrap(), json!(true));
        assert_eq!(evaluate("-data.count < 0", &scope).unwrap(), json!(false));
    }

    #[test]
    fn equality_covers_structures() {
        let scope = Scope::new().bind("data", json!({"tags": ["a", "b"]}));
        assert_eq!(
            evaluate("data.tags == data.tags", &scope).unwrap(),
            json!(true)
        );
    }
}
