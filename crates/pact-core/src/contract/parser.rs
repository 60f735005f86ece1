//! Extraction of embedded contracts from free-form agent output.
//!
//! Agent output declares a contract with a marker line such as:
//!
//! ```text
//! TEST_CONTRACT: {
//!   "preconditions": [
//!     {"name": "handoff has files", "test": "len(data.files) > 0", "critical": true}
//!   ],
//!   "rollback": "data.previous"
//! }
//! ```
//!
//! The literal is delimited by brace-balance scanning rather than a strict
//! grammar, so nested braces inside condition expressions (and inside string
//! literals) do not confuse extraction. Absence of a contract is a normal
//! outcome, not an error: [`parse_contract`] returns `None` and never
//! propagates a failure to the caller.

use serde_json::Value;
use thiserror::Error;

use super::{Condition, Contract, Predicate, Rollback, UNNAMED_CONDITION};

/// Marker token that introduces an embedded contract.
pub const CONTRACT_MARKER: &str = "TEST_CONTRACT:";

/// Errors that can occur while decoding an embedded contract literal.
///
/// These never escape [`parse_contract`]; they exist so the fallible steps
/// compose with `?` and so failures log with a precise cause.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("no opening brace after contract marker")]
    MissingOpeningBrace,

    #[error("unbalanced braces in contract literal")]
    UnbalancedBraces,

    #[error("contract literal is not valid JSON: {0}")]
    InvalidLiteral(#[from] serde_json::Error),

    #[error("invalid contract shape: {0}")]
    InvalidShape(String),
}

/// Extract and decode the first embedded contract in `text`.
///
/// Returns `None` when no marker is present (the expected no-contract case)
/// and when the literal is malformed (logged, never an error).
pub fn parse_contract(text: &str) -> Option<Contract> {
    let marker_at = match text.find(CONTRACT_MARKER) {
        Some(pos) => pos,
        None => {
            tracing::debug!("no contract marker in agent output");
            return None;
        }
    };

    match extract_and_decode(&text[marker_at + CONTRACT_MARKER.len()..]) {
        Ok(contract) => Some(contract),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse embedded contract");
            None
        }
    }
}

fn extract_and_decode(after_marker: &str) -> Result<Contract, ContractError> {
    let literal = delimit_literal(after_marker)?;
    let value: Value = serde_json::from_str(literal)?;

    if !is_valid_contract(&value) {
        return Err(ContractError::InvalidShape(
            "expected an object with a preconditions or postconditions array".to_string(),
        ));
    }

    contract_from_value(&value)
}

/// Locate the balanced `{ ... }` literal following the marker.
///
/// Scans forward tracking brace depth; braces inside double-quoted JSON
/// strings (and escaped quotes) are ignored.
fn delimit_literal(after_marker: &str) -> Result<&str, ContractError> {
    let open = after_marker
        .find('{')
        .ok_or(ContractError::MissingOpeningBrace)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in after_marker[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&after_marker[open..open + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(ContractError::UnbalancedBraces)
}

/// Structural validity per the contract invariant: an object with at least
/// one of `preconditions` / `postconditions` present as an array. An empty
/// array still counts as present.
pub fn is_valid_contract(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    map.get("preconditions").is_some_and(Value::is_array)
        || map.get("postconditions").is_some_and(Value::is_array)
}

/// Defensive conversion from the decoded literal into a [`Contract`].
fn contract_from_value(value: &Value) -> Result<Contract, ContractError> {
    let map = value
        .as_object()
        .ok_or_else(|| ContractError::InvalidShape("contract is not an object".to_string()))?;

    let preconditions = conditions_from_value(map.get("preconditions"), "preconditions")?;
    let postconditions = conditions_from_value(map.get("postconditions"), "postconditions")?;

    let rollback = match map.get("rollback") {
        None | Some(Value::Null) => None,
        Some(Value::String(src)) => Some(Rollback::Expression(src.clone())),
        Some(other) => {
            return Err(ContractError::InvalidShape(format!(
                "rollback must be an expression string, got {other}"
            )));
        }
    };

    Ok(Contract {
        preconditions,
        postconditions,
        rollback,
    })
}

fn conditions_from_value(
    value: Option<&Value>,
    phase: &str,
) -> Result<Option<Vec<Condition>>, ContractError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let items = value.as_array().ok_or_else(|| {
        ContractError::InvalidShape(format!("{phase} is present but not an array"))
    })?;

    let mut conditions = Vec::with_capacity(items.len());
    for item in items {
        conditions.push(condition_from_value(item, phase)?);
    }
    Ok(Some(conditions))
}

fn condition_from_value(value: &Value, phase: &str) -> Result<Condition, ContractError> {
    let map = value.as_object().ok_or_else(|| {
        ContractError::InvalidShape(format!("{phase} entry is not an object"))
    })?;

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(UNNAMED_CONDITION)
        .to_string();

    // A missing or non-string test decodes as Invalid and fails at
    // execution time rather than at parse time.
    let test = match map.get("test") {
        Some(Value::String(src)) => Predicate::Expression(src.clone()),
        _ => Predicate::Invalid,
    };

    let critical = map
        .get("critical")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let error_message = map
        .get("errorMessage")
        .or_else(|| map.get("error_message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Condition {
        name,
        test,
        critical,
        error_message,
    })
}
