//! Condition execution: runs a single check and walks an ordered list with
//! short-circuit-on-critical-failure semantics.
//!
//! [`run_condition`] never returns an error: exceptions, timeouts, and
//! malformed predicates are all converted into a failing
//! [`ConditionResult`]. [`run_conditions`] executes strictly left to right —
//! conditions may depend on side effects of earlier ones — and stops at the
//! first failing critical condition, leaving the remaining conditions
//! unexecuted.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::contract::{Condition, ConditionResult, Predicate, ValidationOutcome};
use crate::expr::{self, Scope};

/// Execute one condition against `args`.
///
/// Native tests run under `timeout`; a timeout becomes a failing result with
/// `error_message = "timed out"`. Expression tests bind the first argument
/// as `data` and are not time-limited (they are pure and always terminate).
pub async fn run_condition(
    condition: &Condition,
    args: &[Value],
    timeout: Duration,
) -> ConditionResult {
    let start = Instant::now();

    let test_result = match &condition.test {
        Predicate::Native(test) => match tokio::time::timeout(timeout, test.check(args)).await {
            Ok(Ok(passed)) => Ok(passed),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_elapsed) => {
                let duration_ms = elapsed_ms(start);
                tracing::warn!(
                    condition = %condition.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "condition test timed out"
                );
                return ConditionResult {
                    name: condition.name.clone(),
                    passed: false,
                    duration_ms,
                    critical: condition.critical,
                    error_message: Some("timed out".to_string()),
                    error: Some(format!(
                        "test did not complete within {}ms",
                        timeout.as_millis()
                    )),
                };
            }
        },
        Predicate::Expression(source) => {
            let scope = Scope::new().bind("data", args.first().cloned().unwrap_or(Value::Null));
            expr::evaluate(source, &scope)
                .map(|value| expr::truthy(&value))
                .map_err(|e| e.to_string())
        }
        Predicate::Invalid => Err("invalid test function".to_string()),
    };

    let duration_ms = elapsed_ms(start);

    match test_result {
        Ok(passed) => ConditionResult {
            name: condition.name.clone(),
            passed,
            duration_ms,
            critical: condition.critical,
            error_message: condition.error_message.clone(),
            error: None,
        },
        Err(error) => {
            tracing::debug!(condition = %condition.name, error = %error, "condition test raised");
            ConditionResult {
                name: condition.name.clone(),
                passed: false,
                duration_ms,
                critical: condition.critical,
                error_message: Some(
                    condition
                        .error_message
                        .clone()
                        .unwrap_or_else(|| error.clone()),
                ),
                error: Some(error),
            }
        }
    }
}

/// Run an ordered list of conditions and produce the phase outcome.
///
/// Only a critical failure flips `passed` to false; non-critical failures
/// are recorded and execution continues. An empty list trivially passes.
pub async fn run_conditions(
    conditions: &[Condition],
    args: &[Value],
    timeout: Duration,
) -> ValidationOutcome {
    let mut results = Vec::with_capacity(conditions.len());
    let mut passed = true;

    for condition in conditions {
        let result = run_condition(condition, args, timeout).await;
        let critical_failure = !result.passed && result.critical;
        results.push(result);

        if critical_failure {
            passed = false;
            break;
        }
    }

    ValidationOutcome { passed, results }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
