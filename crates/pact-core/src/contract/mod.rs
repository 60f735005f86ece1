//! Contract data model: conditions, predicates, rollback, and result types.
//!
//! A contract is a declarative bundle of preconditions, postconditions, and
//! an optional rollback procedure, embedded in an agent's free-form output
//! (see [`parser`]). Contracts decoded from text carry expression-string
//! predicates; native async predicates and rollback handlers are attached
//! programmatically.

pub mod parser;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Default name for a condition that does not declare one.
pub const UNNAMED_CONDITION: &str = "unnamed condition";

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A declarative validation contract.
///
/// Valid only if at least one of `preconditions` / `postconditions` is
/// present as a sequence; an empty sequence still counts as present.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    /// Checks run against the handoff data before the receiving agent starts.
    pub preconditions: Option<Vec<Condition>>,
    /// Checks run against the agent's result after it finishes.
    pub postconditions: Option<Vec<Condition>>,
    /// Recovery procedure invoked when a phase fails.
    pub rollback: Option<Rollback>,
}

impl Contract {
    /// Whether the contract satisfies the structural invariant.
    pub fn is_valid(&self) -> bool {
        self.preconditions.is_some() || self.postconditions.is_some()
    }
}

// ---------------------------------------------------------------------------
// Conditions and predicates
// ---------------------------------------------------------------------------

/// A single named, optionally critical check.
///
/// Use [`Condition::new`] for the required fields, then chain the optional
/// setters (builder-style).
#[derive(Debug, Clone)]
pub struct Condition {
    /// Human-readable name; defaults to [`UNNAMED_CONDITION`].
    pub name: String,
    /// The boolean-producing test.
    pub test: Predicate,
    /// Whether a failure of this condition blocks the rest of its phase.
    pub critical: bool,
    /// Message reported when the condition fails.
    pub error_message: Option<String>,
}

impl Condition {
    pub fn new(name: impl Into<String>, test: Predicate) -> Self {
        Self {
            name: name.into(),
            test,
            critical: false,
            error_message: None,
        }
    }

    /// Mark the condition critical.
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Set the failure message.
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A native (in-process) condition test.
///
/// Invoked with the arguments of the current phase: `[handoff_data]` for
/// preconditions, `[agent_result]` for postconditions. Errors are captured
/// by the executor and converted into a failing result.
#[async_trait]
pub trait NativeTest: Send + Sync {
    async fn check(&self, args: &[Value]) -> Result<bool>;
}

/// The test of a [`Condition`].
#[derive(Clone)]
pub enum Predicate {
    /// An expression evaluated by the restricted engine with the first
    /// argument bound as `data`.
    Expression(String),
    /// A native async callable.
    Native(Arc<dyn NativeTest>),
    /// A malformed `test` field decoded from a contract literal; always
    /// fails at execution with "invalid test function".
    Invalid,
}

impl Predicate {
    /// Expression-string predicate.
    pub fn expr(source: impl Into<String>) -> Self {
        Predicate::Expression(source.into())
    }

    /// Wrap a synchronous closure as a native predicate.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<bool> + Send + Sync + 'static,
    {
        struct FnTest<F>(F);

        #[async_trait]
        impl<F> NativeTest for FnTest<F>
        where
            F: Fn(&[Value]) -> Result<bool> + Send + Sync,
        {
            async fn check(&self, args: &[Value]) -> Result<bool> {
                (self.0)(args)
            }
        }

        Predicate::Native(Arc::new(FnTest(f)))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Expression(src) => f.debug_tuple("Expression").field(src).finish(),
            Predicate::Native(_) => f.write_str("Native(..)"),
            Predicate::Invalid => f.write_str("Invalid"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// A native rollback handler, invoked with the handoff context and the
/// message of the triggering error.
#[async_trait]
pub trait RollbackHandler: Send + Sync {
    async fn roll_back(&self, data: &Value, error: &str) -> Result<Value>;
}

/// The rollback procedure of a [`Contract`].
#[derive(Clone)]
pub enum Rollback {
    /// An expression evaluated with `data` and `error` bound.
    Expression(String),
    /// A native async handler.
    Native(Arc<dyn RollbackHandler>),
}

impl Rollback {
    pub fn expr(source: impl Into<String>) -> Self {
        Rollback::Expression(source.into())
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Expression(src) => f.debug_tuple("Expression").field(src).finish(),
            Rollback::Native(_) => f.write_str("Native(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The outcome of executing one condition.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    pub name: String,
    pub passed: bool,
    /// Wall-clock duration of the check in milliseconds.
    pub duration_ms: u64,
    pub critical: bool,
    /// The condition's configured failure message (or, on exception and
    /// timeout, a message describing what went wrong).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set only when the test itself raised an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The outcome of running a full ordered list of conditions.
///
/// `passed` is `false` only if a critical condition failed. `results` may be
/// truncated: execution stops at the first failing critical condition.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub results: Vec<ConditionResult>,
}

/// The outcome of a rollback attempt. Never an error: absence of a rollback
/// procedure and handler failures are both reported in-band.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    pub rolled_back: bool,
    /// Why no rollback ran (e.g. none was configured).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The handler's error message, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The handler's result, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl RollbackOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            rolled_back: false,
            reason: Some(reason.into()),
            error: None,
            detail: None,
        }
    }

    pub fn completed(detail: Value) -> Self {
        Self {
            rolled_back: true,
            reason: None,
            error: None,
            detail: Some(detail),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            rolled_back: false,
            reason: None,
            error: Some(error.into()),
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contract_valid_with_empty_preconditions() {
        let contract = Contract {
            preconditions: Some(vec![]),
            ..Default::default()
        };
        assert!(contract.is_valid());
    }

    #[test]
    fn contract_invalid_with_neither_phase() {
        assert!(!Contract::default().is_valid());
    }

    #[test]
    fn condition_builder_defaults() {
        let cond = Condition::new("build passes", Predicate::expr("data.ok"));
        assert!(!cond.critical);
        assert!(cond.error_message.is_none());

        let cond = cond.critical(true).error_message("build must pass");
        assert!(cond.critical);
        assert_eq!(cond.error_message.as_deref(), Some("build must pass"));
    }

    #[tokio::test]
    async fn from_fn_wraps_a_closure() {
        let pred = Predicate::from_fn(|args| Ok(args[0] == json!(42)));
        let Predicate::Native(test) = pred else {
            panic!("expected a native predicate");
        };
        assert!(test.check(&[json!(42)]).await.unwrap());
        assert!(!test.check(&[json!(0)]).await.unwrap());
    }

    #[test]
    fn rollback_outcome_constructors() {
        let skipped = RollbackOutcome::skipped("no rollback function");
        assert!(!skipped.rolled_back);
        assert_eq!(skipped.reason.as_deref(), Some("no rollback function"));

        let done = RollbackOutcome::completed(json!({"restored": true}));
        assert!(done.rolled_back);
        assert_eq!(done.detail, Some(json!({"restored": true})));

        let failed = RollbackOutcome::failed("disk full");
        assert!(!failed.rolled_back);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }
}
