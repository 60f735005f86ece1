//! Contract-gated handoff validation for LLM coding agents.
//!
//! When one agent hands work to another, its output can embed a declarative
//! contract (marker: `TEST_CONTRACT:`) naming preconditions, postconditions,
//! and an optional rollback procedure. [`validator::HandoffValidator`]
//! extracts the contract, runs the conditions with critical/non-critical
//! severity and short-circuit semantics, rolls back on failure, and keeps an
//! in-memory history for statistics.
//!
//! ```no_run
//! use pact_core::config::ValidatorConfig;
//! use pact_core::validator::HandoffValidator;
//! use serde_json::json;
//!
//! # async fn demo() {
//! let validator = HandoffValidator::new(ValidatorConfig::default());
//! let report = validator
//!     .validate_handoff(
//!         "planner",
//!         "coder",
//!         "done. TEST_CONTRACT: {\"preconditions\": [{\"name\": \"has files\", \"test\": \"len(data.files) > 0\", \"critical\": true}]}",
//!         &json!({"files": ["src/lib.rs"]}),
//!     )
//!     .await;
//! assert!(report.success);
//! # }
//! ```

pub mod audit;
pub mod condition;
pub mod config;
pub mod contract;
pub mod expr;
pub mod validator;

pub use config::ValidatorConfig;
pub use contract::{
    Condition, ConditionResult, Contract, NativeTest, Predicate, Rollback, RollbackHandler,
    RollbackOutcome, ValidationOutcome,
};
pub use validator::{CompletionReport, HandoffReport, HandoffState, HandoffValidator, Phase};
