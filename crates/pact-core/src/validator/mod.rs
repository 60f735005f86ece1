//! Handoff validation workflow: parse the embedded contract, run
//! preconditions, roll back on failure, and record history.
//!
//! A handoff walks the state machine
//! `Start -> Parsed -> PreconditionsChecked -> {Ready | RolledBack | Error}`.
//! `Ready` means the handoff may proceed; postconditions are deferred to
//! [`HandoffValidator::validate_completion`], called after the receiving
//! agent finishes (its result does not exist at handoff time).
//!
//! Nothing in this module returns an error to the caller: every failure mode
//! — no contract, condition failures, rollback problems — is converted into
//! a structured report. Callers never need to wrap these entry points in
//! error handling.

pub mod history;

use std::slice;
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use serde_json::Value;

use crate::audit::AuditLog;
use crate::condition::run_conditions;
use crate::config::ValidatorConfig;
use crate::contract::{Contract, Rollback, RollbackOutcome, ValidationOutcome, parser};
use crate::expr::{self, Scope};

use history::{ValidationRecord, ValidationStats, compute_stats};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Protocol states of one handoff validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffState {
    /// Nothing has happened yet (also the final state when no contract is
    /// found — there was nothing to parse).
    Start,
    /// A contract was extracted from the agent output.
    Parsed,
    /// Preconditions have been executed.
    PreconditionsChecked,
    /// Terminal: the handoff may proceed.
    Ready,
    /// Terminal: the handoff is blocked and rollback was attempted.
    RolledBack,
    /// Terminal: unexpected failure, no guarantees about rollback.
    Error,
}

impl HandoffState {
    /// Whether `from -> to` is an edge in the state graph.
    pub fn is_valid_transition(from: HandoffState, to: HandoffState) -> bool {
        use HandoffState::*;
        matches!(
            (from, to),
            (Start, Parsed)
                | (Parsed, PreconditionsChecked)
                | (PreconditionsChecked, Ready)
                | (PreconditionsChecked, RolledBack)
                | (Start, Error)
                | (Parsed, Error)
                | (PreconditionsChecked, Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandoffState::Ready | HandoffState::RolledBack | HandoffState::Error
        )
    }
}

impl std::fmt::Display for HandoffState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandoffState::Start => "start",
            HandoffState::Parsed => "parsed",
            HandoffState::PreconditionsChecked => "preconditions_checked",
            HandoffState::Ready => "ready",
            HandoffState::RolledBack => "rolled_back",
            HandoffState::Error => "error",
        };
        f.write_str(name)
    }
}

/// The condition-checking stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preconditions,
    Postconditions,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Structured result of [`HandoffValidator::validate_handoff`].
#[derive(Debug, Clone, Serialize)]
pub struct HandoffReport {
    pub validation_id: String,
    pub success: bool,
    /// The state the handoff ended in.
    pub state: HandoffState,
    /// The phase that failed, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Human-readable failure reason (e.g. "no valid contract found").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<ValidationOutcome>,
    /// Present only when a failure triggered a rollback attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackOutcome>,
    /// The parsed contract, handed back so the caller can later run
    /// [`HandoffValidator::validate_completion`] against it.
    #[serde(skip)]
    pub contract: Option<Contract>,
}

/// Structured result of [`HandoffValidator::validate_completion`].
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub validation_id: String,
    pub success: bool,
    pub phase: Phase,
    pub postconditions: ValidationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackOutcome>,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates agent handoffs against contracts embedded in agent output.
///
/// The validator exclusively owns its validation history and exposes
/// read-only aggregate views; appends are synchronized so concurrent
/// handoffs do not lose updates.
pub struct HandoffValidator {
    config: ValidatorConfig,
    audit: AuditLog,
    history: Mutex<Vec<ValidationRecord>>,
}

impl HandoffValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let audit = AuditLog::new(&config.log_file);
        Self {
            config,
            audit,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a handoff from `from_agent` to `to_agent`.
    ///
    /// 1. Generate a validation id for correlation.
    /// 2. Parse the contract out of `agent_output`; none found is an
    ///    immediate failure with no rollback (there is no contract to
    ///    drive one).
    /// 3. Run preconditions against `handoff_data`; on failure, roll back
    ///    and report the outcome of both.
    /// 4. On success, hand back the contract so postconditions can run
    ///    later via [`Self::validate_completion`].
    /// 5. Append a history record regardless of outcome.
    pub async fn validate_handoff(
        &self,
        from_agent: &str,
        to_agent: &str,
        agent_output: &str,
        handoff_data: &Value,
    ) -> HandoffReport {
        let started = Instant::now();
        let validation_id = new_validation_id();

        tracing::info!(
            validation_id = %validation_id,
            from_agent,
            to_agent,
            "validating handoff"
        );
        self.audit.append(&format!(
            "validating handoff {validation_id}: {from_agent} -> {to_agent}"
        ));

        let report = self.run_handoff(&validation_id, agent_output, handoff_data).await;

        tracing::info!(
            validation_id = %validation_id,
            success = report.success,
            state = %report.state,
            "handoff validation finished"
        );

        // Unconditional side effect: every attempt is recorded.
        self.record_attempt(ValidationRecord {
            validation_id: validation_id.clone(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            timestamp: Utc::now(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });

        report
    }

    async fn run_handoff(
        &self,
        validation_id: &str,
        agent_output: &str,
        handoff_data: &Value,
    ) -> HandoffReport {
        // 2. Parse. No contract means the handoff never left Start.
        let Some(contract) = parser::parse_contract(agent_output) else {
            self.audit
                .append(&format!("{validation_id}: no valid contract found"));
            return HandoffReport {
                validation_id: validation_id.to_string(),
                success: false,
                state: HandoffState::Start,
                phase: None,
                reason: Some("no valid contract found".to_string()),
                preconditions: None,
                rollback: None,
                contract: None,
            };
        };

        // 3. Preconditions against the handoff data.
        let outcome = self.execute_preconditions(&contract, handoff_data).await;

        if !outcome.passed {
            self.audit.append(&format!(
                "{validation_id}: preconditions failed ({} result(s)), rolling back",
                outcome.results.len()
            ));
            let rollback = self
                .execute_rollback(&contract, handoff_data, "precondition validation failed")
                .await;
            return HandoffReport {
                validation_id: validation_id.to_string(),
                success: false,
                state: HandoffState::RolledBack,
                phase: Some(Phase::Preconditions),
                reason: Some("precondition validation failed".to_string()),
                preconditions: Some(outcome),
                rollback: Some(rollback),
                contract: Some(contract),
            };
        }

        // 4. Ready. Postconditions are deferred to validate_completion.
        self.audit
            .append(&format!("{validation_id}: preconditions passed, handoff ready"));
        HandoffReport {
            validation_id: validation_id.to_string(),
            success: true,
            state: HandoffState::Ready,
            phase: None,
            reason: None,
            preconditions: Some(outcome),
            rollback: None,
            contract: Some(contract),
        }
    }

    /// Run the contract's postconditions against the receiving agent's
    /// result, after it has finished its work. On failure, rollback is
    /// invoked with the agent result as context.
    pub async fn validate_completion(
        &self,
        validation_id: &str,
        agent_result: &Value,
        contract: &Contract,
    ) -> CompletionReport {
        tracing::info!(validation_id, "validating completion");

        let outcome = self.execute_postconditions(contract, agent_result).await;

        let rollback = if outcome.passed {
            self.audit
                .append(&format!("{validation_id}: postconditions passed"));
            None
        } else {
            self.audit.append(&format!(
                "{validation_id}: postconditions failed, rolling back"
            ));
            Some(
                self.execute_rollback(contract, agent_result, "postcondition validation failed")
                    .await,
            )
        };

        CompletionReport {
            validation_id: validation_id.to_string(),
            success: outcome.passed,
            phase: Phase::Postconditions,
            postconditions: outcome,
            rollback,
        }
    }

    /// Run the contract's preconditions against the handoff data.
    pub async fn execute_preconditions(
        &self,
        contract: &Contract,
        handoff_data: &Value,
    ) -> ValidationOutcome {
        let conditions = contract.preconditions.as_deref().unwrap_or_default();
        run_conditions(conditions, slice::from_ref(handoff_data), self.config.timeout).await
    }

    /// Run the contract's postconditions against the agent's result.
    pub async fn execute_postconditions(
        &self,
        contract: &Contract,
        agent_result: &Value,
    ) -> ValidationOutcome {
        let conditions = contract.postconditions.as_deref().unwrap_or_default();
        run_conditions(conditions, slice::from_ref(agent_result), self.config.timeout).await
    }

    /// Invoke the contract's rollback procedure, if any. Never fails: a
    /// missing procedure is an expected no-op, and handler errors and
    /// timeouts are reported in-band.
    pub async fn execute_rollback(
        &self,
        contract: &Contract,
        data: &Value,
        triggering_error: &str,
    ) -> RollbackOutcome {
        let Some(rollback) = &contract.rollback else {
            tracing::debug!("no rollback function configured");
            self.audit.append("no rollback function configured");
            return RollbackOutcome::skipped("no rollback function");
        };

        let outcome = match rollback {
            Rollback::Native(handler) => {
                match tokio::time::timeout(
                    self.config.timeout,
                    handler.roll_back(data, triggering_error),
                )
                .await
                {
                    Ok(Ok(detail)) => RollbackOutcome::completed(detail),
                    Ok(Err(e)) => RollbackOutcome::failed(e.to_string()),
                    Err(_elapsed) => RollbackOutcome::failed(format!(
                        "rollback did not complete within {}ms",
                        self.config.timeout.as_millis()
                    )),
                }
            }
            Rollback::Expression(source) => {
                let scope = Scope::new()
                    .bind("data", data.clone())
                    .bind("error", Value::String(triggering_error.to_string()));
                match expr::evaluate(source, &scope) {
                    Ok(detail) => RollbackOutcome::completed(detail),
                    Err(e) => RollbackOutcome::failed(e.to_string()),
                }
            }
        };

        if outcome.rolled_back {
            tracing::info!(trigger = triggering_error, "rollback completed");
            self.audit
                .append(&format!("rollback completed (trigger: {triggering_error})"));
        } else {
            tracing::warn!(
                trigger = triggering_error,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "rollback failed"
            );
            self.audit.append(&format!(
                "rollback failed (trigger: {triggering_error}): {}",
                outcome.error.as_deref().unwrap_or("unknown")
            ));
        }

        outcome
    }

    /// Aggregate statistics over the validation history.
    pub fn validation_stats(&self) -> ValidationStats {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        compute_stats(&history)
    }

    /// Clear the validation history.
    pub fn reset_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn record_attempt(&self, record: ValidationRecord) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

/// Validation ids are `val_<unix-millis>_<random suffix>` for correlation
/// across logs and reports.
fn new_validation_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("val_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_graph_edges() {
        use HandoffState::*;
        assert!(HandoffState::is_valid_transition(Start, Parsed));
        assert!(HandoffState::is_valid_transition(Parsed, PreconditionsChecked));
        assert!(HandoffState::is_valid_transition(PreconditionsChecked, Ready));
        assert!(HandoffState::is_valid_transition(
            PreconditionsChecked,
            RolledBack
        ));
        assert!(HandoffState::is_valid_transition(Parsed, Error));

        assert!(!HandoffState::is_valid_transition(Start, Ready));
        assert!(!HandoffState::is_valid_transition(Ready, Start));
        assert!(!HandoffState::is_valid_transition(RolledBack, Ready));
    }

    #[test]
    fn terminal_states() {
        assert!(HandoffState::Ready.is_terminal());
        assert!(HandoffState::RolledBack.is_terminal());
        assert!(HandoffState::Error.is_terminal());
        assert!(!HandoffState::Start.is_terminal());
        assert!(!HandoffState::Parsed.is_terminal());
        assert!(!HandoffState::PreconditionsChecked.is_terminal());
    }

    #[test]
    fn validation_ids_are_unique_and_prefixed() {
        let a = new_validation_id();
        let b = new_validation_id();
        assert!(a.starts_with("val_"), "unexpected id: {a}");
        assert_ne!(a, b, "two generated ids should differ");
    }
}
