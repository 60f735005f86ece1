//! `pact validate`: run a full handoff validation over an agent output file.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use pact_core::config::ValidatorConfig;
use pact_core::validator::{HandoffReport, HandoffValidator};

pub struct ValidateArgs<'a> {
    pub file: &'a Path,
    pub from_agent: &'a str,
    pub to_agent: &'a str,
    pub data_file: Option<&'a Path>,
    pub json: bool,
}

/// Run the validation and print the report. Returns the success flag so the
/// caller can set the process exit code.
pub async fn run_validate(args: ValidateArgs<'_>, config: ValidatorConfig) -> Result<bool> {
    let agent_output = std::fs::read_to_string(args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let handoff_data = match args.data_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => Value::Null,
    };

    let validator = HandoffValidator::new(config);
    let report = validator
        .validate_handoff(args.from_agent, args.to_agent, &agent_output, &handoff_data)
        .await;
    tracing::debug!(validation_id = %report.validation_id, success = report.success, "validation finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.success)
}

fn print_report(report: &HandoffReport) {
    println!("Validation {}: {}", report.validation_id, report.state);

    if let Some(reason) = &report.reason {
        println!("  Reason: {reason}");
    }

    if let Some(outcome) = &report.preconditions {
        println!(
            "  Preconditions: {}",
            if outcome.passed { "passed" } else { "FAILED" }
        );
        for result in &outcome.results {
            let status = if result.passed { "ok" } else { "fail" };
            print!("    [{status}] {} ({}ms)", result.name, result.duration_ms);
            if !result.passed {
                if let Some(message) = &result.error_message {
                    print!(": {message}");
                }
            }
            println!();
        }
    }

    if let Some(rollback) = &report.rollback {
        if rollback.rolled_back {
            println!("  Rollback: completed");
        } else if let Some(reason) = &rollback.reason {
            println!("  Rollback: skipped ({reason})");
        } else {
            println!(
                "  Rollback: FAILED ({})",
                rollback.error.as_deref().unwrap_or("unknown")
            );
        }
    }

    println!(
        "Handoff {}",
        if report.success { "ready" } else { "blocked" }
    );
}
