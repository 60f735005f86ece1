//! `pact check`: parse the embedded contract in a file and print a summary.

use std::path::Path;

use anyhow::{Context, Result};

use pact_core::contract::parser::parse_contract;
use pact_core::contract::{Condition, Predicate};

pub fn run_check(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let Some(contract) = parse_contract(&text) else {
        println!("No contract found in {}.", file.display());
        return Ok(());
    };

    println!("Contract found in {}:", file.display());
    print_phase("Preconditions", contract.preconditions.as_deref());
    print_phase("Postconditions", contract.postconditions.as_deref());
    println!(
        "  Rollback: {}",
        if contract.rollback.is_some() {
            "configured"
        } else {
            "none"
        }
    );

    Ok(())
}

fn print_phase(label: &str, conditions: Option<&[Condition]>) {
    match conditions {
        None => println!("  {label}: absent"),
        Some([]) => println!("  {label}: empty"),
        Some(conditions) => {
            println!("  {label} ({}):", conditions.len());
            for condition in conditions {
                let severity = if condition.critical {
                    "critical"
                } else {
                    "non-critical"
                };
                let test = match &condition.test {
                    Predicate::Expression(src) => src.as_str(),
                    Predicate::Native(_) => "<native>",
                    Predicate::Invalid => "<invalid>",
                };
                println!("    - {} [{severity}]: {test}", condition.name);
            }
        }
    }
}
