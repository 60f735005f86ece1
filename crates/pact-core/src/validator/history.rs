//! In-memory validation history and aggregate statistics.
//!
//! The history is process-scoped: created with the validator, cleared only
//! by an explicit reset or process end. Statistics are computed on demand;
//! nothing is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How many records the `recent` window of [`ValidationStats`] covers.
pub const RECENT_WINDOW: usize = 10;

/// One handoff validation attempt, appended after every attempt regardless
/// of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub validation_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Aggregate view over the validation history.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationStats {
    pub total_validations: usize,
    /// Mean validation duration, rounded to whole milliseconds.
    pub average_duration_ms: u64,
    /// The last [`RECENT_WINDOW`] records, oldest first.
    pub recent: Vec<ValidationRecord>,
}

pub(crate) fn compute_stats(records: &[ValidationRecord]) -> ValidationStats {
    let total_validations = records.len();
    let average_duration_ms = if records.is_empty() {
        0
    } else {
        let sum: u64 = records.iter().map(|r| r.duration_ms).sum();
        (sum as f64 / records.len() as f64).round() as u64
    };
    let start = records.len().saturating_sub(RECENT_WINDOW);
    let recent = records[start..].to_vec();

    ValidationStats {
        total_validations,
        average_duration_ms,
        recent,
    }
}
