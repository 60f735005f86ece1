//! Append-only audit log for validation activity.
//!
//! Every validator instance writes a line per notable event to a
//! configurable file, in the form:
//!
//! ```text
//! [2026-08-30T12:00:00.000000+00:00] HandoffValidator: validating handoff val_...: planner -> coder
//! ```
//!
//! Writes are best-effort: a failure to append is downgraded to a
//! `tracing::warn!` and never interrupts validation. When the `PACT_DEBUG`
//! environment variable is set to `"true"`, entries are mirrored to stderr.
//! Concurrent writers rely on the filesystem's atomic append semantics; no
//! in-process locking is performed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Tag prefixed to every audit line.
const LOG_TAG: &str = "HandoffValidator";

/// Environment variable that enables the stderr echo.
pub const DEBUG_ENV_VAR: &str = "PACT_DEBUG";

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    echo: bool,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let echo = std::env::var(DEBUG_ENV_VAR).is_ok_and(|v| v == "true");
        Self {
            path: path.into(),
            echo,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped entry. Best-effort; never fails.
    pub fn append(&self, message: &str) {
        let line = format!("[{}] {}: {}\n", Utc::now().to_rfc3339(), LOG_TAG, message);

        let write_result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = write_result {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to append to audit log"
            );
        }

        if self.echo {
            eprint!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_tagged_timestamped_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("audit.log");
        let log = AuditLog::new(&path);

        log.append("first message");
        log.append("second message");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.starts_with('['), "missing timestamp: {line}");
            assert!(
                line.contains("] HandoffValidator: "),
                "missing tag: {line}"
            );
        }
        assert!(lines[0].ends_with("first message"));
        assert!(lines[1].ends_with("second message"));
    }

    #[test]
    fn write_failure_does_not_panic() {
        // A directory path cannot be opened for append.
        let tmp = tempfile::TempDir::new().unwrap();
        let log = AuditLog::new(tmp.path());
        log.append("goes nowhere");
    }
}
