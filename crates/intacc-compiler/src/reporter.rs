//! Diagnostics reporting.
//!
//! Writes the ordered diagnostic sequence to the log file, one line per
//! diagnostic, and computes the process outcome. The log is written even
//! when compilation aborts, so a failed run always leaves evidence.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use intacc_core::Diagnostics;

/// The process-level result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Write all diagnostics to `logfile` and return the outcome.
///
/// Success iff no error-severity diagnostic was recorded. The writer is
/// scoped so the buffer flushes before this returns.
pub fn report(diagnostics: &Diagnostics, logfile: &Path) -> io::Result<Outcome> {
    {
        let file = File::create(logfile)?;
        let mut writer = BufWriter::new(file);
        diagnostics.emit(&mut writer)?;
        writer.flush()?;
    }
    debug!(
        logfile = %logfile.display(),
        lines = diagnostics.len(),
        "diagnostics written"
    );

    Ok(if diagnostics.has_errors() {
        Outcome::Failure
    } else {
        Outcome::Success
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use intacc_core::{Diagnostic, Span};

    #[test]
    fn success_when_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("compile.log");

        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::info("granting internal access to 'X'"));

        let outcome = report(&diagnostics, &log).unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), 0);

        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text, "info: granting internal access to 'X'\n");
    }

    #[test]
    fn failure_and_log_on_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("compile.log");

        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::error("boom", "a.cs", Span::new(3, 1, 4)));

        let outcome = report(&diagnostics, &log).unwrap();
        assert_eq!(outcome, Outcome::Failure);
        assert_eq!(outcome.exit_code(), 1);

        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("a.cs:3:1: error: boom"));
    }

    #[test]
    fn empty_diagnostics_still_produce_a_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("compile.log");

        let outcome = report(&Diagnostics::new(), &log).unwrap();
        assert!(outcome.is_success());
        assert!(log.exists());
    }
}
