//! Reporter interface and reference reporters.
//!
//! Reporters are synchronous event sinks: they render the engine's
//! lifecycle stream and never influence scheduling. [`SpecReporter`] prints
//! the indented tree:
//!
//! ```text
//! Calculator
//!   ✓ adds two numbers
//!   when negative
//!     ✓ handles negatives
//!     ✗ fails on overflow
//! ```

use serde::Serialize;

use crate::error::TestError;
use crate::job::Outcome;
use crate::runner::RunReport;
use crate::suite::Meta;

// ============================================================================
// Record — one completed outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Test,
    Hook,
}

/// How a passing duration compares to the slow threshold (medium starts at
/// half of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

impl Speed {
    fn classify(duration_ms: u64, slow_ms: u64) -> Speed {
        if duration_ms > slow_ms {
            Speed::Slow
        } else if duration_ms > slow_ms / 2 {
            Speed::Medium
        } else {
            Speed::Fast
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrRecord {
    pub message: String,
    pub name: String,
}

/// One completed test or hook outcome, in completion order. Serializes to
/// the machine-readable shape consumed by structured reporters:
/// `{ title, fullTitle, duration, currentRetry, err? }`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub title: String,
    pub full_title: String,
    /// Milliseconds.
    pub duration: u64,
    pub current_retry: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrRecord>,
    #[serde(skip)]
    pub status: Status,
    #[serde(skip)]
    pub kind: RecordKind,
    #[serde(skip)]
    pub depth: usize,
    #[serde(skip)]
    pub speed: Speed,
}

impl Record {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        title: String,
        full_title: String,
        kind: RecordKind,
        depth: usize,
        duration_ms: u64,
        slow_ms: u64,
        current_retry: u32,
        outcome: &Outcome,
    ) -> Record {
        let (status, err) = match outcome {
            Outcome::Passed => (Status::Passed, None),
            Outcome::Pending => (Status::Pending, None),
            Outcome::Failed(err) => (Status::Failed, Some(ErrRecord::from(err))),
        };
        Record {
            title,
            full_title,
            duration: duration_ms,
            current_retry,
            err,
            status,
            kind,
            depth,
            speed: Speed::classify(duration_ms, slow_ms),
        }
    }

    pub fn failed(&self) -> bool {
        self.status == Status::Failed
    }
}

impl From<&TestError> for ErrRecord {
    fn from(err: &TestError) -> ErrRecord {
        ErrRecord {
            message: err.to_string(),
            name: err.name().to_string(),
        }
    }
}

// ============================================================================
// Reporter — the event sink contract
// ============================================================================

/// Lifecycle event sink. All methods are synchronous and side-effecting
/// only; the default implementations ignore everything, so a reporter
/// overrides just the events it renders.
pub trait Reporter: Send {
    fn start(&mut self) {}
    fn suite_start(&mut self, _suite: &Meta) {}
    fn test_start(&mut self, _test: &Meta) {}
    fn test_end(&mut self, _record: &Record) {}
    fn suite_end(&mut self, _suite: &Meta) {}
    fn end(&mut self, _report: &RunReport) {}
}

/// Discards every event. Useful when only the [`RunReport`] matters.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

// ============================================================================
// ANSI color helpers
// ============================================================================

fn use_color() -> bool {
    // Respect NO_COLOR env var (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

fn green(s: &str) -> String {
    if use_color() {
        format!("\x1b[32m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn red(s: &str) -> String {
    if use_color() {
        format!("\x1b[31m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn yellow(s: &str) -> String {
    if use_color() {
        format!("\x1b[33m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn bold(s: &str) -> String {
    if use_color() {
        format!("\x1b[1m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn dim(s: &str) -> String {
    if use_color() {
        format!("\x1b[2m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

// ============================================================================
// SpecReporter — the reference renderer
// ============================================================================

/// Colored, indented tree output with a failure digest and summary.
#[derive(Debug, Default)]
pub struct SpecReporter;

impl SpecReporter {
    pub fn new() -> SpecReporter {
        SpecReporter
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

impl Reporter for SpecReporter {
    fn start(&mut self) {
        println!();
    }

    fn suite_start(&mut self, suite: &Meta) {
        // The anonymous root prints nothing.
        if suite.depth == 0 {
            return;
        }
        println!(
            "{}{}",
            indent(suite.depth - 1),
            bold(&suite.display_title())
        );
    }

    fn test_end(&mut self, record: &Record) {
        let pad = indent(record.depth.saturating_sub(1));
        match record.status {
            Status::Passed => {
                let time_tag = match record.speed {
                    Speed::Fast => String::new(),
                    Speed::Medium => format!(" {}", dim(&format!("({}ms)", record.duration))),
                    Speed::Slow => format!(" {}", red(&format!("({}ms)", record.duration))),
                };
                println!("{pad}{} {}{}", green("✓"), record.title, time_tag);
            }
            Status::Pending => {
                println!("{pad}{} {}", yellow("-"), dim(&record.title));
            }
            Status::Failed => {
                println!("{pad}{} {}", red("✗"), red(&record.title));
                if let Some(err) = &record.err {
                    println!("{pad}  {}", red(&format!("Error: {}", err.message)));
                }
            }
        }
    }

    fn end(&mut self, report: &RunReport) {
        let stats = &report.stats;
        let elapsed = format!("{:.3}s", stats.marker.duration().as_secs_f64());

        let parts: Vec<String> = [
            (stats.passes > 0).then(|| green(&format!("{} passed", stats.passes))),
            (stats.failures > 0).then(|| red(&format!("{} failed", stats.failures))),
            (stats.pending > 0).then(|| yellow(&format!("{} pending", stats.pending))),
        ]
        .into_iter()
        .flatten()
        .collect();
        let summary = format!("{} ({})", parts.join(", "), dim(&elapsed));

        println!();
        if stats.failures > 0 || report.fatal.is_some() {
            println!("{}", red("FAIL"));
            println!("{summary}");
            let failures: Vec<&Record> = report.failures().collect();
            if !failures.is_empty() {
                println!();
                println!("Failures:");
                for (i, failure) in failures.iter().enumerate() {
                    let message = failure
                        .err
                        .as_ref()
                        .map(|e| e.message.as_str())
                        .unwrap_or("unknown error");
                    println!("  {}. {}: {}", i + 1, failure.full_title, message);
                }
            }
            if let Some(fatal) = &report.fatal {
                println!();
                println!("{}", red(&format!("Fatal: {fatal}")));
            }
            println!();
        } else {
            println!("{}", green("PASS"));
            println!("{summary}");
        }
    }
}

// ============================================================================
// JsonReporter — machine-readable output
// ============================================================================

/// Serializes the whole run as one JSON document on `end`.
#[derive(Debug, Default)]
pub struct JsonReporter {
    pub pretty: bool,
}

impl JsonReporter {
    pub fn new() -> JsonReporter {
        JsonReporter { pretty: false }
    }

    fn document(report: &RunReport) -> serde_json::Value {
        let stats = &report.stats;
        let failures: Vec<&Record> = report
            .records
            .iter()
            .filter(|r| r.status == Status::Failed)
            .collect();
        let passes: Vec<&Record> = report
            .records
            .iter()
            .filter(|r| r.status == Status::Passed)
            .collect();
        let pending: Vec<&Record> = report
            .records
            .iter()
            .filter(|r| r.status == Status::Pending)
            .collect();
        serde_json::json!({
            "stats": {
                "suites": stats.suites,
                "tests": stats.tests,
                "passes": stats.passes,
                "pending": stats.pending,
                "failures": stats.failures,
                "duration": stats.marker.duration().as_millis() as u64,
            },
            "tests": &report.records,
            "passes": passes,
            "pending": pending,
            "failures": failures,
        })
    }
}

impl Reporter for JsonReporter {
    fn end(&mut self, report: &RunReport) {
        let doc = Self::document(report);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        };
        match rendered {
            Ok(out) => println!("{out}"),
            Err(err) => eprintln!("latte: failed to serialize run report: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_classification_uses_half_slow_as_medium() {
        assert_eq!(Speed::classify(10, 75), Speed::Fast);
        assert_eq!(Speed::classify(40, 75), Speed::Medium);
        assert_eq!(Speed::classify(80, 75), Speed::Slow);
    }

    #[test]
    fn record_serializes_to_the_wire_shape() {
        let record = Record::new(
            "boom".into(),
            "suite boom".into(),
            RecordKind::Test,
            2,
            12,
            75,
            1,
            &Outcome::Failed(TestError::Failed("kaput".into())),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["title"], "boom");
        assert_eq!(value["fullTitle"], "suite boom");
        assert_eq!(value["duration"], 12);
        assert_eq!(value["currentRetry"], 1);
        assert_eq!(value["err"]["message"], "kaput");
        assert_eq!(value["err"]["name"], "Failed");
        assert!(value.get("status").is_none());
    }

    #[test]
    fn passing_record_omits_err() {
        let record = Record::new(
            "fine".into(),
            "fine".into(),
            RecordKind::Test,
            1,
            1,
            75,
            0,
            &Outcome::Passed,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("err").is_none());
        assert!(!record.failed());
    }
}
