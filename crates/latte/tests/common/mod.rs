#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use latte::{Meta, Record, Reporter, RunReport};

/// Route engine tracing into the test writer; `RUST_LOG=latte=trace` shows
/// the job lifecycle when a test misbehaves.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared event log for asserting on the reporter stream.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn new() -> Events {
        Events::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.snapshot()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

/// Records every lifecycle event as a string.
pub struct RecordingReporter {
    events: Events,
}

impl RecordingReporter {
    pub fn new(events: Events) -> RecordingReporter {
        RecordingReporter { events }
    }
}

impl Reporter for RecordingReporter {
    fn start(&mut self) {
        self.events.push("start");
    }

    fn suite_start(&mut self, suite: &Meta) {
        self.events.push(format!("suite start: {}", suite.display_title()));
    }

    fn test_start(&mut self, test: &Meta) {
        self.events.push(format!("test start: {}", test.display_title()));
    }

    fn test_end(&mut self, record: &Record) {
        self.events
            .push(format!("test end: {} [{:?}]", record.title, record.status));
    }

    fn suite_end(&mut self, suite: &Meta) {
        self.events.push(format!("suite end: {}", suite.display_title()));
    }

    fn end(&mut self, _report: &RunReport) {
        self.events.push("end");
    }
}
