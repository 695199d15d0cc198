//! Suite tree model — the shared runnable metadata and the tree of suites,
//! tests, and hooks the builder produces.

use std::sync::Arc;

use crate::error::BuildError;
use crate::filter::Filter;
use crate::job::Body;
use crate::stats::Marker;

// ============================================================================
// Config — the inherited snapshot
// ============================================================================

/// Per-runnable configuration. Copied from the nearest ancestor at creation,
/// then independently mutable (decorators at build time, [`Handle`]
/// mutators at run time).
///
/// [`Handle`]: crate::job::Handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Milliseconds; `0` disables the timeout for this runnable.
    pub timeout_ms: u64,
    pub timeouts_enabled: bool,
    /// Threshold above which a passing runnable is flagged as slow.
    pub slow_ms: u64,
    /// Additional attempts after a failed one.
    pub retries: u32,
    pub skip: bool,
    pub only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout_ms: 2000,
            timeouts_enabled: true,
            slow_ms: 75,
            retries: 0,
            skip: false,
            only: false,
        }
    }
}

// ============================================================================
// Meta — identity, timing, and config shared by every runnable
// ============================================================================

/// Identity and timing fields common to suites, tests, and hooks.
///
/// The title path is copied from the parent at creation (the anonymous
/// root's empty title is excluded), so no parent back-pointers exist in the
/// tree.
#[derive(Debug, Clone)]
pub struct Meta {
    pub title: String,
    /// Ancestor titles, outermost first.
    pub path: Vec<String>,
    /// Root is 0; every child is its parent plus one.
    pub depth: usize,
    pub config: Config,
    pub marker: Marker,
}

impl Meta {
    fn root(config: Config) -> Meta {
        Meta {
            title: String::new(),
            path: Vec::new(),
            depth: 0,
            config,
            marker: Marker::default(),
        }
    }

    pub(crate) fn child_of(parent: &Meta, title: &str) -> Result<Meta, BuildError> {
        validate_title(title)?;
        let mut path = parent.path.clone();
        if !parent.title.is_empty() {
            path.push(parent.title.clone());
        }
        Ok(Meta {
            title: title.to_string(),
            path,
            depth: parent.depth + 1,
            config: parent.config,
            marker: Marker::default(),
        })
    }

    /// Ancestor titles and own title joined with spaces.
    pub fn full_title(&self) -> String {
        if self.path.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.path.join(" "), self.title)
        }
    }

    /// Single-line display form: truncated at the first newline with an
    /// ellipsis marker.
    pub fn display_title(&self) -> String {
        match self.title.find('\n') {
            Some(cut) => format!("{}…", &self.title[..cut]),
            None => self.title.clone(),
        }
    }
}

fn validate_title(title: &str) -> Result<(), BuildError> {
    // Newlines are tolerated (display truncates); other control characters
    // would corrupt reporter output.
    if title.chars().any(|c| c.is_control() && c != '\n') {
        return Err(BuildError::InvalidTitle(title.to_string()));
    }
    Ok(())
}

// ============================================================================
// Hook
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn base_title(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "\"before all\" hook",
            HookKind::AfterAll => "\"after all\" hook",
            HookKind::BeforeEach => "\"before each\" hook",
            HookKind::AfterEach => "\"after each\" hook",
        }
    }
}

/// A setup/teardown body bound to one of the four lifecycle points.
pub struct Hook {
    pub meta: Meta,
    pub kind: HookKind,
    pub label: Option<String>,
    pub(crate) body: Body,
}

impl Hook {
    pub(crate) fn new(
        owner: &Meta,
        kind: HookKind,
        label: Option<&str>,
        body: Body,
    ) -> Result<Hook, BuildError> {
        let title = match label {
            Some(label) => format!("{}: {}", kind.base_title(), label),
            None => kind.base_title().to_string(),
        };
        Ok(Hook {
            meta: Meta::child_of(owner, &title)?,
            kind,
            label: label.map(str::to_string),
            body,
        })
    }

    /// Display title for a specific invocation; each-hooks name the test
    /// they run for.
    pub fn title_for(&self, test_title: Option<&str>) -> String {
        match test_title {
            Some(test) => format!("{} for \"{}\"", self.meta.title, test),
            None => self.meta.title.clone(),
        }
    }
}

// ============================================================================
// Test
// ============================================================================

/// A single test case. A test without a body is pending: reported and
/// counted, never run.
pub struct Test {
    pub meta: Meta,
    pub(crate) body: Option<Body>,
    /// Index of the current attempt, reset at the start of each run.
    pub current_retry: u32,
}

impl Test {
    pub(crate) fn new(owner: &Meta, title: &str, body: Option<Body>) -> Result<Test, BuildError> {
        Ok(Test {
            meta: Meta::child_of(owner, title)?,
            body,
            current_retry: 0,
        })
    }

    /// Whether this test participates in the run, given its suite's
    /// `matching` flag and the run-wide exclusive mode.
    pub(crate) fn included(&self, suite_matching: bool, filter: &Filter, exclusive: bool) -> bool {
        if exclusive && !self.meta.config.only {
            return false;
        }
        suite_matching || filter.matches(&self.meta.full_title())
    }
}

// ============================================================================
// Suite
// ============================================================================

/// A named grouping node owning child suites, tests, and hooks.
///
/// The each-hook lists are seeded from the parent at creation, so a suite's
/// `before_each` already holds its ancestors' hooks in outer-to-inner order.
pub struct Suite {
    pub meta: Meta,
    pub suites: Vec<Suite>,
    pub tests: Vec<Test>,
    pub before_all: Vec<Hook>,
    pub after_all: Vec<Hook>,
    pub before_each: Vec<Arc<Hook>>,
    pub after_each: Vec<Arc<Hook>>,
    /// True when this suite's own title matched the filter or an ancestor
    /// already matched; computed once before the run.
    pub matching: bool,
}

impl Suite {
    pub(crate) fn root(config: Config) -> Suite {
        Suite {
            meta: Meta::root(config),
            suites: Vec::new(),
            tests: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
            matching: false,
        }
    }

    pub(crate) fn child_of(&self, title: &str, only: bool, skip: bool) -> Result<Suite, BuildError> {
        let mut meta = Meta::child_of(&self.meta, title)?;
        meta.config.only |= only;
        meta.config.skip |= skip;
        Ok(Suite {
            meta,
            suites: Vec::new(),
            tests: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            before_each: self.before_each.clone(),
            after_each: self.after_each.clone(),
            matching: false,
        })
    }

    /// Number of tests that would run: matched by the filter and not
    /// excluded by exclusive mode, summed recursively.
    pub fn total(&self, filter: &Filter, exclusive: bool) -> usize {
        self.tests
            .iter()
            .filter(|test| test.included(self.matching, filter, exclusive))
            .count()
            + self
                .suites
                .iter()
                .map(|suite| suite.total(filter, exclusive))
                .sum::<usize>()
    }

    /// Whether any node below (or at) this suite is marked `only`.
    pub(crate) fn has_only(&self) -> bool {
        self.meta.config.only
            || self.tests.iter().any(|test| test.meta.config.only)
            || self.suites.iter().any(Suite::has_only)
    }

    /// Compute `matching` flags for the whole subtree.
    pub(crate) fn apply_filter(&mut self, filter: &Filter, parent_matching: bool) {
        self.matching = parent_matching || filter.pre_matches(&self.meta.full_title());
        for suite in &mut self.suites {
            suite.apply_filter(filter, self.matching);
        }
    }
}
