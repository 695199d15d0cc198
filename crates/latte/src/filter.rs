//! Title filtering — regex grep, literal substring match, and inversion.

use regex::Regex;

/// Decides which tests run, by full title.
///
/// A regex `grep` takes precedence over a literal `fgrep` substring; with
/// neither set the filter is inactive and everything runs. `invert` flips
/// the verdict for tests.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    grep: Option<Regex>,
    fgrep: Option<String>,
    invert: bool,
}

impl Filter {
    pub fn grep(mut self, pattern: Regex) -> Self {
        self.grep = Some(pattern);
        self
    }

    pub fn fgrep(mut self, needle: impl Into<String>) -> Self {
        self.fgrep = Some(needle.into());
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn is_active(&self) -> bool {
        self.grep.is_some() || self.fgrep.is_some()
    }

    fn raw_match(&self, full_title: &str) -> bool {
        if let Some(pattern) = &self.grep {
            return pattern.is_match(full_title);
        }
        if let Some(needle) = &self.fgrep {
            return full_title.contains(needle.as_str());
        }
        true
    }

    /// Whether a test with this full title should run.
    pub fn matches(&self, full_title: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        self.raw_match(full_title) != self.invert
    }

    /// Positive pre-match for suites: a matching suite title pulls in its
    /// whole subtree. Inversion never pre-matches a subtree; exclusion is
    /// decided per test.
    pub fn pre_matches(&self, full_title: &str) -> bool {
        self.is_active() && !self.invert && self.raw_match(full_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_filter_matches_everything() {
        let filter = Filter::default();
        assert!(filter.matches("anything at all"));
        assert!(!filter.pre_matches("anything at all"));
    }

    #[test]
    fn grep_matches_by_regex() {
        let filter = Filter::default().grep(Regex::new("math.*adds").unwrap());
        assert!(filter.matches("math suite adds numbers"));
        assert!(!filter.matches("string suite concatenates"));
    }

    #[test]
    fn fgrep_matches_by_substring() {
        let filter = Filter::default().fgrep("adds");
        assert!(filter.matches("math adds numbers"));
        assert!(!filter.matches("math multiplies"));
    }

    #[test]
    fn grep_wins_over_fgrep() {
        let filter = Filter::default()
            .grep(Regex::new("^a").unwrap())
            .fgrep("zzz");
        assert!(filter.matches("abc"));
    }

    #[test]
    fn invert_flips_test_matches_but_not_suite_prematch() {
        let filter = Filter::default().fgrep("slow").invert(true);
        assert!(!filter.matches("slow network test"));
        assert!(filter.matches("fast unit test"));
        assert!(!filter.pre_matches("fast unit test"));
    }
}
