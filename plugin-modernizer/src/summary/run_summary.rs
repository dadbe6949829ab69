//! Run summary types.

use super::result::{UnitOutcome, UnitReport};

/// Summary of a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Whether this was a dry run.
    pub dry_run: bool,

    /// Whether only metadata was collected.
    pub metadata_only: bool,

    /// One report per requested unit, in processing order.
    pub reports: Vec<UnitReport>,
}

impl RunSummary {
    /// Creates a new empty summary.
    #[must_use]
    pub fn new(dry_run: bool, metadata_only: bool) -> Self {
        Self {
            dry_run,
            metadata_only,
            ..Default::default()
        }
    }

    /// Adds the report of one unit.
    pub fn record(&mut self, report: UnitReport) {
        self.reports.push(report);
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Skipped))
    }

    #[must_use]
    pub fn published(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Published { .. }))
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }

    /// Returns true if any unit ended with errors.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Returns true if every unit ended without errors.
    #[must_use]
    pub fn all_success(&self) -> bool {
        !self.has_failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn can_record_reports() {
        let mut summary = RunSummary::new(false, false);
        summary.record(UnitReport {
            name: "git".to_string(),
            outcome: UnitOutcome::Published {
                pull_request: "https://github.com/jenkinsci/git-plugin/pull/2".to_string(),
                files: BTreeSet::from(["pom.xml".to_string()]),
            },
            warnings: Vec::new(),
            record: None,
        });
        summary.record(UnitReport {
            name: "ghost".to_string(),
            outcome: UnitOutcome::Skipped,
            warnings: Vec::new(),
            record: None,
        });

        assert_eq!(summary.published(), 1);
        assert_eq!(summary.skipped(), 1);
        assert!(summary.all_success());

        summary.record(UnitReport::failed("ant", "Plugin is archived"));
        assert_eq!(summary.failed(), 1);
        assert!(summary.has_failures());
    }
}
