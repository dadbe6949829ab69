//! Per-unit outcome.

use crate::config::Settings;
use crate::facts::FactsCache;
use crate::orchestrator::Disposition;
use crate::work_item::WorkItem;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Errors or unresolved preconditions remain.
    Failed {
        /// Recorded errors followed by precondition messages.
        errors: Vec<String>,
    },

    /// Not in the catalog.
    Skipped,

    /// Metadata-only run.
    MetadataFetched {
        /// Cached facts.
        location: PathBuf,
    },

    /// Dry run; changes stay in the checkout.
    DryRun { path: PathBuf, files: BTreeSet<String> },

    /// Local directory; changes stay in place.
    Local { path: PathBuf, files: BTreeSet<String> },

    /// A pull request was opened.
    Published {
        pull_request: String,
        files: BTreeSet<String>,
    },

    /// Nothing changed, or the plugin opted out of pull requests.
    NoChanges,
}

/// Outcome of one unit along with its warnings.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub name: String,
    pub outcome: UnitOutcome,
    pub warnings: Vec<String>,
    /// Local copy of the modernization record, if one was written.
    pub record: Option<PathBuf>,
}

impl UnitReport {
    /// Summarizes a processed unit.
    #[must_use]
    pub fn from_item(
        item: &WorkItem,
        disposition: Disposition,
        settings: &Settings,
        facts: &FactsCache,
    ) -> Self {
        let files = item.modified_files().clone();
        let outcome = if item.has_errors() || item.has_precondition_errors() {
            let errors = item
                .errors()
                .iter()
                .map(|err| err.describe().to_string())
                .chain(
                    item.precondition_errors()
                        .iter()
                        .map(|precondition| format!("Precondition error: {}", precondition.message())),
                )
                .collect();
            UnitOutcome::Failed { errors }
        } else if disposition == Disposition::Skipped {
            UnitOutcome::Skipped
        } else if settings.metadata_only {
            UnitOutcome::MetadataFetched {
                location: facts.path(item.name()),
            }
        } else if settings.dry_run {
            UnitOutcome::DryRun {
                path: item.checkout_path().to_path_buf(),
                files,
            }
        } else if item.is_local() {
            UnitOutcome::Local {
                path: item.checkout_path().to_path_buf(),
                files,
            }
        } else if let Some(url) = item.pull_request_url() {
            UnitOutcome::Published {
                pull_request: url.to_string(),
                files,
            }
        } else {
            UnitOutcome::NoChanges
        };

        Self {
            name: item.name().to_string(),
            outcome,
            warnings: item.warnings().to_vec(),
            record: item.record_location().map(std::path::Path::to_path_buf),
        }
    }

    /// Builds a failed report for a unit that never got a work item.
    #[must_use]
    pub fn failed(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            outcome: UnitOutcome::Failed {
                errors: vec![error.into()],
            },
            warnings: Vec::new(),
            record: None,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed { .. })
    }
}
