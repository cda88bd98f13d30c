//! Concurrent update checks across many packages.
//!
//! One task per package is spawned onto a [`JoinSet`]; each task holds a
//! permit from a shared semaphore while it loads the manifest, runs the
//! version check and, if the version changed, rewrites the manifest. The
//! join loop is the only writer of the report, and [`UpdateOrchestrator::check_all`]
//! does not return until every task has finished.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::checkver::{VersionCheck, VersionChecker};
use crate::config::CONCURRENCY;
use crate::manifest::{ManifestError, ManifestStore};

// ============================================================================
// Outcomes
// ============================================================================

/// What a version check concluded for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// No manifest in the bucket; the id is ignored.
    Missing,
    /// The detected version equals the stored one.
    Unchanged { version: String },
    /// A new version was found and the manifest was rewritten.
    Updated { from: String, to: String },
    /// The version could not be determined; the stored version is kept.
    Indeterminate { version: String, reason: String },
    /// The manifest could not be read or written.
    Failed { error: String },
}

/// Per-package result of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub id: String,
    pub status: CheckStatus,
}

impl CheckOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self.status, CheckStatus::Updated { .. })
    }
}

/// All outcomes of an update run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl UpdateReport {
    /// Ids whose manifest was rewritten with a new version.
    ///
    /// Order follows completion, not input.
    pub fn updated_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.is_updated())
            .map(|o| o.id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs version checks for a set of packages under a concurrency cap.
pub struct UpdateOrchestrator {
    store: ManifestStore,
    checker: Arc<dyn VersionChecker>,
    concurrency: usize,
}

impl UpdateOrchestrator {
    pub fn new(store: ManifestStore, checker: Arc<dyn VersionChecker>) -> Self {
        Self {
            store,
            checker,
            concurrency: CONCURRENCY,
        }
    }

    /// Overrides the number of checks allowed in flight (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Checks every id and returns once all checks have completed.
    pub async fn check_all(&self, ids: &[String]) -> UpdateReport {
        self.check_all_with(ids, |_| {}).await
    }

    /// Like [`UpdateOrchestrator::check_all`], calling `on_outcome` as each
    /// package finishes.
    pub async fn check_all_with<F>(&self, ids: &[String], mut on_outcome: F) -> UpdateReport
    where
        F: FnMut(&CheckOutcome),
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut checks = JoinSet::new();
        let mut seen = HashSet::new();

        for id in ids {
            // Two tasks on the same id would race on the same manifest file.
            if !seen.insert(id.as_str()) {
                debug!(package = %id, "Skipping duplicate id");
                continue;
            }

            let id = id.clone();
            let store = self.store.clone();
            let checker = Arc::clone(&self.checker);
            let sem = Arc::clone(&semaphore);

            checks.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return CheckOutcome {
                        status: CheckStatus::Failed {
                            error: "check scheduler shut down".to_string(),
                        },
                        id,
                    };
                };

                let status = check_package(&store, checker.as_ref(), &id).await;
                CheckOutcome { id, status }
            });
        }

        let mut report = UpdateReport::default();
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(outcome) => {
                    on_outcome(&outcome);
                    report.outcomes.push(outcome);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "Version check task panicked");
                }
            }
        }

        info!(
            checked = report.outcomes.len(),
            updated = report.updated_ids().len(),
            "Update check complete"
        );
        report
    }
}

/// Checks one package and persists a changed version.
async fn check_package(
    store: &ManifestStore,
    checker: &dyn VersionChecker,
    id: &str,
) -> CheckStatus {
    let loaded = match store.load(id) {
        Ok(loaded) => loaded,
        Err(ManifestError::NotFound(_)) => {
            debug!(package = %id, "No manifest, skipping");
            return CheckStatus::Missing;
        }
        Err(e) => {
            warn!(package = %id, error = %e, "Failed to load manifest");
            return CheckStatus::Failed {
                error: e.to_string(),
            };
        }
    };

    let mut manifest = loaded.raw;
    let current = manifest.version.clone();

    let latest = match checker.check(&loaded.resolved.checkver).await {
        VersionCheck::Found(latest) => latest,
        VersionCheck::NoMatch => {
            return CheckStatus::Indeterminate {
                version: current,
                reason: "pattern did not match".to_string(),
            };
        }
        VersionCheck::Failed(reason) => {
            return CheckStatus::Indeterminate {
                version: current,
                reason,
            };
        }
    };

    if latest == current {
        debug!(package = %id, version = %current, "Up to date");
        return CheckStatus::Unchanged { version: current };
    }

    info!(package = %id, from = %current, to = %latest, "New version found");
    manifest.version = latest.clone();

    if let Err(e) = store.save(&manifest, id) {
        warn!(package = %id, error = %e, "Failed to persist manifest");
        return CheckStatus::Failed {
            error: e.to_string(),
        };
    }

    CheckStatus::Updated {
        from: current,
        to: latest,
    }
}
