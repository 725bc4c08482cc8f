//! Poll cycle: fetch releases, announce the new ones, persist the cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bot::notifier::Notifier;
use crate::config::FETCH_STAGGER_DELAY_MS;
use crate::release::cache::SeenStore;
use crate::release::error::FetchError;
use crate::release::fetcher::Fetcher;
use crate::release::types::{Platform, Project, Release};

/// When a release chosen for announcement is recorded as seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkSeenPolicy {
    /// Record once a send was attempted, even if it failed. Avoids repeated
    /// announcements on flaky delivery, may miss one.
    #[default]
    OnAttempt,
    /// Record only after a successful send. Undelivered releases are retried
    /// next cycle.
    OnDelivery,
}

impl std::str::FromStr for MarkSeenPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_attempt" => Ok(MarkSeenPolicy::OnAttempt),
            "on_delivery" => Ok(MarkSeenPolicy::OnDelivery),
            _ => Err(()),
        }
    }
}

/// Outcome of a single poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Releases that were sent successfully
    pub announced: usize,
    /// Releases whose send failed
    pub delivery_failures: usize,
    /// `platform:id` labels of projects whose fetch failed
    pub failed_projects: Vec<String>,
    /// Whether the cache was written during this cycle
    pub saved: bool,
}

/// Runs poll cycles over the configured fetchers
pub struct Poller {
    fetchers: HashMap<Platform, Arc<dyn Fetcher>>,
    notifier: Notifier,
    policy: MarkSeenPolicy,
}

impl Poller {
    pub fn new(notifier: Notifier, policy: MarkSeenPolicy) -> Self {
        Self {
            fetchers: HashMap::new(),
            notifier,
            policy,
        }
    }

    /// Register the fetcher for its platform, replacing any previous one
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.insert(fetcher.platform(), fetcher);
        self
    }

    async fn fetch_project(&self, project: &Project) -> Result<Vec<Release>, FetchError> {
        match self.fetchers.get(&project.platform()) {
            Some(fetcher) => fetcher.fetch(project).await,
            None => Err(FetchError::Api {
                project: project.label(),
                message: "no fetcher registered for platform".to_string(),
            }),
        }
    }

    /// Fetch every project concurrently with staggered start times
    ///
    /// All results are collected before any of them is reconciled with the
    /// cache.
    async fn fetch_all<'a>(
        &self,
        projects: &[&'a Project],
    ) -> Vec<(&'a Project, Result<Vec<Release>, FetchError>)> {
        let futures = projects.iter().enumerate().map(|(i, &project)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            async move {
                sleep(delay).await;
                (project, self.fetch_project(project).await)
            }
        });

        join_all(futures).await
    }

    /// Run one cycle over `projects`
    ///
    /// Fetch failures are logged per project and never stop the others.
    /// Releases not yet in `store` are announced in fetcher order and then
    /// recorded according to the mark-seen policy. The store is saved once at
    /// the end when it holds unsaved changes, including changes left over
    /// from a previously failed save.
    pub async fn run_cycle<S: SeenStore + ?Sized>(
        &self,
        store: &mut S,
        projects: &[&Project],
    ) -> CycleReport {
        let mut report = CycleReport::default();

        for (project, result) in self.fetch_all(projects).await {
            let releases = match result {
                Ok(releases) => releases,
                Err(e) => {
                    error!("Failed to fetch releases for {}: {}", project.label(), e);
                    report.failed_projects.push(project.label());
                    continue;
                }
            };

            for release in releases {
                if store.has_seen(release.platform, &release.project_id, &release.release_id) {
                    continue;
                }

                let delivered = match self.notifier.notify(&release).await {
                    Ok(()) => {
                        report.announced += 1;
                        true
                    }
                    Err(e) => {
                        warn!(
                            "Failed to announce {} release {}: {}",
                            project.label(),
                            release.release_id,
                            e
                        );
                        report.delivery_failures += 1;
                        false
                    }
                };

                if delivered || self.policy == MarkSeenPolicy::OnAttempt {
                    store.mark_seen(release.platform, &release.project_id, &release.release_id);
                }
            }
        }

        if store.has_unsaved_changes() {
            match store.save() {
                Ok(()) => report.saved = true,
                Err(e) => error!("Failed to save cache, will retry next cycle: {}", e),
            }
        }

        if report.announced > 0 || !report.failed_projects.is_empty() {
            info!(
                "Cycle finished: {} announced, {} delivery failures, {} failed projects",
                report.announced,
                report.delivery_failures,
                report.failed_projects.len()
            );
        } else {
            debug!("Cycle finished: nothing new across {} projects", projects.len());
        }

        report
    }
}
