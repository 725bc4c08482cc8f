//! Fetcher test utilities

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use modwatch::release::error::FetchError;
use modwatch::release::fetcher::Fetcher;
use modwatch::release::types::{Platform, Project, Release};

/// Fetcher serving canned release ids per project
///
/// Projects without an entry fail with a 500 status.
pub struct StubFetcher {
    platform: Platform,
    releases: Mutex<HashMap<String, Vec<String>>>,
}

impl StubFetcher {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            releases: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_releases(self, project_id: &str, release_ids: &[&str]) -> Self {
        self.set_releases(project_id, release_ids);
        self
    }

    /// Replace the releases served for a project
    pub fn set_releases(&self, project_id: &str, release_ids: &[&str]) {
        self.releases.lock().unwrap().insert(
            project_id.to_string(),
            release_ids.iter().map(|id| id.to_string()).collect(),
        );
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, project: &Project) -> Result<Vec<Release>, FetchError> {
        let releases = self.releases.lock().unwrap();
        let Some(ids) = releases.get(&project.id) else {
            return Err(FetchError::Status {
                project: project.label(),
                status: 500,
            });
        };

        Ok(ids
            .iter()
            .map(|id| Release {
                platform: self.platform,
                project_id: project.id.clone(),
                release_id: id.clone(),
                project_title: project
                    .display_name
                    .clone()
                    .unwrap_or_else(|| project.id.clone()),
                version_label: id.clone(),
                download_url: format!("https://example.com/{}/{}", project.id, id),
                author: None,
                thumbnail_url: None,
                published_at: None,
            })
            .collect())
    }
}
