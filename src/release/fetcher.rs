//! Fetcher trait for reading releases from a mod hosting platform

#[cfg(test)]
use mockall::automock;

use crate::release::error::FetchError;
use crate::release::types::{Platform, Project, Release};

/// Trait for fetching the releases of one project from a platform
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the platform this implementation handles
    fn platform(&self) -> Platform;

    /// Fetches the releases currently published for a project
    ///
    /// Issues a single request with no retry. The order of the returned
    /// releases is the order they will be announced in; novelty is decided by
    /// the cache, not by position.
    ///
    /// # Returns
    /// * `Ok(Vec<Release>)` - Possibly empty list of releases
    /// * `Err(FetchError)` - Timeout, transport error, error status or bad JSON
    async fn fetch(&self, project: &Project) -> Result<Vec<Release>, FetchError>;
}
