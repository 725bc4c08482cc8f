//! Modtale project API fetcher implementation

use serde::Deserialize;
use tracing::debug;

use crate::release::error::FetchError;
use crate::release::fetcher::Fetcher;
use crate::release::fetchers::{
    first_non_blank, get_json, lenient_id, null_as_empty, parse_timestamp,
};
use crate::release::types::{Platform, Project, ProjectSource, Release};

/// Default base URL for the Modtale API
pub const DEFAULT_BASE_URL: &str = "https://api.modtale.net";

/// Header carrying the Modtale API key
const API_KEY_HEADER: &str = "X-MODTALE-KEY";

/// Response from `GET /api/v1/projects/{uuid}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModtaleProjectResponse {
    title: Option<String>,
    author: Option<String>,
    image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    gallery_images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    versions: Vec<ModtaleVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModtaleVersion {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    version_number: Option<String>,
    created_at: Option<String>,
    release_date: Option<String>,
}

/// Fetcher implementation for the Modtale project API
pub struct ModtaleFetcher {
    client: reqwest::Client,
    base_url: String,
    /// Key used for projects that don't configure their own
    default_api_key: Option<String>,
}

impl ModtaleFetcher {
    /// Creates a new ModtaleFetcher with a custom base URL
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_api_key: None,
        }
    }

    pub fn with_default_api_key(mut self, api_key: Option<String>) -> Self {
        self.default_api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    fn download_url(&self, project_uuid: &str, version_number: &str) -> String {
        format!(
            "{}/api/v1/projects/{}/versions/{}/download",
            self.base_url, project_uuid, version_number
        )
    }

    /// Resolve a possibly relative image path against the API base
    fn absolute_url(&self, maybe_relative: &str) -> Option<String> {
        let path = maybe_relative.trim();
        if path.is_empty() {
            return None;
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        Some(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    fn normalize(&self, project: &Project, response: ModtaleProjectResponse) -> Vec<Release> {
        let project_title = first_non_blank([
            project.display_name.as_deref(),
            response.title.as_deref(),
        ])
        .unwrap_or_else(|| "Modtale Project".to_string());

        let thumbnail_url = first_non_blank([
            response.image_url.as_deref(),
            response.gallery_images.first().map(String::as_str),
        ])
        .and_then(|icon| self.absolute_url(&icon));

        let author = first_non_blank([response.author.as_deref()]);

        response
            .versions
            .into_iter()
            .filter_map(|version| {
                let Some(release_id) = version.id else {
                    debug!("Skipping Modtale version without id for {}", project.id);
                    return None;
                };
                let version_label = version
                    .version_number
                    .unwrap_or_else(|| release_id.clone());

                Some(Release {
                    platform: Platform::Modtale,
                    project_id: project.id.clone(),
                    download_url: self.download_url(&project.id, &version_label),
                    release_id,
                    project_title: project_title.clone(),
                    version_label,
                    author: author.clone(),
                    thumbnail_url: thumbnail_url.clone(),
                    published_at: parse_timestamp(
                        version.created_at.as_deref().or(version.release_date.as_deref()),
                    ),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Fetcher for ModtaleFetcher {
    fn platform(&self) -> Platform {
        Platform::Modtale
    }

    async fn fetch(&self, project: &Project) -> Result<Vec<Release>, FetchError> {
        let label = project.label();
        let ProjectSource::Modtale { api_token } = &project.source else {
            return Err(FetchError::Api {
                project: label,
                message: "not a Modtale project".to_string(),
            });
        };

        let url = format!("{}/api/v1/projects/{}", self.base_url, project.id);
        let mut request = self.client.get(&url);
        if let Some(key) = api_token.as_ref().or(self.default_api_key.as_ref()) {
            request = request.header(API_KEY_HEADER, key);
        }

        let response: ModtaleProjectResponse = get_json(request, &label).await?;
        let releases = self.normalize(project, response);
        debug!("Fetched {} versions for {}", releases.len(), label);

        Ok(releases)
    }
}
