//! CurseForge fetcher implementation backed by the cfwidget API

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::release::error::FetchError;
use crate::release::fetcher::Fetcher;
use crate::release::fetchers::{
    first_non_blank, get_json, lenient_id, null_as_empty, parse_timestamp,
};
use crate::release::types::{Platform, Project, ProjectSource, Release};

/// Default base URL for the cfwidget API
pub const DEFAULT_BASE_URL: &str = "https://api.cfwidget.com";

/// Extracts the numeric file id from a CurseForge file URL
static FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/files/(\d+)").expect("valid file id regex"));

/// Response from `GET /{project_id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfWidgetResponse {
    title: Option<String>,
    name: Option<String>,
    thumbnail: Option<String>,
    logo: Option<String>,
    avatar: Option<String>,
    author: Option<String>,
    owner: Option<String>,
    username: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    members: Vec<CfWidgetMember>,
    #[serde(default, deserialize_with = "null_as_empty")]
    files: Vec<CfWidgetFile>,
    /// Present while cfwidget is still indexing a project or does not know it
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CfWidgetMember {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfWidgetFile {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    url: Option<String>,
    display: Option<String>,
    display_name: Option<String>,
    name: Option<String>,
    file_name: Option<String>,
    #[serde(rename = "uploaded_at")]
    uploaded_at: Option<String>,
}

impl CfWidgetFile {
    fn file_id(&self) -> Option<String> {
        self.id.clone().or_else(|| {
            self.url
                .as_deref()
                .and_then(|url| FILE_ID_RE.captures(url))
                .map(|caps| caps[1].to_string())
        })
    }
}

/// Link to the file page on curseforge.com
pub fn file_page_url(game: &str, slug: &str, file_id: &str) -> String {
    format!("https://www.curseforge.com/{game}/mods/{slug}/download/{file_id}")
}

/// Fetcher implementation for CurseForge projects through cfwidget
pub struct CurseForgeFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CurseForgeFetcher {
    /// Creates a new CurseForgeFetcher with a custom base URL
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn normalize(
        project: &Project,
        slug: &str,
        game: &str,
        response: CfWidgetResponse,
    ) -> Vec<Release> {
        let project_title = first_non_blank([
            project.display_name.as_deref(),
            response.title.as_deref(),
            response.name.as_deref(),
            Some(slug),
        ])
        .unwrap_or_else(|| project.id.clone());

        let author = first_non_blank([
            response.members.first().and_then(|m| m.username.as_deref()),
            response.author.as_deref(),
            response.owner.as_deref(),
            response.username.as_deref(),
        ]);

        let thumbnail_url = [&response.thumbnail, &response.logo, &response.avatar]
            .into_iter()
            .flatten()
            .find(|url| url.starts_with("http"))
            .cloned();

        let mut seen = HashSet::new();
        let mut releases: Vec<Release> = response
            .files
            .into_iter()
            .filter_map(|file| {
                let Some(release_id) = file.file_id() else {
                    debug!("Skipping CurseForge file without id for {}", project.id);
                    return None;
                };
                if !seen.insert(release_id.clone()) {
                    return None;
                }

                let version_label = first_non_blank([
                    file.display.as_deref(),
                    file.display_name.as_deref(),
                    file.name.as_deref(),
                    file.file_name.as_deref(),
                ])
                .unwrap_or_else(|| release_id.clone());

                Some(Release {
                    platform: Platform::CurseForge,
                    project_id: project.id.clone(),
                    download_url: file_page_url(game, slug, &release_id),
                    release_id,
                    project_title: project_title.clone(),
                    version_label,
                    author: author.clone(),
                    thumbnail_url: thumbnail_url.clone(),
                    published_at: parse_timestamp(file.uploaded_at.as_deref()),
                })
            })
            .collect();

        // cfwidget lists newest first; announce oldest first
        releases.reverse();
        releases
    }
}

#[async_trait::async_trait]
impl Fetcher for CurseForgeFetcher {
    fn platform(&self) -> Platform {
        Platform::CurseForge
    }

    async fn fetch(&self, project: &Project) -> Result<Vec<Release>, FetchError> {
        let label = project.label();
        let ProjectSource::CurseForge { slug, game } = &project.source else {
            return Err(FetchError::Api {
                project: label,
                message: "not a CurseForge project".to_string(),
            });
        };

        let url = format!("{}/{}", self.base_url, project.id);
        let response: CfWidgetResponse = get_json(self.client.get(&url), &label).await?;

        if let Some(error) = response.error.as_ref().filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(FetchError::Api {
                project: label,
                message,
            });
        }

        let releases = Self::normalize(project, slug, game, response);
        debug!("Fetched {} files for {}", releases.len(), label);

        Ok(releases)
    }
}
