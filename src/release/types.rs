//! Common types for tracked projects and their releases

use chrono::{DateTime, Utc};

/// Default CurseForge game segment used when building file page links
pub const DEFAULT_CURSEFORGE_GAME: &str = "hytale";

/// Mod hosting platform a project lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// Modtale (api.modtale.net)
    Modtale,
    /// CurseForge, read through the cfwidget API
    CurseForge,
}

impl Platform {
    /// Returns the string representation used in logs and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Modtale => "modtale",
            Platform::CurseForge => "curseforge",
        }
    }

    /// Human readable platform name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Modtale => "Modtale",
            Platform::CurseForge => "CurseForge",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-specific settings of a tracked project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    Modtale {
        /// Value sent as `X-MODTALE-KEY`
        api_token: Option<String>,
    },
    CurseForge {
        /// Slug used in curseforge.com links
        slug: String,
        /// Game segment of curseforge.com links (e.g. "hytale", "minecraft")
        game: String,
    },
}

/// A project tracked for new releases
///
/// Created once at startup from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Modtale project UUID or CurseForge numeric project id
    pub id: String,
    /// Name shown in announcements; the platform title is used when absent
    pub display_name: Option<String>,
    pub source: ProjectSource,
}

impl Project {
    pub fn modtale(id: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            source: ProjectSource::Modtale { api_token },
        }
    }

    pub fn curseforge(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            source: ProjectSource::CurseForge {
                slug: slug.into(),
                game: DEFAULT_CURSEFORGE_GAME.to_string(),
            },
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn platform(&self) -> Platform {
        match self.source {
            ProjectSource::Modtale { .. } => Platform::Modtale,
            ProjectSource::CurseForge { .. } => Platform::CurseForge,
        }
    }

    /// Identifier used in log lines, e.g. `curseforge:1234`
    pub fn label(&self) -> String {
        format!("{}:{}", self.platform(), self.id)
    }
}

/// A published version or file of a project, normalized across platforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub platform: Platform,
    pub project_id: String,
    /// Modtale version id or CurseForge file id, unique within the project
    pub release_id: String,
    /// Project name to show (configured display name or platform title)
    pub project_title: String,
    /// Version number or file display name
    pub version_label: String,
    pub download_url: String,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_platform_follows_source() {
        let modtale = Project::modtale("uuid-1", None);
        let curseforge = Project::curseforge("1234", "my-mod").with_display_name("My Mod");

        assert_eq!(modtale.platform(), Platform::Modtale);
        assert_eq!(curseforge.platform(), Platform::CurseForge);
        assert_eq!(curseforge.display_name.as_deref(), Some("My Mod"));
        assert_eq!(curseforge.label(), "curseforge:1234");
    }
}
