use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::bot::discord;
use crate::bot::poll::MarkSeenPolicy;
use crate::release::fetchers::{curseforge, lenient_id, modtale};
use crate::release::types::{DEFAULT_CURSEFORGE_GAME, Platform, Project, ProjectSource};

// =============================================================================
// Defaults
// =============================================================================

/// Default poll interval in seconds (5 minutes)
pub const DEFAULT_POLL_SECONDS: u64 = 300;

/// Default timeout for outbound HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Delay between starting each fetch request to avoid rate limiting (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

/// Default location of the announced-release cache
pub const DEFAULT_CACHE_FILE: &str = "cache.json";

// =============================================================================
// Environment variable names
// =============================================================================

pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const CHANNEL_ID: &str = "CHANNEL_ID";
pub const POLL_SECONDS: &str = "POLL_SECONDS";
pub const CURSEFORGE_POLL_SECONDS: &str = "CURSEFORGE_POLL_SECONDS";
pub const HTTP_TIMEOUT_SECONDS: &str = "HTTP_TIMEOUT_SECONDS";
pub const CACHE_FILE: &str = "CACHE_FILE";
pub const MARK_SEEN_POLICY: &str = "MARK_SEEN_POLICY";
pub const MODTALE_API_KEY: &str = "MODTALE_API_KEY";
pub const MODTALE_PROJECTS_JSON: &str = "MODTALE_PROJECTS_JSON";
pub const CURSEFORGE_PROJECTS_JSON: &str = "CURSEFORGE_PROJECTS_JSON";
pub const MODTALE_BASE_URL: &str = "MODTALE_BASE_URL";
pub const CFWIDGET_BASE_URL: &str = "CFWIDGET_BASE_URL";
pub const DISCORD_API_BASE_URL: &str = "DISCORD_API_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required env var: {key}")]
    Missing { key: &'static str },

    #[error("Env var {key} is invalid: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Env var {key} must be valid JSON: {source}")]
    InvalidJson {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Env var {key} must be a JSON array or object")]
    InvalidShape { key: &'static str },

    #[error("{key}{entry} is invalid: {message}")]
    InvalidEntry {
        key: &'static str,
        entry: String,
        message: String,
    },
}

impl ConfigError {
    /// Name of the environment variable the error refers to
    pub fn key(&self) -> &'static str {
        match self {
            ConfigError::Missing { key }
            | ConfigError::InvalidValue { key, .. }
            | ConfigError::InvalidJson { key, .. }
            | ConfigError::InvalidShape { key }
            | ConfigError::InvalidEntry { key, .. } => *key,
        }
    }
}

/// Endpoints of the external services, overridable for testing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub modtale: String,
    pub cfwidget: String,
    pub discord: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            modtale: modtale::DEFAULT_BASE_URL.to_string(),
            cfwidget: curseforge::DEFAULT_BASE_URL.to_string(),
            discord: discord::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Runtime configuration read from the environment
#[derive(Clone, PartialEq)]
pub struct Config {
    pub discord_token: String,
    pub channel_id: u64,
    /// Modtale poll interval
    pub poll_interval: Duration,
    pub curseforge_poll_interval: Duration,
    pub http_timeout: Duration,
    pub cache_path: PathBuf,
    pub mark_seen_policy: MarkSeenPolicy,
    /// Key for Modtale projects that don't configure their own
    pub modtale_api_key: Option<String>,
    pub endpoints: Endpoints,
    pub modtale_projects: Vec<Project>,
    pub curseforge_projects: Vec<Project>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("poll_interval", &self.poll_interval)
            .field("curseforge_poll_interval", &self.curseforge_poll_interval)
            .field("http_timeout", &self.http_timeout)
            .field("cache_path", &self.cache_path)
            .field("mark_seen_policy", &self.mark_seen_policy)
            .field(
                "modtale_api_key",
                &self.modtale_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoints", &self.endpoints)
            .field("modtale_projects", &self.modtale_projects.len())
            .field("curseforge_projects", &self.curseforge_projects.len())
            .finish()
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, treating blank values as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let modtale_projects = parse_modtale_projects(get(MODTALE_PROJECTS_JSON).as_deref())?;
        let curseforge_projects =
            parse_curseforge_projects(get(CURSEFORGE_PROJECTS_JSON).as_deref())?;

        let discord_token = get(DISCORD_BOT_TOKEN).ok_or(ConfigError::Missing {
            key: DISCORD_BOT_TOKEN,
        })?;
        let channel_id = parse_number(
            CHANNEL_ID,
            get(CHANNEL_ID).ok_or(ConfigError::Missing { key: CHANNEL_ID })?,
        )?;

        let poll_seconds = parse_seconds(POLL_SECONDS, get(POLL_SECONDS), DEFAULT_POLL_SECONDS)?;
        let curseforge_poll_seconds =
            parse_seconds(CURSEFORGE_POLL_SECONDS, get(CURSEFORGE_POLL_SECONDS), poll_seconds)?;
        let http_timeout_seconds = parse_seconds(
            HTTP_TIMEOUT_SECONDS,
            get(HTTP_TIMEOUT_SECONDS),
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;

        let mark_seen_policy = match get(MARK_SEEN_POLICY) {
            Some(value) => value
                .parse::<MarkSeenPolicy>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: MARK_SEEN_POLICY,
                    message: format!(
                        "expected \"on_attempt\" or \"on_delivery\", got {:?}",
                        value
                    ),
                })?,
            None => MarkSeenPolicy::default(),
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            modtale: get(MODTALE_BASE_URL).unwrap_or(defaults.modtale),
            cfwidget: get(CFWIDGET_BASE_URL).unwrap_or(defaults.cfwidget),
            discord: get(DISCORD_API_BASE_URL).unwrap_or(defaults.discord),
        };

        Ok(Self {
            discord_token,
            channel_id,
            poll_interval: Duration::from_secs(poll_seconds),
            curseforge_poll_interval: Duration::from_secs(curseforge_poll_seconds),
            http_timeout: Duration::from_secs(http_timeout_seconds),
            cache_path: get(CACHE_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE)),
            mark_seen_policy,
            modtale_api_key: get(MODTALE_API_KEY),
            endpoints,
            modtale_projects,
            curseforge_projects,
        })
    }

    /// All tracked projects, Modtale first
    pub fn projects(&self) -> Vec<Project> {
        self.modtale_projects
            .iter()
            .chain(&self.curseforge_projects)
            .cloned()
            .collect()
    }

    /// Poll interval of every platform that has at least one project
    pub fn schedule_intervals(&self) -> Vec<(Platform, Duration)> {
        let mut intervals = Vec::new();
        if !self.modtale_projects.is_empty() {
            intervals.push((Platform::Modtale, self.poll_interval));
        }
        if !self.curseforge_projects.is_empty() {
            intervals.push((Platform::CurseForge, self.curseforge_poll_interval));
        }
        intervals
    }
}

fn parse_number(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|e| ConfigError::InvalidValue {
        key,
        message: format!("{:?} is not a valid number: {}", value, e),
    })
}

fn parse_seconds(
    key: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_number(key, value)? {
        0 => Err(ConfigError::InvalidValue {
            key,
            message: "must be greater than zero".to_string(),
        }),
        seconds => Ok(seconds),
    }
}

// =============================================================================
// Project lists
// =============================================================================

/// Entry of `MODTALE_PROJECTS_JSON`
#[derive(Debug, Default, Deserialize)]
struct ModtaleEntry {
    #[serde(default, alias = "uuid", alias = "id", deserialize_with = "lenient_id")]
    project_uuid: Option<String>,
    api_token: Option<String>,
    #[serde(alias = "name")]
    display_name: Option<String>,
}

/// Entry of `CURSEFORGE_PROJECTS_JSON`
#[derive(Debug, Default, Deserialize)]
struct CurseForgeEntry {
    #[serde(default, alias = "id", deserialize_with = "lenient_id")]
    project_id: Option<String>,
    #[serde(alias = "slug")]
    project_slug: Option<String>,
    #[serde(alias = "name")]
    display_name: Option<String>,
    game: Option<String>,
}

/// A raw entry of a project list with its position for error messages
struct RawEntry {
    /// `[0]` for array items, `["key"]` for object members
    label: String,
    /// Object key, used as the project id when the entry has none
    key_id: Option<String>,
    value: serde_json::Value,
}

/// Split a project list variable into entries
///
/// Accepts a JSON array of entries or an object keyed by project id. An unset
/// variable disables the platform; anything unparseable is an error.
fn split_entries(key: &'static str, raw: Option<&str>) -> Result<Vec<RawEntry>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|source| ConfigError::InvalidJson { key, source })?;

    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawEntry {
                label: format!("[{}]", i),
                key_id: None,
                value,
            })
            .collect()),
        serde_json::Value::Object(members) => Ok(members
            .into_iter()
            .map(|(id, value)| RawEntry {
                label: format!("[{:?}]", id),
                key_id: Some(id),
                value,
            })
            .collect()),
        serde_json::Value::Null => Ok(Vec::new()),
        _ => Err(ConfigError::InvalidShape { key }),
    }
}

fn parse_entry<T: serde::de::DeserializeOwned>(
    key: &'static str,
    entry: &RawEntry,
) -> Result<T, ConfigError> {
    if !entry.value.is_object() {
        return Err(ConfigError::InvalidEntry {
            key,
            entry: entry.label.clone(),
            message: "must be an object".to_string(),
        });
    }
    serde_json::from_value(entry.value.clone()).map_err(|e| ConfigError::InvalidEntry {
        key,
        entry: entry.label.clone(),
        message: e.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reject a project id that appears twice in one list
fn check_unique(
    key: &'static str,
    seen: &mut HashSet<String>,
    entry: &RawEntry,
    id: &str,
) -> Result<(), ConfigError> {
    if seen.insert(id.to_string()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEntry {
            key,
            entry: entry.label.clone(),
            message: format!("duplicate project {}", id),
        })
    }
}

fn parse_modtale_projects(raw: Option<&str>) -> Result<Vec<Project>, ConfigError> {
    let key = MODTALE_PROJECTS_JSON;
    let mut seen = HashSet::new();

    split_entries(key, raw)?
        .into_iter()
        .map(|entry| {
            // `{"<uuid>": "Display Name"}` shorthand
            let parsed: ModtaleEntry = match (&entry.value, &entry.key_id) {
                (serde_json::Value::String(name), Some(_)) => ModtaleEntry {
                    display_name: Some(name.clone()),
                    ..Default::default()
                },
                _ => parse_entry(key, &entry)?,
            };

            let id = non_blank(parsed.project_uuid)
                .or_else(|| entry.key_id.clone())
                .ok_or_else(|| ConfigError::InvalidEntry {
                    key,
                    entry: entry.label.clone(),
                    message: "missing project_uuid".to_string(),
                })?;
            check_unique(key, &mut seen, &entry, &id)?;

            Ok(Project {
                id,
                display_name: non_blank(parsed.display_name),
                source: ProjectSource::Modtale {
                    api_token: non_blank(parsed.api_token),
                },
            })
        })
        .collect()
}

fn parse_curseforge_projects(raw: Option<&str>) -> Result<Vec<Project>, ConfigError> {
    let key = CURSEFORGE_PROJECTS_JSON;
    let mut seen = HashSet::new();

    split_entries(key, raw)?
        .into_iter()
        .map(|entry| {
            // `{"<project_id>": "<slug>"}` shorthand
            let parsed: CurseForgeEntry = match (&entry.value, &entry.key_id) {
                (serde_json::Value::String(slug), Some(_)) => CurseForgeEntry {
                    project_slug: Some(slug.clone()),
                    ..Default::default()
                },
                _ => parse_entry(key, &entry)?,
            };

            let invalid = |message: &str| ConfigError::InvalidEntry {
                key,
                entry: entry.label.clone(),
                message: message.to_string(),
            };

            let id = non_blank(parsed.project_id)
                .or_else(|| entry.key_id.clone())
                .ok_or_else(|| invalid("missing project_id"))?;
            let slug =
                non_blank(parsed.project_slug).ok_or_else(|| invalid("missing project_slug"))?;
            check_unique(key, &mut seen, &entry, &id)?;

            Ok(Project {
                id,
                display_name: non_blank(parsed.display_name),
                source: ProjectSource::CurseForge {
                    slug,
                    game: non_blank(parsed.game)
                        .unwrap_or_else(|| DEFAULT_CURSEFORGE_GAME.to_string()),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![(DISCORD_BOT_TOKEN, "bot-token-value"), (CHANNEL_ID, "123456789")]
    }

    fn with(extra: &[(&'static str, &'static str)]) -> Result<Config, ConfigError> {
        let mut vars = required();
        vars.extend_from_slice(extra);
        Config::from_lookup(lookup(&vars))
    }

    #[test]
    fn from_lookup_uses_defaults_for_optional_values() {
        let config = with(&[]).unwrap();

        assert_eq!(config.channel_id, 123456789);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.curseforge_poll_interval, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_path, PathBuf::from("cache.json"));
        assert_eq!(config.mark_seen_policy, MarkSeenPolicy::OnAttempt);
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(config.projects().is_empty());
        assert!(config.schedule_intervals().is_empty());
    }

    #[test]
    fn curseforge_interval_defaults_to_poll_interval() {
        let config = with(&[(POLL_SECONDS, "60")]).unwrap();
        assert_eq!(config.curseforge_poll_interval, Duration::from_secs(60));

        let config = with(&[(POLL_SECONDS, "60"), (CURSEFORGE_POLL_SECONDS, "120")]).unwrap();
        assert_eq!(config.curseforge_poll_interval, Duration::from_secs(120));
    }

    #[test]
    fn from_lookup_parses_project_lists() {
        let config = with(&[
            (
                MODTALE_PROJECTS_JSON,
                r#"[{"project_uuid": "abc", "api_token": "k"}, {"uuid": "def", "display_name": "Def"}]"#,
            ),
            (
                CURSEFORGE_PROJECTS_JSON,
                r#"[{"project_id": 1234, "project_slug": "better-maps", "game": "minecraft"}]"#,
            ),
            (POLL_SECONDS, "60"),
        ])
        .unwrap();

        assert_eq!(
            config.modtale_projects,
            vec![
                Project::modtale("abc", Some("k".to_string())),
                Project::modtale("def", None).with_display_name("Def"),
            ]
        );
        assert_eq!(
            config.curseforge_projects,
            vec![Project {
                id: "1234".to_string(),
                display_name: None,
                source: ProjectSource::CurseForge {
                    slug: "better-maps".to_string(),
                    game: "minecraft".to_string(),
                },
            }]
        );
        assert_eq!(
            config.schedule_intervals(),
            vec![
                (Platform::Modtale, Duration::from_secs(60)),
                (Platform::CurseForge, Duration::from_secs(60)),
            ]
        );
    }

    #[test]
    fn from_lookup_accepts_object_keyed_by_project_id() {
        let config = with(&[
            (MODTALE_PROJECTS_JSON, r#"{"abc": "My Mod", "def": {"api_token": "k"}}"#),
            (CURSEFORGE_PROJECTS_JSON, r#"{"1234": "better-maps"}"#),
        ])
        .unwrap();

        assert_eq!(
            config.modtale_projects,
            vec![
                Project::modtale("abc", None).with_display_name("My Mod"),
                Project::modtale("def", Some("k".to_string())),
            ]
        );
        assert_eq!(
            config.curseforge_projects,
            vec![Project::curseforge("1234", "better-maps")]
        );
    }

    #[rstest]
    #[case(MODTALE_PROJECTS_JSON, "[{", "must be valid JSON")]
    #[case(CURSEFORGE_PROJECTS_JSON, "not json", "must be valid JSON")]
    #[case(MODTALE_PROJECTS_JSON, "42", "must be a JSON array or object")]
    #[case(MODTALE_PROJECTS_JSON, r#"["abc"]"#, "[0] is invalid: must be an object")]
    #[case(MODTALE_PROJECTS_JSON, r#"[{"api_token": "k"}]"#, "missing project_uuid")]
    #[case(CURSEFORGE_PROJECTS_JSON, r#"[{"project_id": "1"}]"#, "missing project_slug")]
    #[case(CURSEFORGE_PROJECTS_JSON, r#"[{"project_slug": "s"}]"#, "missing project_id")]
    #[case(
        CURSEFORGE_PROJECTS_JSON,
        r#"[{"project_id": 1, "project_slug": "a"}, {"project_id": "1", "project_slug": "b"}]"#,
        "[1] is invalid: duplicate project 1"
    )]
    fn invalid_project_list_names_the_variable(
        #[case] key: &'static str,
        #[case] value: &'static str,
        #[case] expected: &str,
    ) {
        let error = with(&[(key, value)]).unwrap_err();

        assert_eq!(error.key(), key);
        let message = error.to_string();
        assert!(message.contains(key), "{message}");
        assert!(message.contains(expected), "{message}");
    }

    #[rstest]
    #[case(DISCORD_BOT_TOKEN)]
    #[case(CHANNEL_ID)]
    fn missing_required_value_is_an_error(#[case] missing: &'static str) {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != missing).collect();

        let error = Config::from_lookup(lookup(&vars)).unwrap_err();

        assert!(matches!(error, ConfigError::Missing { key } if key == missing));
    }

    #[rstest]
    #[case(POLL_SECONDS, "0")]
    #[case(POLL_SECONDS, "five")]
    #[case(HTTP_TIMEOUT_SECONDS, "-1")]
    #[case(MARK_SEEN_POLICY, "sometimes")]
    fn invalid_value_is_an_error(#[case] key: &'static str, #[case] value: &'static str) {
        let error = with(&[(key, value)]).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidValue { key: k, .. } if k == key));
    }

    #[test]
    fn invalid_channel_id_is_an_error() {
        let error = Config::from_lookup(lookup(&[
            (DISCORD_BOT_TOKEN, "token"),
            (CHANNEL_ID, "general"),
        ]))
        .unwrap_err();

        assert_eq!(error.key(), CHANNEL_ID);
    }

    #[test]
    fn blank_project_list_disables_platform() {
        let config = with(&[(MODTALE_PROJECTS_JSON, "   "), (CURSEFORGE_PROJECTS_JSON, "[]")])
            .unwrap();

        assert!(config.projects().is_empty());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = with(&[(MODTALE_API_KEY, "super-secret")]).unwrap();

        let debug = format!("{:?}", config);

        assert!(!debug.contains("bot-token-value"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
