//! Fetcher implementations for the supported platforms

pub mod curseforge;
pub mod modtale;

pub use curseforge::CurseForgeFetcher;
pub use modtale::ModtaleFetcher;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::release::error::FetchError;

/// Build the HTTP client shared by fetchers and the Discord client
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("modwatch/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Send a prepared GET request and decode the JSON body
///
/// The body is read as text first so that a transport failure and a
/// malformed document map to different errors.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    project: &str,
) -> Result<T, FetchError> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(project, e))?;

    let status = response.status();
    if !status.is_success() {
        warn!("{} returned status {}", project, status);
        return Err(FetchError::Status {
            project: project.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(project, e))?;

    serde_json::from_str(&body).map_err(|e| {
        warn!("Failed to parse response for {}: {}", project, e);
        FetchError::Parse {
            project: project.to_string(),
            message: e.to_string(),
        }
    })
}

/// Deserialize an identifier that may be sent as a JSON string or number
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Deserialize a list that may be sent as `null`, treating it as empty
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns the first non-blank string of the candidates
pub(crate) fn first_non_blank<'a>(
    candidates: impl IntoIterator<Item = Option<&'a str>>,
) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse an RFC 3339 timestamp, ignoring values that don't parse
pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    value
        .and_then(|v| chrono::DateTime::parse_from_rfc3339(v.trim()).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
