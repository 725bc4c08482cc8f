use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request for {project} timed out")]
    Timeout { project: String },

    #[error("Network error for {project}: {source}")]
    Network {
        project: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} for {project}")]
    Status { project: String, status: u16 },

    #[error("Malformed response for {project}: {message}")]
    Parse { project: String, message: String },

    #[error("API error for {project}: {message}")]
    Api { project: String, message: String },
}

impl FetchError {
    /// Classify a transport error, separating timeouts from other failures
    pub fn from_reqwest(project: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                project: project.to_string(),
            }
        } else {
            FetchError::Network {
                project: project.to_string(),
                source: error,
            }
        }
    }
}
