use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Discord returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<f64> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Channel {channel_id} is not a text channel (type {kind})")]
    NotTextChannel { channel_id: u64, kind: u8 },
}
