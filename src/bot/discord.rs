//! Minimal Discord REST client
//!
//! The bot only needs to confirm its session, resolve one channel and post
//! messages to it, so it talks to the HTTP API directly instead of keeping a
//! gateway connection open.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::bot::error::DeliveryError;
use crate::bot::notifier::ChatChannel;

/// Default base URL for the Discord API
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

/// Retries of a request answered with 429 before giving up
const MAX_RATE_LIMIT_RETRIES: usize = 3;
/// Upper bound of a single rate limit wait
const MAX_RATE_LIMIT_WAIT_SECS: f64 = 60.0;
/// Wait used when a 429 carries no retry hint
const DEFAULT_RATE_LIMIT_WAIT_SECS: f64 = 1.0;

/// `GUILD_TEXT` channel type
const CHANNEL_TYPE_TEXT: u8 = 0;
/// `GUILD_ANNOUNCEMENT` channel type
const CHANNEL_TYPE_ANNOUNCEMENT: u8 = 5;

/// Component type of an action row
const COMPONENT_ACTION_ROW: u8 = 1;
/// Component type of a button
const COMPONENT_BUTTON: u8 = 2;
/// Button style that opens a URL
const BUTTON_STYLE_LINK: u8 = 5;

/// Body of `POST /channels/{id}/messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<LinkButton>,
}

impl ActionRow {
    pub fn new(components: Vec<LinkButton>) -> Self {
        Self {
            kind: COMPONENT_ACTION_ROW,
            components,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    kind: u8,
    style: u8,
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: COMPONENT_BUTTON,
            style: BUTTON_STYLE_LINK,
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Response from `GET /users/@me`
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

/// Response from `GET /channels/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: Option<String>,
}

/// Authenticated client for the Discord REST API
pub struct DiscordClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl DiscordClient {
    pub fn new(client: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", self.token),
        )
    }

    /// Seconds to wait before retrying a 429 response
    ///
    /// The `Retry-After` header wins over the `retry_after` body field.
    async fn retry_after(response: reqwest::Response) -> Option<f64> {
        let header = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        if header.is_some() {
            return header;
        }

        let body: serde_json::Value = response.json().await.ok()?;
        body.get("retry_after").and_then(serde_json::Value::as_f64)
    }

    /// Send a request, waiting out 429 responses a bounded number of times
    ///
    /// `build` is called again for every attempt.
    async fn execute(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DeliveryError> {
        let mut retries = 0;
        loop {
            let response = self.authorized(build()).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = Self::retry_after(response).await;
                if retries >= MAX_RATE_LIMIT_RETRIES {
                    warn!("Discord rate limit persisted after {} retries", retries);
                    return Err(DeliveryError::RateLimited { retry_after_secs });
                }
                retries += 1;

                let wait = retry_after_secs
                    .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
                    .clamp(0.0, MAX_RATE_LIMIT_WAIT_SECS);
                debug!("Rate limited by Discord, retrying in {:.2}s", wait);
                sleep(Duration::from_secs_f64(wait)).await;
                continue;
            }

            if status.is_success() {
                return Ok(response);
            }

            let message = response.text().await.unwrap_or_default();
            warn!("Discord API returned status {}: {}", status, message);
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                message,
            });
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, DeliveryError> {
        let url = format!("{}{}", self.base_url, path);
        let body = self.execute(|| self.client.get(&url)).await?.text().await?;

        serde_json::from_str(&body).map_err(|e| DeliveryError::InvalidResponse(e.to_string()))
    }

    /// Fetch the bot user; succeeds only with a valid token
    pub async fn current_user(&self) -> Result<CurrentUser, DeliveryError> {
        self.get_json("/users/@me").await
    }

    pub async fn channel(&self, channel_id: u64) -> Result<ChannelInfo, DeliveryError> {
        self.get_json(&format!("/channels/{}", channel_id)).await
    }

    pub async fn send_message(
        &self,
        channel_id: u64,
        message: &CreateMessage,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        self.execute(|| self.client.post(&url).json(message)).await?;

        debug!("Posted message to channel {}", channel_id);
        Ok(())
    }

    /// Resolve the target channel, failing unless it accepts text messages
    pub async fn open_channel(self, channel_id: u64) -> Result<DiscordChannel, DeliveryError> {
        let info = self.channel(channel_id).await?;
        if info.kind != CHANNEL_TYPE_TEXT && info.kind != CHANNEL_TYPE_ANNOUNCEMENT {
            return Err(DeliveryError::NotTextChannel {
                channel_id,
                kind: info.kind,
            });
        }

        Ok(DiscordChannel {
            client: self,
            channel_id,
            name: info.name,
        })
    }
}

/// A text channel messages are posted to
pub struct DiscordChannel {
    client: DiscordClient,
    channel_id: u64,
    name: Option<String>,
}

impl DiscordChannel {
    pub fn id(&self) -> u64 {
        self.channel_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[async_trait::async_trait]
impl ChatChannel for DiscordChannel {
    async fn send(&self, message: &CreateMessage) -> Result<(), DeliveryError> {
        self.client.send_message(self.channel_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn client(base_url: &str) -> DiscordClient {
        let http = crate::release::fetchers::http_client(Duration::from_secs(5)).unwrap();
        DiscordClient::new(http, base_url, "test-token")
    }

    #[tokio::test]
    async fn current_user_sends_bot_authorization() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/users/@me")
            .match_header("authorization", "Bot test-token")
            .with_status(200)
            .with_body(r#"{"id": "1", "username": "modwatch", "bot": true}"#)
            .create_async()
            .await;

        let user = client(&server.url()).current_user().await.unwrap();

        mock.assert_async().await;
        assert_eq!(user.username, "modwatch");
    }

    #[tokio::test]
    async fn current_user_fails_with_invalid_token() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/users/@me")
            .with_status(401)
            .with_body(r#"{"message": "401: Unauthorized", "code": 0}"#)
            .create_async()
            .await;

        let result = client(&server.url()).current_user().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(DeliveryError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn open_channel_accepts_text_channel_and_posts_messages() {
        let mut server = Server::new_async().await;

        let channel_mock = server
            .mock("GET", "/channels/42")
            .with_status(200)
            .with_body(r#"{"id": "42", "type": 0, "name": "releases"}"#)
            .create_async()
            .await;
        let message_mock = server
            .mock("POST", "/channels/42/messages")
            .match_header("authorization", "Bot test-token")
            .match_body(Matcher::PartialJson(json!({
                "embeds": [{"title": "hello", "color": 1}],
                "components": [{"type": 1, "components": [
                    {"type": 2, "style": 5, "label": "Open", "url": "https://example.com"}
                ]}]
            })))
            .with_status(200)
            .with_body(r#"{"id": "99"}"#)
            .create_async()
            .await;

        let channel = client(&server.url()).open_channel(42).await.unwrap();
        let message = CreateMessage {
            embeds: vec![Embed {
                title: "hello".to_string(),
                color: 1,
                ..Default::default()
            }],
            components: vec![ActionRow::new(vec![LinkButton::new(
                "Open",
                "https://example.com",
            )])],
            ..Default::default()
        };
        channel.send(&message).await.unwrap();

        channel_mock.assert_async().await;
        message_mock.assert_async().await;
        assert_eq!(channel.id(), 42);
        assert_eq!(channel.name(), Some("releases"));
    }

    #[tokio::test]
    async fn open_channel_rejects_voice_channel() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/channels/42")
            .with_status(200)
            .with_body(r#"{"id": "42", "type": 2, "name": "voice"}"#)
            .create_async()
            .await;

        let result = client(&server.url()).open_channel(42).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(DeliveryError::NotTextChannel {
                channel_id: 42,
                kind: 2
            })
        ));
    }

    #[tokio::test]
    async fn send_message_reports_rejected_message() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/channels/42/messages")
            .with_status(403)
            .with_body(r#"{"message": "Missing Permissions", "code": 50013}"#)
            .create_async()
            .await;

        let result = client(&server.url())
            .send_message(42, &CreateMessage::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(DeliveryError::Status {
                status: 403,
                ref message
            }) if message.contains("Missing Permissions")
        ));
    }

    #[tokio::test]
    async fn send_message_waits_out_rate_limit_and_retries() {
        let mut server = Server::new_async().await;

        let limited = server
            .mock("POST", "/channels/42/messages")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Rate limited.", "retry_after": 0.05, "global": false}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("POST", "/channels/42/messages")
            .with_status(200)
            .with_body(r#"{"id": "99"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = client(&server.url())
            .send_message(42, &CreateMessage::default())
            .await;

        limited.assert_async().await;
        accepted.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_message_gives_up_on_persistent_rate_limit() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/channels/42/messages")
            .with_status(429)
            .with_header("retry-after", "0")
            .with_body(r#"{"retry_after": 0.0}"#)
            .expect(MAX_RATE_LIMIT_RETRIES + 1)
            .create_async()
            .await;

        let result = client(&server.url())
            .send_message(42, &CreateMessage::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(DeliveryError::RateLimited { retry_after_secs: Some(secs) }) if secs == 0.0
        ));
    }

    #[test]
    fn create_message_omits_empty_fields() {
        let message = CreateMessage {
            content: Some("hi".to_string()),
            ..Default::default()
        };

        assert_eq!(serde_json::to_value(&message).unwrap(), json!({"content": "hi"}));
    }
}
