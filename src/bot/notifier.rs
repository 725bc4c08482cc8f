//! Release announcement formatting and delivery

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::bot::discord::{ActionRow, CreateMessage, Embed, EmbedFooter, EmbedImage, LinkButton};
use crate::bot::error::DeliveryError;
use crate::release::types::{Platform, Release};

/// Accent colour of announcement embeds
pub const EMBED_COLOR: u32 = 0x0F172A;

/// Discord limits, in characters
const EMBED_TITLE_LIMIT: usize = 256;
const EMBED_FOOTER_LIMIT: usize = 2048;
const BUTTON_LABEL_LIMIT: usize = 80;
/// Version labels are cut well below the 4096 description limit
const VERSION_LABEL_LIMIT: usize = 256;

/// Destination announcements are posted to
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, message: &CreateMessage) -> Result<(), DeliveryError>;
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Build the announcement message for a release
pub fn build_message(release: &Release) -> CreateMessage {
    let platform = release.platform.display_name();
    let published_line = match release.platform {
        Platform::Modtale => "A new version has been published on Modtale.",
        Platform::CurseForge => "A new file has been published on CurseForge.",
    };

    let embed = Embed {
        title: truncate(
            &format!("A new version of {} is available", release.project_title),
            EMBED_TITLE_LIMIT,
        ),
        description: format!(
            "**Version:** `{}`\n\n*{}*",
            truncate(&release.version_label, VERSION_LABEL_LIMIT),
            published_line
        ),
        color: EMBED_COLOR,
        url: Some(release.download_url.clone()),
        thumbnail: release
            .thumbnail_url
            .clone()
            .map(|url| EmbedImage { url }),
        footer: Some(EmbedFooter {
            text: truncate(
                &format!("By {}", release.author.as_deref().unwrap_or("Unknown Author")),
                EMBED_FOOTER_LIMIT,
            ),
        }),
        timestamp: release.published_at,
    };

    CreateMessage {
        content: None,
        embeds: vec![embed],
        components: vec![ActionRow::new(vec![LinkButton::new(
            truncate(&format!("Download from {}", platform), BUTTON_LABEL_LIMIT),
            release.download_url.clone(),
        )])],
    }
}

/// Formats releases and sends them to the configured channel
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn ChatChannel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self { channel }
    }

    pub async fn notify(&self, release: &Release) -> Result<(), DeliveryError> {
        let message = build_message(release);
        self.channel.send(&message).await?;

        info!(
            "Announced {}:{} release {} ({})",
            release.platform, release.project_id, release.release_id, release.version_label
        );
        Ok(())
    }
}
