//! Bot startup and lifecycle

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::bot::discord::DiscordClient;
use crate::bot::notifier::Notifier;
use crate::bot::poll::{CycleReport, Poller};
use crate::bot::scheduler::{self, Schedule, shutdown_signal};
use crate::config::Config;
use crate::release::cache::ReleaseCache;
use crate::release::fetchers::{CurseForgeFetcher, ModtaleFetcher, http_client};
use crate::release::types::Project;

/// Everything a running bot owns
pub struct App {
    pub poller: Poller,
    pub cache: ReleaseCache,
    pub projects: Vec<Project>,
}

/// Authenticate with Discord, resolve the channel and load the cache
pub async fn connect(config: &Config) -> anyhow::Result<App> {
    let http = http_client(config.http_timeout).context("Failed to build HTTP client")?;

    let discord = DiscordClient::new(
        http.clone(),
        &config.endpoints.discord,
        &config.discord_token,
    );
    let user = discord
        .current_user()
        .await
        .context("Failed to authenticate with Discord")?;
    info!("Session established as {}", user.username);

    let channel = discord
        .open_channel(config.channel_id)
        .await
        .with_context(|| format!("Failed to open channel {}", config.channel_id))?;
    info!(
        "Announcing to channel {} ({})",
        channel.id(),
        channel.name().unwrap_or("unnamed")
    );

    let modtale = ModtaleFetcher::new(http.clone(), &config.endpoints.modtale)
        .with_default_api_key(config.modtale_api_key.clone());
    let curseforge = CurseForgeFetcher::new(http, &config.endpoints.cfwidget);

    let poller = Poller::new(Notifier::new(Arc::new(channel)), config.mark_seen_policy)
        .with_fetcher(Arc::new(modtale))
        .with_fetcher(Arc::new(curseforge));

    Ok(App {
        poller,
        cache: ReleaseCache::load(&config.cache_path),
        projects: config.projects(),
    })
}

/// Run the bot until ctrl-c or SIGTERM
pub async fn run_bot(config: Config) -> anyhow::Result<()> {
    let mut app = connect(&config).await?;

    info!("Modtale projects: {}", config.modtale_projects.len());
    info!("CurseForge projects: {}", config.curseforge_projects.len());
    info!("Cache file: {}", app.cache.path().display());
    info!("Startup complete");

    scheduler::run(
        &app.poller,
        &mut app.cache,
        &app.projects,
        Schedule::new(config.schedule_intervals()),
        shutdown_signal(),
    )
    .await;

    info!("Stopped");
    Ok(())
}

/// Run a single cycle over every configured project
pub async fn run_once(config: Config) -> anyhow::Result<CycleReport> {
    let mut app = connect(&config).await?;
    let projects: Vec<&Project> = app.projects.iter().collect();

    Ok(app.poller.run_cycle(&mut app.cache, &projects).await)
}
