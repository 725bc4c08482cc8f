use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use modwatch::bot::server::{run_bot, run_once};
use modwatch::config::Config;
use modwatch::logging::{self, LogConfig};

#[derive(Parser)]
#[command(name = "modwatch")]
#[command(version, about = "Announces new Modtale and CurseForge releases on Discord")]
struct Cli {
    /// Read environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single poll cycle and exit
    Once,
    /// Validate the configuration and exit
    CheckConfig,
}

fn load_env_file(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            // ./.env is optional
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    load_env_file(cli.env_file.as_deref())?;
    let _log_guard = logging::init(&LogConfig::from_env())?;

    let config = Config::from_env().inspect_err(|e| error!("Invalid configuration: {}", e))?;

    match cli.command {
        None => runtime()?.block_on(run_bot(config)),
        Some(Command::Once) => {
            let report = runtime()?.block_on(run_once(config))?;
            println!(
                "announced={} delivery_failures={} failed_projects={} saved={}",
                report.announced,
                report.delivery_failures,
                report.failed_projects.len(),
                report.saved
            );
            Ok(())
        }
        Some(Command::CheckConfig) => {
            println!("channel: {}", config.channel_id);
            println!("cache: {}", config.cache_path.display());
            for (platform, interval) in config.schedule_intervals() {
                println!("{} every {}s", platform, interval.as_secs());
            }
            for project in config.projects() {
                println!(
                    "{} {}",
                    project.label(),
                    project.display_name.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
    }
}
