//! Fixed-interval poll loop

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::bot::poll::Poller;
use crate::release::cache::SeenStore;
use crate::release::types::{Platform, Project};

#[derive(Debug, Clone)]
struct ScheduleEntry {
    platform: Platform,
    interval: Duration,
    next_due: Option<Instant>,
}

/// Tracks when each platform is due for polling
///
/// The loop ticks at the greatest common divisor of the platform intervals,
/// so every platform is polled exactly on its own interval.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl Schedule {
    /// Build a schedule; intervals are rounded down to whole seconds (min 1s)
    pub fn new(intervals: impl IntoIterator<Item = (Platform, Duration)>) -> Self {
        let entries = intervals
            .into_iter()
            .map(|(platform, interval)| ScheduleEntry {
                platform,
                interval: Duration::from_secs(interval.as_secs().max(1)),
                next_due: None,
            })
            .collect();
        Self { entries }
    }

    /// Period of the underlying timer, `None` when nothing is scheduled
    pub fn tick_interval(&self) -> Option<Duration> {
        self.entries
            .iter()
            .map(|e| e.interval.as_secs())
            .reduce(gcd)
            .map(Duration::from_secs)
    }

    /// Platforms due at `now`; their next due time moves one interval ahead
    pub fn take_due(&mut self, now: Instant) -> Vec<Platform> {
        self.entries
            .iter_mut()
            .filter(|e| e.next_due.is_none_or(|due| now >= due))
            .map(|e| {
                e.next_due = Some(now + e.interval);
                e.platform
            })
            .collect()
    }
}

/// Run poll cycles until `shutdown` resolves
///
/// A cycle always runs to completion before the next tick is taken. Ticks
/// missed while a cycle overran are not replayed; the timer resumes one
/// period after the late tick.
pub async fn run<S, F>(
    poller: &Poller,
    store: &mut S,
    projects: &[Project],
    mut schedule: Schedule,
    shutdown: F,
) where
    S: SeenStore + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let Some(period) = schedule.tick_interval() else {
        info!("No projects configured, waiting for shutdown");
        shutdown.await;
        return;
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let tick = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping poll loop");
                break;
            }
            tick = ticker.tick() => tick,
        };

        let due = schedule.take_due(tick);
        if due.is_empty() {
            continue;
        }

        let selected: Vec<&Project> = projects
            .iter()
            .filter(|p| due.contains(&p.platform()))
            .collect();
        debug!("Polling {} projects for {:?}", selected.len(), due);

        poller.run_cycle(store, &selected).await;
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
