use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use calres_core::config::CalresConfig;
use calres_core::job::UpdateResourcesRoomsJob;
use calres_core::store::{CacheStore, SqliteStore};
use chrono::Local;
use owo_colors::OwoColorize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::render::SummaryRender;
use crate::singleton;

pub async fn run(config: &CalresConfig, interval: Duration) -> Result<()> {
    if interval.is_zero() {
        anyhow::bail!("Interval must be greater than zero");
    }

    let database = config.database_path();
    let _lock = singleton::acquire_lock(&database)?;
    let mut store = SqliteStore::open(&database)?;
    let job = config.job();

    info!(
        database = %database.display(),
        interval = %humantime::format_duration(interval),
        "watching backends"
    );

    watch(&job, &mut store, interval, tokio::signal::ctrl_c()).await;
    Ok(())
}

/// Runs the job on every tick until `shutdown` completes. Returns the number of runs.
///
/// `shutdown` is polled for the whole loop, so a signal that arrives during a
/// run stops the loop right after that run.
async fn watch<F: Future>(
    job: &UpdateResourcesRoomsJob,
    store: &mut dyn CacheStore,
    interval: Duration,
    shutdown: F,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    let mut runs = 0;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!(runs, "stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = job.run(store).await;
                runs += 1;
                for (kind, reason) in &report.failures {
                    warn!(run_id = %report.run_id, %kind, "update failed: {}", reason);
                }

                let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                let quiet = report
                    .kinds
                    .iter()
                    .all(|k| k.is_noop() && k.failed().next().is_none());
                if quiet && report.failures.is_empty() {
                    println!("{} {}", stamp.dimmed(), "no changes".dimmed());
                } else {
                    println!("{}\n{}\n", stamp.dimmed(), report.render(false));
                }
            }
        }
    }

    runs
}
