//! Refresh Daemon
//!
//! Runs a background loop that checks the cron schedule and triggers
//! refresh runs when due. Uses `tokio::time::interval` for the tick
//! loop and `Arc<AtomicBool>` flags for graceful shutdown and for the
//! overlap guard: a trigger that fires while a refresh is still running
//! is skipped, never run in parallel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::run_once;
use crate::types::{MarketplaceFetcher, MarketplaceSource, RefresherConfig, RunSummary};

/// Options for creating a refresh daemon.
pub struct RefreshDaemonOptions {
    /// Tick interval in seconds. Defaults to 30.
    pub tick_interval_secs: u64,
    /// Six-field cron expression for the refresh schedule.
    pub schedule: String,
}

impl Default for RefreshDaemonOptions {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            schedule: "0 0 * * * *".to_string(),
        }
    }
}

/// The refresh daemon. Runs a background tokio task that periodically
/// checks the schedule and executes a refresh when one is due.
pub struct RefreshDaemon {
    /// Atomic flag indicating whether the daemon is running.
    running: Arc<AtomicBool>,
    /// Overlap guard: set while a refresh run is in flight.
    refreshing: Arc<AtomicBool>,
    /// Handle to the spawned background task.
    interval_handle: Option<JoinHandle<()>>,
    /// Tick interval in seconds.
    tick_interval_secs: u64,
    /// Cron schedule for refresh runs.
    schedule: String,
    /// Completion time of the last successful or failed run.
    last_run: Arc<tokio::sync::RwLock<Option<DateTime<Utc>>>>,
}

/// Create a new refresh daemon from the given options.
pub fn create_refresh_daemon(options: RefreshDaemonOptions) -> RefreshDaemon {
    RefreshDaemon {
        running: Arc::new(AtomicBool::new(false)),
        refreshing: Arc::new(AtomicBool::new(false)),
        interval_handle: None,
        tick_interval_secs: options.tick_interval_secs,
        schedule: options.schedule,
        last_run: Arc::new(tokio::sync::RwLock::new(None)),
    }
}

impl RefreshDaemon {
    /// Start the daemon background loop.
    ///
    /// Spawns a tokio task that ticks at the configured interval and
    /// runs the pipeline whenever the schedule says one is due.
    pub fn start(
        &mut self,
        config: RefresherConfig,
        sources: Vec<MarketplaceSource>,
        fetcher: Arc<dyn MarketplaceFetcher>,
    ) {
        if self.running.load(Ordering::SeqCst) {
            warn!("Refresh daemon is already running");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            "Starting refresh daemon: schedule '{}', {}s tick interval",
            self.schedule, self.tick_interval_secs
        );

        let running = Arc::clone(&self.running);
        let refreshing = Arc::clone(&self.refreshing);
        let last_run = Arc::clone(&self.last_run);
        let schedule = self.schedule.clone();
        let tick_secs = self.tick_interval_secs;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));

            loop {
                interval.tick().await;

                if !running.load(Ordering::SeqCst) {
                    info!("Refresh daemon stopping");
                    break;
                }

                let due = {
                    let last = *last_run.read().await;
                    is_due(&schedule, last)
                };
                if !due {
                    continue;
                }

                if !try_begin(&refreshing) {
                    warn!("Refresh still in progress; skipping this trigger");
                    continue;
                }

                match run_once(Arc::clone(&fetcher), &config, &sources).await {
                    Ok(summary) => {
                        info!(
                            "Scheduled refresh {} finished (published={})",
                            summary.run_id, summary.published
                        );
                    }
                    Err(e) => {
                        error!("Scheduled refresh failed: {:#}", e);
                    }
                }

                // Either way the schedule moves on; the next trigger is
                // the retry mechanism.
                *last_run.write().await = Some(Utc::now());
                refreshing.store(false, Ordering::SeqCst);
            }
        });

        self.interval_handle = Some(handle);
    }

    /// Stop the daemon gracefully.
    pub fn stop(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            debug!("Refresh daemon is not running");
            return;
        }

        info!("Stopping refresh daemon");
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.interval_handle.take() {
            handle.abort();
        }
    }

    /// Returns whether the daemon is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run a refresh immediately, regardless of the schedule.
    ///
    /// Fails if a scheduled refresh is already in flight; runs never
    /// overlap.
    pub async fn force_run(
        &self,
        config: &RefresherConfig,
        sources: &[MarketplaceSource],
        fetcher: Arc<dyn MarketplaceFetcher>,
    ) -> Result<RunSummary> {
        if !try_begin(&self.refreshing) {
            bail!("A refresh is already in progress");
        }

        info!("Force-running refresh");
        let result = run_once(fetcher, config, sources)
            .await
            .context("Forced refresh failed");

        *self.last_run.write().await = Some(Utc::now());
        self.refreshing.store(false, Ordering::SeqCst);

        result
    }
}

/// Atomically claim the overlap guard. Returns false when a refresh
/// already holds it.
fn try_begin(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

/// Check whether a refresh is due based on the cron schedule.
///
/// With no previous run the refresh is due immediately. An unparseable
/// schedule is logged and never fires.
pub fn is_due(schedule: &str, last_run: Option<DateTime<Utc>>) -> bool {
    let schedule: Schedule = match schedule.parse() {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid cron schedule '{}': {}", schedule, e);
            return false;
        }
    };

    let Some(last_run) = last_run else {
        // Never ran; refresh on boot.
        return true;
    };

    match schedule.after(&last_run).next() {
        Some(next) => Utc::now() >= next,
        None => false,
    }
}
