//! Background archiving of last month's most downloaded entries.
//!
//! The task checks once at startup and then on every tick whether the
//! previous month still needs archiving. Archiving a month twice is harmless,
//! so the interval only bounds how late after a month boundary the ranking
//! appears.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::{self, ArchiveSummary, SharedStorage};

/// Periodic archiver for the monthly popularity ranking.
#[derive(Debug)]
pub struct ArchiveTask {
    storage: SharedStorage,
    interval: Duration,
    top_n: usize,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl ArchiveTask {
    /// Create an archiver. It does nothing until run.
    #[must_use]
    pub fn new(storage: SharedStorage, interval: Duration, top_n: usize) -> Self {
        Self {
            storage,
            interval,
            top_n,
            running: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(Notify::new()),
        }
    }

    /// Start the archiver on the current tokio runtime.
    #[must_use]
    pub fn spawn(storage: SharedStorage, interval: Duration, top_n: usize) -> ArchiveHandle {
        let task = Self::new(storage, interval, top_n);
        let running = Arc::clone(&task.running);
        let stop = Arc::clone(&task.stop);

        let join = tokio::spawn(task.run());
        ArchiveHandle {
            running,
            stop,
            join,
        }
    }

    /// Archive the previous month if it still needs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn run_once(&self) -> Result<Option<ArchiveSummary>> {
        let top_n = self.top_n;
        storage::blocking(&self.storage, move |storage| {
            storage.archive_previous_month_if_needed(Utc::now(), top_n)
        })
        .await
    }

    /// Run until stopped.
    pub async fn run(self) {
        debug!(
            interval_secs = self.interval.as_secs(),
            top_n = self.top_n,
            "Starting monthly archiver"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.stop.notified() => break,
            }

            match self.run_once().await {
                Ok(Some(summary)) => info!(
                    games = summary.games_archived,
                    ports = summary.ports_archived,
                    "Archived last month's popular entries"
                ),
                Ok(None) => debug!("Nothing to archive"),
                Err(e) => warn!(error = %e, "Monthly archive failed"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Monthly archiver stopped");
    }
}

/// Control handle for a spawned [`ArchiveTask`].
#[derive(Debug)]
pub struct ArchiveHandle {
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
    join: JoinHandle<()>,
}

impl ArchiveHandle {
    /// Ask the archiver to stop. It finishes any run in progress first.
    pub fn stop(&self) {
        debug!("Stopping monthly archiver");
        self.running.store(false, Ordering::SeqCst);
        self.stop.notify_one();
    }

    /// Check if the archiver is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the archiver and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Monthly archiver task failed");
        }
    }
}
