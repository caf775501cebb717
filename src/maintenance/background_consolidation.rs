//! Background consolidation worker for the topic graph.
//!
//! Periodically runs a consolidation pass with the configured thresholds so
//! the active topic set stays compact without manual merge calls. The pass
//! takes no ingestion locks, so it never blocks concurrent turns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::errors::MemoryResult;
use crate::topics::organizer::{MergeOutcome, TopicOrganizer};

/// Configuration for background consolidation.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval between consolidation passes (in seconds).
    pub interval_seconds: u64,
    /// Whether the background worker is enabled.
    pub enabled: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 600,
            enabled: true,
        }
    }
}

/// Background worker that consolidates topics on an interval.
pub struct BackgroundConsolidation {
    organizer: Arc<TopicOrganizer>,
    config: MaintenanceConfig,
    shutdown: Arc<Notify>,
}

impl BackgroundConsolidation {
    /// Create a new background consolidation worker.
    #[must_use]
    pub fn new(organizer: Arc<TopicOrganizer>, config: MaintenanceConfig) -> Self {
        Self {
            organizer,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a shutdown notifier to stop the worker.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the worker as a tokio task.
    ///
    /// Returns a `JoinHandle` that can be used to await completion.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the consolidation loop until shutdown is signaled.
    async fn run(&self) {
        if !self.config.enabled {
            info!("background consolidation is disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_seconds);
        info!(?interval, "starting background consolidation worker");

        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    match self.run_pass().await {
                        Ok(MergeOutcome::Merged { topic_id, source_ids, moved_entries }) => {
                            info!(
                                %topic_id,
                                sources = source_ids.len(),
                                moved = moved_entries,
                                "consolidation pass merged topics"
                            );
                        }
                        Ok(MergeOutcome::Skipped { reason }) => {
                            debug!("consolidation pass skipped: {reason}");
                        }
                        Err(err) => {
                            warn!(?err, "consolidation pass failed");
                        }
                    }
                }
                () = self.shutdown.notified() => {
                    info!("background consolidation worker shutting down");
                    break;
                }
            }
        }
    }

    /// Run a single consolidation pass with the configured thresholds.
    ///
    /// # Errors
    /// Returns an error if storage operations fail.
    pub async fn run_pass(&self) -> MemoryResult<MergeOutcome> {
        self.organizer.run(self.organizer.default_params()).await
    }
}
