use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::DispatchConfig;
use crate::runs::RunManager;

/// Background task that forgets finished runs after their retention period
pub struct RunCleanupTask {
    runs: Arc<RunManager>,
    interval: Duration,
    retention: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl RunCleanupTask {
    pub fn new(
        config: &DispatchConfig,
        runs: Arc<RunManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            runs,
            interval: Duration::from_secs(config.cleanup_interval_seconds.max(1)),
            retention: Duration::from_secs(config.run_retention_seconds),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut cleanup_timer = tokio::time::interval(self.interval);

        // Skip immediate first tick
        cleanup_timer.tick().await;

        tracing::info!(
            cleanup_interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Run cleanup task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Run cleanup task received shutdown signal");
                    break;
                }
                _ = cleanup_timer.tick() => {
                    let purged = self.runs.purge_finished(self.retention);
                    if purged > 0 {
                        tracing::debug!(
                            purged = purged,
                            remaining = self.runs.run_count(),
                            "Purged finished runs"
                        );
                    }
                }
            }
        }

        tracing::info!("Run cleanup task stopped");
    }
}
