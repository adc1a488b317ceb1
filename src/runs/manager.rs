use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatch::{
    check_preconditions, DeliveryBackend, DispatchOrchestrator, DispatchReport, PreconditionError,
    ProgressSnapshot,
};
use crate::template::{MergeTemplate, Record};

/// Handle for a single spawned run
#[derive(Debug)]
pub struct RunHandle {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    cancel: CancellationToken,
    progress: watch::Receiver<ProgressSnapshot>,
    report: watch::Receiver<Option<DispatchReport>>,
}

impl RunHandle {
    /// Latest published progress
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    /// Terminal report, once the run has stopped
    pub fn report(&self) -> Option<DispatchReport> {
        self.report.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.report.borrow().is_some()
    }

    pub fn progress_receiver(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.clone()
    }

    pub fn report_receiver(&self) -> watch::Receiver<Option<DispatchReport>> {
        self.report.clone()
    }

    /// Ask the run to stop before its next recipient
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.report.borrow().as_ref().map(|report| report.finished_at)
    }
}

/// Owns every run started through the service
pub struct RunManager {
    /// run_id -> RunHandle
    runs: DashMap<Uuid, Arc<RunHandle>>,
    backends: Vec<Arc<dyn DeliveryBackend>>,
    max_settle_delay: Duration,
}

impl RunManager {
    pub fn new(backends: Vec<Arc<dyn DeliveryBackend>>, max_settle_delay: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            backends,
            max_settle_delay,
        }
    }

    /// Backends in priority order
    pub fn backends(&self) -> &[Arc<dyn DeliveryBackend>] {
        &self.backends
    }

    /// Validate and spawn a run.
    ///
    /// Precondition failures are returned before anything is spawned.
    pub fn start(
        &self,
        template: MergeTemplate,
        recipients: Vec<Record>,
    ) -> Result<Arc<RunHandle>, PreconditionError> {
        check_preconditions(&template, &recipients, &self.backends)?;

        let cancel = CancellationToken::new();
        let orchestrator = DispatchOrchestrator::new(self.backends.clone())
            .with_cancellation(cancel.clone())
            .with_max_settle_delay(self.max_settle_delay);
        let run_id = orchestrator.run_id();

        let (report_tx, report_rx) = watch::channel(None);
        let handle = Arc::new(RunHandle {
            id: run_id,
            started_at: Utc::now(),
            cancel,
            progress: orchestrator.subscribe(),
            report: report_rx,
        });
        self.runs.insert(run_id, handle.clone());

        tokio::spawn(async move {
            let report = orchestrator.run(&template, &recipients).await;
            report_tx.send_replace(Some(report));
        });

        tracing::info!(run_id = %run_id, "Run started");
        Ok(handle)
    }

    pub fn get(&self, run_id: &Uuid) -> Option<Arc<RunHandle>> {
        self.runs.get(run_id).map(|entry| entry.value().clone())
    }

    /// Request abort; returns false for unknown runs
    pub fn abort(&self, run_id: &Uuid) -> bool {
        match self.get(run_id) {
            Some(handle) => {
                handle.abort();
                tracing::info!(run_id = %run_id, "Run abort requested");
                true
            }
            None => false,
        }
    }

    /// Abort every run still in flight
    pub fn abort_all(&self) -> usize {
        let mut aborted = 0;
        for entry in self.runs.iter() {
            if !entry.is_finished() {
                entry.abort();
                aborted += 1;
            }
        }
        aborted
    }

    pub fn active_count(&self) -> usize {
        self.runs.iter().filter(|entry| !entry.is_finished()).count()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Remove runs that finished longer than `retention` ago
    pub fn purge_finished(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };

        let before = self.runs.len();
        self.runs.retain(|_, handle| match handle.finished_at() {
            Some(finished_at) => finished_at > cutoff,
            None => true,
        });
        before - self.runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::dispatch::DispatchStatus;
    use serde_json::json;

    fn template() -> MergeTemplate {
        MergeTemplate::new("{{Email}}", "Hello", "<p>Hi {{Name}}</p>")
    }

    fn recipients(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                json!({"Email": format!("user{}@example.com", i), "Name": "Test"})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect()
    }

    async fn wait_finished(handle: &RunHandle) -> DispatchReport {
        let mut receiver = handle.report_receiver();
        let report = receiver.wait_for(Option::is_some).await.unwrap().clone();
        report.unwrap()
    }

    #[tokio::test]
    async fn test_start_runs_to_completion() {
        let memory = Arc::new(MemoryBackend::new());
        let manager = RunManager::new(vec![memory.clone() as Arc<dyn DeliveryBackend>], Duration::from_secs(2));

        let handle = manager.start(template(), recipients(3)).unwrap();
        let report = wait_finished(&handle).await;

        assert_eq!(report.status, DispatchStatus::Succeeded);
        assert_eq!(report.run_id, handle.id);
        assert_eq!(memory.delivered().await.len(), 3);
        assert!(manager.get(&handle.id).is_some());
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_start_rejects_preconditions() {
        let manager = RunManager::new(vec![Arc::new(MemoryBackend::new()) as Arc<dyn DeliveryBackend>], Duration::from_secs(2));

        let result = manager.start(template(), Vec::new());
        assert_eq!(result.err(), Some(PreconditionError::NoRecipients));
        assert_eq!(manager.run_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_unknown_run() {
        let manager = RunManager::new(Vec::new(), Duration::from_secs(2));
        assert!(!manager.abort(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_runs() {
        let manager = RunManager::new(vec![Arc::new(MemoryBackend::new()) as Arc<dyn DeliveryBackend>], Duration::from_secs(2));
        let handle = manager.start(template(), recipients(1)).unwrap();
        wait_finished(&handle).await;

        assert_eq!(manager.purge_finished(Duration::from_secs(3600)), 0);
        assert_eq!(manager.purge_finished(Duration::ZERO), 1);
        assert!(manager.get(&handle.id).is_none());
    }
}
