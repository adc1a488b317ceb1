use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::infrastructure::metrics::{DeliveryMetrics, RunMetrics};
use crate::template::{MergeTemplate, Record, RenderedMessage};

use super::backend::DeliveryBackend;
use super::chain::{BackendChain, Fallback};
use super::progress::{percent_complete, ProgressSnapshot};
use super::report::{DispatchReport, DispatchStatus, PreconditionError, RecipientError};

/// Upper bound on any backend-declared settle delay
pub const DEFAULT_MAX_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Error recorded for recipients reached after every backend was demoted
pub const NO_BACKEND_AVAILABLE: &str = "no backend available";

/// Validate a run before anything is attempted.
///
/// Checks run in a fixed order: subject, body, recipients, backends.
pub fn check_preconditions(
    template: &MergeTemplate,
    recipients: &[Record],
    backends: &[Arc<dyn DeliveryBackend>],
) -> Result<(), PreconditionError> {
    if template.subject.trim().is_empty() {
        return Err(PreconditionError::MissingSubject);
    }
    if template.body.trim().is_empty() {
        return Err(PreconditionError::MissingBody);
    }
    if recipients.is_empty() {
        return Err(PreconditionError::NoRecipients);
    }
    if !backends.iter().any(|backend| backend.is_available()) {
        return Err(PreconditionError::NoBackendAvailable);
    }
    Ok(())
}

/// Drives one mail merge run over an ordered list of delivery backends.
///
/// Recipients are processed strictly in order, one at a time. Every attempt
/// is awaited before the next recipient starts. Observers follow the run
/// through [`subscribe`](Self::subscribe) and may stop it between recipients
/// through the cancellation token.
pub struct DispatchOrchestrator {
    run_id: Uuid,
    backends: Vec<Arc<dyn DeliveryBackend>>,
    max_settle_delay: Duration,
    cancel: CancellationToken,
    progress: watch::Sender<ProgressSnapshot>,
}

impl DispatchOrchestrator {
    /// Create an orchestrator over backends in priority order, most capable first
    pub fn new(backends: Vec<Arc<dyn DeliveryBackend>>) -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::pending(0, None));
        Self {
            run_id: Uuid::new_v4(),
            backends,
            max_settle_delay: DEFAULT_MAX_SETTLE_DELAY,
            cancel: CancellationToken::new(),
            progress,
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_settle_delay(mut self, max_settle_delay: Duration) -> Self {
        self.max_settle_delay = max_settle_delay;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Receive a snapshot after every processed recipient
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Render and dispatch one message per recipient.
    ///
    /// Never fails: precondition problems, delivery errors and aborts are all
    /// reported through the returned [`DispatchReport`].
    #[tracing::instrument(
        name = "dispatch.run",
        skip_all,
        fields(run_id = %self.run_id, recipients = recipients.len())
    )]
    pub async fn run(&self, template: &MergeTemplate, recipients: &[Record]) -> DispatchReport {
        if let Err(error) = check_preconditions(template, recipients, &self.backends) {
            tracing::warn!(run_id = %self.run_id, error = %error, "Run refused");
            RunMetrics::record_rejected();

            let report = DispatchReport::not_started(self.run_id, recipients.len(), error);
            let mut snapshot = ProgressSnapshot::pending(recipients.len(), None);
            snapshot.status = report.summary();
            snapshot.finished = true;
            self.progress.send_replace(snapshot);
            return report;
        }

        let started_at = Utc::now();
        RunMetrics::record_started();

        let mut run = DispatchRun::new(recipients.len(), BackendChain::new(&self.backends));
        tracing::info!(
            run_id = %self.run_id,
            total = run.total,
            backend = run.chain.active_name().as_deref().unwrap_or("none"),
            "Starting run"
        );
        self.progress.send_replace(run.snapshot());

        for (index, record) in recipients.iter().enumerate() {
            if self.cancel.is_cancelled() {
                run.aborted = true;
                tracing::info!(
                    run_id = %self.run_id,
                    processed = run.processed,
                    total = run.total,
                    "Run aborted"
                );
                break;
            }

            let settle = self.process(&mut run, index, template.render(record)).await;
            self.progress.send_replace(run.snapshot());

            if !settle.is_zero() && index + 1 < recipients.len() {
                tokio::select! {
                    _ = tokio::time::sleep(settle) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        let report = run.into_report(self.run_id, started_at);
        RunMetrics::record_finished(report.status.as_str());

        let mut snapshot = ProgressSnapshot {
            processed: report.attempted,
            total: report.total,
            percent: percent_complete(report.attempted, report.total),
            succeeded: report.succeeded,
            failed: report.errors.len(),
            skipped: report.skipped,
            active_backend: report.final_backend.clone(),
            status: report.summary(),
            finished: true,
        };
        if report.aborted {
            snapshot.status = format!("Aborted. {}", snapshot.status);
        }
        self.progress.send_replace(snapshot);

        tracing::info!(
            run_id = %self.run_id,
            status = report.status.as_str(),
            succeeded = report.succeeded,
            failed = report.errors.len(),
            skipped = report.skipped,
            "Run finished"
        );

        report
    }

    /// Handle one recipient and return the settle delay to observe afterwards
    async fn process(&self, run: &mut DispatchRun, index: usize, message: RenderedMessage) -> Duration {
        run.processed += 1;

        if !message.has_destination() {
            run.skipped += 1;
            DeliveryMetrics::record_skipped();
            tracing::debug!(run_id = %self.run_id, index = index, "Skipping recipient without destination");
            run.status = format!(
                "Skipped {}/{}: no destination address",
                index + 1,
                run.total
            );
            return Duration::ZERO;
        }

        if let Some(fallback) = run.chain.ensure_available() {
            self.log_fallback(&fallback, "backend reported unavailable");
        }

        let Some(backend) = run.chain.active().cloned() else {
            DeliveryMetrics::record_unroutable();
            tracing::warn!(
                run_id = %self.run_id,
                index = index,
                to = %message.to,
                "No backend left for recipient"
            );
            run.errors
                .push(RecipientError::new(index, &message.to, NO_BACKEND_AVAILABLE));
            run.status = format!("No backend: {}/{} ({})", index + 1, run.total, message.to);
            return Duration::ZERO;
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(backend.attempt(&message))
            .catch_unwind()
            .await;
        let latency = started.elapsed();

        let result = match outcome {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("backend panicked during delivery".to_string()),
        };

        match result {
            Ok(()) => {
                run.succeeded += 1;
                DeliveryMetrics::record_delivered(backend.name(), latency);
                tracing::debug!(
                    run_id = %self.run_id,
                    index = index,
                    backend = backend.name(),
                    to = %message.to,
                    "Message delivered"
                );
            }
            Err(reason) => {
                DeliveryMetrics::record_failed(backend.name(), latency);
                tracing::warn!(
                    run_id = %self.run_id,
                    index = index,
                    backend = backend.name(),
                    to = %message.to,
                    error = %reason,
                    "Delivery failed"
                );
                run.errors.push(RecipientError::new(index, &message.to, reason));

                if let Some(fallback) = run.chain.demote_after_failure() {
                    self.log_fallback(&fallback, "delivery failed");
                }
            }
        }

        run.status = format!(
            "{}: {}/{} ({})",
            backend.name(),
            index + 1,
            run.total,
            message.to
        );

        backend.settle_delay().min(self.max_settle_delay)
    }

    fn log_fallback(&self, fallback: &Fallback, reason: &str) {
        let to = fallback.to.as_deref().unwrap_or("none");
        DeliveryMetrics::record_fallback(&fallback.from, to);
        tracing::warn!(
            run_id = %self.run_id,
            from = %fallback.from,
            to = %to,
            reason = reason,
            "Switching delivery backend"
        );
    }
}

/// Mutable state of a run, owned by the orchestrator for its duration
struct DispatchRun {
    total: usize,
    processed: usize,
    succeeded: usize,
    skipped: usize,
    errors: Vec<RecipientError>,
    chain: BackendChain,
    status: String,
    aborted: bool,
}

impl DispatchRun {
    fn new(total: usize, chain: BackendChain) -> Self {
        Self {
            total,
            processed: 0,
            succeeded: 0,
            skipped: 0,
            errors: Vec::new(),
            chain,
            status: "Starting".to_string(),
            aborted: false,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            percent: percent_complete(self.processed, self.total),
            succeeded: self.succeeded,
            failed: self.errors.len(),
            skipped: self.skipped,
            active_backend: self.chain.active_name(),
            status: self.status.clone(),
            finished: false,
        }
    }

    fn into_report(self, run_id: Uuid, started_at: DateTime<Utc>) -> DispatchReport {
        let status = if self.aborted {
            DispatchStatus::Aborted
        } else if self.errors.is_empty() {
            DispatchStatus::Succeeded
        } else {
            DispatchStatus::PartialFailure
        };

        DispatchReport {
            run_id,
            status,
            succeeded: self.succeeded,
            attempted: self.processed,
            skipped: self.skipped,
            total: self.total,
            errors: self.errors,
            final_backend: self.chain.active_name(),
            demoted_backends: self.chain.demoted().to_vec(),
            aborted: self.aborted,
            precondition_error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
