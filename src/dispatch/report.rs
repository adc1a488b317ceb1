use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Number of errors spelled out in a report summary
const SUMMARY_ERROR_LIMIT: usize = 3;

/// Reasons a run is refused before any recipient is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionError {
    #[error("Subject line is required")]
    MissingSubject,

    #[error("Message body is required")]
    MissingBody,

    #[error("No recipients loaded")]
    NoRecipients,

    #[error("No delivery backend is available")]
    NoBackendAvailable,
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// A precondition failed; nothing was attempted
    NotStarted,
    /// Every attempted recipient succeeded or was skipped
    Succeeded,
    /// Completed with at least one recipient error
    PartialFailure,
    /// Caller stopped the run between recipients
    Aborted,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::NotStarted => "not_started",
            DispatchStatus::Succeeded => "succeeded",
            DispatchStatus::PartialFailure => "partial_failure",
            DispatchStatus::Aborted => "aborted",
        }
    }
}

/// A failed recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientError {
    /// Position in the recipient list
    pub index: usize,
    /// Rendered destination
    pub to: String,
    pub message: String,
}

impl RecipientError {
    pub fn new(index: usize, to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            to: to.into(),
            message: message.into(),
        }
    }
}

/// Terminal summary of one dispatch run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub run_id: Uuid,
    pub status: DispatchStatus,
    /// Recipients delivered
    pub succeeded: usize,
    /// Recipients processed, including skipped and failed ones
    pub attempted: usize,
    /// Recipients whose destination rendered blank
    pub skipped: usize,
    /// Recipients in the input list
    pub total: usize,
    /// Failures in recipient order
    pub errors: Vec<RecipientError>,
    /// Backend active when the run stopped
    pub final_backend: Option<String>,
    /// Backends demoted during the run, in demotion order
    pub demoted_backends: Vec<String>,
    pub aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition_error: Option<PreconditionError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DispatchReport {
    /// Report for a run refused by a precondition
    pub fn not_started(run_id: Uuid, total: usize, error: PreconditionError) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            status: DispatchStatus::NotStarted,
            succeeded: 0,
            attempted: 0,
            skipped: 0,
            total,
            errors: Vec::new(),
            final_backend: None,
            demoted_backends: Vec::new(),
            aborted: false,
            precondition_error: Some(error),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Succeeded
    }

    pub fn fell_back(&self) -> bool {
        !self.demoted_backends.is_empty()
    }

    /// Human-readable outcome, listing the first few errors
    pub fn summary(&self) -> String {
        if let Some(error) = self.precondition_error {
            return format!("Nothing was sent: {}", error);
        }

        let via = self.final_backend.as_deref().unwrap_or("no backend");
        let mut summary = format!(
            "Created {} of {} messages via {}",
            self.succeeded, self.total, via
        );

        if self.skipped > 0 {
            summary.push_str(&format!(
                " ({} skipped without a destination address)",
                self.skipped
            ));
        }

        if self.aborted {
            summary.push_str(&format!(
                "; stopped after {} of {} recipients",
                self.attempted, self.total
            ));
        }

        if !self.errors.is_empty() {
            summary.push_str(&format!(" with {} errors:", self.errors.len()));
            for error in self.errors.iter().take(SUMMARY_ERROR_LIMIT) {
                let target = if error.to.is_empty() {
                    format!("#{}", error.index + 1)
                } else {
                    error.to.clone()
                };
                summary.push_str(&format!("\n{}: {}", target, error.message));
            }
            if self.errors.len() > SUMMARY_ERROR_LIMIT {
                summary.push_str(&format!(
                    "\n...and {} more errors",
                    self.errors.len() - SUMMARY_ERROR_LIMIT
                ));
            }
        }

        if self.fell_back() {
            summary.push_str(&format!(
                "\n\nNote: {} failed, automatically switched to {}.",
                self.demoted_backends.join(", "),
                via
            ));
        }

        summary
    }
}
