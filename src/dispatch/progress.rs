use serde::Serialize;

/// Immutable view of a run, published after every recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Recipients processed so far
    pub processed: usize,
    pub total: usize,
    /// `round(100 * processed / total)`
    pub percent: u8,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Backend that will serve the next recipient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_backend: Option<String>,
    /// Human-readable status line
    pub status: String,
    /// Set once the run has stopped, by completion or abort
    pub finished: bool,
}

impl ProgressSnapshot {
    /// Snapshot of a run that has not processed anyone yet
    pub fn pending(total: usize, active_backend: Option<String>) -> Self {
        Self {
            processed: 0,
            total,
            percent: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            active_backend,
            status: "Waiting to start".to_string(),
            finished: false,
        }
    }
}

/// Completion percentage, rounded half up
pub fn percent_complete(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let processed = processed.min(total);
    ((200 * processed + total) / (2 * total)) as u8
}
