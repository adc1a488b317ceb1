//! Backend trait for message delivery.
//!
//! This module defines the abstraction layer for delivery backends, allowing
//! different host mechanisms (compose surfaces, transactional stores, remote
//! APIs) to be tried in priority order by the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::RenderedMessage;

/// Errors that can occur during a delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Backend cannot serve requests right now
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Rendered destination could not be parsed into mailboxes
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    /// Backend answered but refused the message
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// Credential acquisition failed
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The shape of host mechanism a backend drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Opens a pre-filled compose surface; success means the call did not fail
    Compose,
    /// Writes a structured request to a persistence endpoint
    Transactional,
    /// Token-authenticated write to a remote API
    Remote,
    /// In-process capture
    Memory,
}

/// A delivery mechanism the orchestrator can invoke to create one message.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    /// Stable backend name used in logs, metrics and reports
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Whether the host currently supports this mechanism
    fn is_available(&self) -> bool;

    /// Pause the orchestrator should observe after each attempt.
    ///
    /// Backends that open a visible surface per call use this to let the
    /// host settle before the next one.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Create or hand off one rendered message
    async fn attempt(&self, message: &RenderedMessage) -> Result<(), DeliveryError>;
}

/// Serializable view of a backend for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub available: bool,
    pub settle_delay_ms: u64,
}

impl BackendDescriptor {
    pub fn of(backend: &dyn DeliveryBackend) -> Self {
        Self {
            name: backend.name().to_string(),
            kind: backend.kind(),
            available: backend.is_available(),
            settle_delay_ms: backend.settle_delay().as_millis() as u64,
        }
    }
}

/// Describe a backend list, preserving priority order
pub fn describe_backends(backends: &[Arc<dyn DeliveryBackend>]) -> Vec<BackendDescriptor> {
    backends
        .iter()
        .map(|backend| BackendDescriptor::of(backend.as_ref()))
        .collect()
}
