//! In-process capture backend for dry runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::dispatch::{BackendKind, DeliveryBackend, DeliveryError};
use crate::template::RenderedMessage;

/// Keeps every delivered message in memory.
///
/// Messages are lost on restart. Availability can be toggled at runtime.
pub struct MemoryBackend {
    name: String,
    available: AtomicBool,
    delivered: Mutex<Vec<RenderedMessage>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Messages delivered so far, in order
    pub async fn delivered(&self) -> Vec<RenderedMessage> {
        self.delivered.lock().await.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn attempt(&self, message: &RenderedMessage) -> Result<(), DeliveryError> {
        if !self.is_available() {
            return Err(DeliveryError::Unavailable(self.name.clone()));
        }
        self.delivered.lock().await.push(message.clone());
        Ok(())
    }
}
