//! Compose-surface backend.
//!
//! Writes each rendered message as an unsent `.eml` draft into an outbox
//! directory watched by a desktop mail client. The client opens one compose
//! window per file, so the backend asks for a settle delay between calls.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mail_builder::headers::address::Address;
use mail_builder::headers::raw::Raw;
use mail_builder::MessageBuilder;
use uuid::Uuid;

use crate::dispatch::{BackendKind, DeliveryBackend, DeliveryError};
use crate::infrastructure::config::ComposeConfig;
use crate::template::RenderedMessage;

use super::address::parse_address_list;

pub struct ComposeBackend {
    outbox_dir: PathBuf,
    from_address: Option<String>,
    settle_delay: Duration,
}

impl ComposeBackend {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            outbox_dir: PathBuf::from(&config.outbox_dir),
            from_address: config.from_address.clone(),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }

    fn build(&self, message: &RenderedMessage) -> Result<Vec<u8>, DeliveryError> {
        let recipients = parse_address_list(&message.to)?;
        let to = Address::new_list(
            recipients
                .iter()
                .map(|mailbox| Address::new_address(mailbox.name.as_deref(), mailbox.email.as_str()))
                .collect(),
        );

        let mut builder = MessageBuilder::new()
            .to(to)
            .subject(message.subject.as_str())
            .header("X-Unsent", Raw::new("1"))
            .html_body(message.body.as_str());

        if let Some(from) = &self.from_address {
            let sender = parse_address_list(from)?.remove(0);
            builder = builder.from(Address::new_address(sender.name, sender.email));
        }

        Ok(builder.write_to_vec()?)
    }
}

#[async_trait]
impl DeliveryBackend for ComposeBackend {
    fn name(&self) -> &str {
        "compose"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Compose
    }

    fn is_available(&self) -> bool {
        self.outbox_dir.is_dir()
    }

    fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    #[tracing::instrument(name = "backend.compose.attempt", skip(self, message), fields(to = %message.to))]
    async fn attempt(&self, message: &RenderedMessage) -> Result<(), DeliveryError> {
        let bytes = self.build(message)?;
        let path = self.outbox_dir.join(format!("{}.eml", Uuid::new_v4()));

        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), "Draft written to outbox");
        Ok(())
    }
}
