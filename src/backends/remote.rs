//! Token-authenticated remote draft backend.
//!
//! Posts each rendered message to a drafts endpoint with a bearer token from
//! [`CredentialProvider`]. Any 2xx response counts as delivered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::dispatch::{BackendKind, DeliveryBackend, DeliveryError};
use crate::infrastructure::config::{CredentialConfig, RemoteConfig};
use crate::template::RenderedMessage;

use super::address::{parse_address_list, Mailbox};
use super::credentials::CredentialProvider;

#[derive(Debug, Serialize)]
struct DraftPayload<'a> {
    to: Vec<Mailbox>,
    subject: &'a str,
    body: &'a str,
    body_type: &'static str,
}

pub struct RemoteDraftBackend {
    endpoint: String,
    client: reqwest::Client,
    credentials: CredentialProvider,
}

impl RemoteDraftBackend {
    pub fn new(
        endpoint: impl Into<String>,
        credential: CredentialConfig,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            credentials: CredentialProvider::new(credential, client.clone()),
            client,
        })
    }

    /// Build from settings; `None` when the endpoint or credential is missing
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>, DeliveryError> {
        match (&config.endpoint, &config.credential) {
            (Some(endpoint), Some(credential)) => Self::new(
                endpoint.clone(),
                credential.clone(),
                Duration::from_secs(config.timeout_seconds),
            )
            .map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl DeliveryBackend for RemoteDraftBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn is_available(&self) -> bool {
        true
    }

    #[tracing::instrument(name = "backend.remote.attempt", skip(self, message), fields(to = %message.to))]
    async fn attempt(&self, message: &RenderedMessage) -> Result<(), DeliveryError> {
        let payload = DraftPayload {
            to: parse_address_list(&message.to)?,
            subject: &message.subject,
            body: &message.body,
            body_type: "html",
        };

        let token = self.credentials.token().await?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate().await;
            return Err(DeliveryError::Credential(
                "remote endpoint rejected the access token".to_string(),
            ));
        }

        let detail = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected(if detail.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, detail)
        }))
    }
}
