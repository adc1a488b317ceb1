//! Short-lived bearer credentials for the remote backend.

use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::dispatch::DeliveryError;
use crate::infrastructure::config::CredentialConfig;

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when a token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Claims of a locally minted access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Acquires and caches a bearer token.
///
/// Concurrent callers share one refresh; the cache lock is held while a new
/// token is fetched.
pub struct CredentialProvider {
    config: CredentialConfig,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialProvider {
    pub fn new(config: CredentialConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Current token, refreshing it when missing or close to expiry
    pub async fn token(&self) -> Result<String, DeliveryError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let (value, lifetime) = self.acquire().await?;
        tracing::debug!(lifetime_secs = lifetime.as_secs(), "Acquired remote credential");

        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });
        Ok(value)
    }

    /// Drop the cached token so the next call acquires a fresh one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn acquire(&self) -> Result<(String, Duration), DeliveryError> {
        match &self.config {
            CredentialConfig::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            } => {
                let mut form = vec![
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                ];
                if let Some(scope) = scope {
                    form.push(("scope", scope.as_str()));
                }

                let response = self.client.post(token_url).form(&form).send().await?;
                if !response.status().is_success() {
                    return Err(DeliveryError::Credential(format!(
                        "token endpoint returned {}",
                        response.status()
                    )));
                }

                let body: TokenResponse = response.json().await?;
                let lifetime = body
                    .expires_in
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((body.access_token, lifetime))
            }
            CredentialConfig::SignedJwt {
                secret,
                issuer,
                audience,
                subject,
                ttl_seconds,
            } => {
                let now = Utc::now().timestamp();
                let claims = AccessClaims {
                    sub: subject
                        .clone()
                        .unwrap_or_else(|| "mail-merge-service".to_string()),
                    iss: issuer.clone(),
                    aud: audience.clone(),
                    iat: now,
                    exp: now + *ttl_seconds as i64,
                };

                let token = encode(
                    &Header::default(),
                    &claims,
                    &EncodingKey::from_secret(secret.as_bytes()),
                )
                .map_err(|e| DeliveryError::Credential(e.to_string()))?;

                Ok((token, Duration::from_secs(*ttl_seconds)))
            }
        }
    }
}
