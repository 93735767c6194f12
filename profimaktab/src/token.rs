//! Bearer token acquisition and caching.

use crate::types::{Credentials, TokenResponse};
use crate::Error;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Assumed token lifetime, kept an hour under the server's 24h.
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(23 * 60 * 60);

#[derive(Debug)]
struct Token {
    value: String,
    fetched_at: Instant,
}

/// Holds at most one bearer token and refreshes it when it expires.
///
/// The lock is held across the whole check-refresh-store sequence, so
/// concurrent callers share a single refresh.
#[derive(Debug)]
pub struct TokenCache {
    slot: Mutex<Option<Token>>,
    validity: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_VALIDITY)
    }
}

impl TokenCache {
    #[must_use]
    pub fn new(validity: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            validity,
        }
    }

    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// Returns a valid token, fetching a new one if none is held or the
    /// held one has expired.
    ///
    /// # Errors
    /// Returns `Error::Authentication` if the server rejects the credentials
    /// or answers without an access token, and `Error::Connectivity` if the
    /// request cannot be sent.
    pub async fn get(
        &self,
        client: &Client,
        url: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<String, Error> {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            if token.fetched_at.elapsed() < self.validity {
                return Ok(token.value.clone());
            }
            tracing::debug!("access token expired");
        }

        *slot = None;
        let value = fetch_token(client, url, credentials, timeout).await?;
        *slot = Some(Token {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drops the cached token so the next call authenticates again.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    /// Whether a token is currently held, expired or not.
    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

async fn fetch_token(
    client: &Client,
    url: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<String, Error> {
    tracing::debug!(username = %credentials.username, "requesting access token");
    let response = client
        .post(url)
        .json(credentials)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "failed to authenticate");
        return Err(Error::Authentication {
            reason: format!("token request rejected with status {}", status.as_u16()),
            status: Some(status.as_u16()),
        });
    }

    let body = response.bytes().await?;
    let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| Error::Authentication {
        reason: format!("malformed token response: {e}"),
        status: Some(status.as_u16()),
    })?;

    parsed.access.ok_or_else(|| Error::Authentication {
        reason: "no access token in login response".to_string(),
        status: Some(status.as_u16()),
    })
}
