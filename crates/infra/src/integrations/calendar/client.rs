//! Calendar HTTP client with token management
//!
//! Handles OAuth token caching/refresh and wraps provider calls in a
//! bounded retry with jittered exponential backoff. Only transient network
//! failures are retried; auth and validation failures surface immediately.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aqademiq_domain::constants::{PRIMARY_CALENDAR_ID, REMOTE_MAX_ATTEMPTS};
use aqademiq_domain::{AqademiqError, EventPatch, GoogleConfig, Result};
use aqademiq_core::RemoteCalendar;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::providers::{create_provider, CalendarProviderApi, FetchEventsResponse};

/// Refresh the access token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Calendar API client with token management
pub struct CalendarClient {
    provider: Box<dyn CalendarProviderApi>,
    credentials: GoogleConfig,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl CalendarClient {
    /// Create a client for the named provider (`"google"`).
    pub fn new(provider_name: &str, credentials: GoogleConfig) -> Result<Self> {
        Ok(Self::with_provider(create_provider(provider_name)?, credentials))
    }

    /// Create a client over an explicit provider implementation (tests).
    pub fn with_provider(
        provider: Box<dyn CalendarProviderApi>,
        credentials: GoogleConfig,
    ) -> Self {
        Self { provider, credentials, tokens: Mutex::new(HashMap::new()) }
    }

    /// Fetch calendar events for a user, retrying transient failures.
    pub async fn fetch_events(
        &self,
        user_id: &str,
        query_params: &[(&str, String)],
    ) -> Result<FetchEventsResponse> {
        let access_token = self.access_token(user_id).await?;

        let mut attempt = 0;
        loop {
            match self
                .provider
                .fetch_events(&access_token, PRIMARY_CALENDAR_ID, query_params)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt + 1 < REMOTE_MAX_ATTEMPTS => {
                    let delay = calculate_backoff(attempt);
                    warn!(
                        user_id,
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Retrieve a cached access token or refresh it via the provider.
    async fn access_token(&self, user_id: &str) -> Result<String> {
        let mut tokens = self.tokens.lock().await;

        if let Some(cached) = tokens.get(user_id) {
            let margin = chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS);
            if cached.expires_at - margin > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let refresh_token = self.credentials.refresh_tokens.get(user_id).ok_or_else(|| {
            AqademiqError::Auth(format!("no refresh token configured for user {user_id}"))
        })?;

        debug!(user_id, "refreshing provider access token");
        let refreshed = self
            .provider
            .refresh_token(
                &self.credentials.client_id,
                &self.credentials.client_secret,
                refresh_token,
            )
            .await?;

        let expires_at = Utc::now() + chrono::Duration::seconds(refreshed.expires_in.max(0));
        let access_token = refreshed.access_token.clone();
        tokens.insert(user_id.to_string(), CachedToken { access_token, expires_at });

        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl RemoteCalendar for CalendarClient {
    async fn upsert_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
        patch: &EventPatch,
    ) -> Result<()> {
        let access_token = self.access_token(user_id).await?;

        let mut attempt = 0;
        loop {
            match self
                .provider
                .upsert_event(&access_token, PRIMARY_CALENDAR_ID, remote_event_id, patch)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if is_retryable(&err) && attempt + 1 < REMOTE_MAX_ATTEMPTS => {
                    let delay = calculate_backoff(attempt);
                    warn!(
                        user_id,
                        remote_event_id,
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "transient write failure, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                // The checkpoint must not advance on a failed write, so the
                // error surfaces as RemoteWrite regardless of cause.
                Err(AqademiqError::RemoteWrite(msg)) => {
                    return Err(AqademiqError::RemoteWrite(msg))
                }
                Err(err) => return Err(AqademiqError::RemoteWrite(err.to_string())),
            }
        }
    }
}

fn is_retryable(err: &AqademiqError) -> bool {
    match err {
        // 410 marks an expired sync cursor, not a transient fault; the
        // worker handles it by clearing the token.
        AqademiqError::Network(msg) => !msg.contains("410"),
        AqademiqError::RemoteWrite(msg) => msg.contains("timed out") || msg.contains("connect"),
        _ => false,
    }
}

/// Calculate exponential backoff delay with jitter
pub fn calculate_backoff(attempt: u32) -> u64 {
    let base_delay = 1000u64; // 1 second in milliseconds
    let max_delay = 32000u64; // 32 seconds max

    let delay = base_delay * 2u64.pow(attempt.min(5));
    let capped_delay = delay.min(max_delay);

    // Add ±25% jitter
    use rand::Rng;
    let jitter_range = (capped_delay as f64 * 0.25) as u64;
    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(0..=jitter_range * 2) as i64 - jitter_range as i64;

    (capped_delay as i64 + jitter).max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_bounded() {
        for attempt in 0..8 {
            let delay = calculate_backoff(attempt);
            assert!(delay <= 40_000, "delay {delay} exceeded cap with jitter");
        }
        // First attempt is about a second, give or take jitter
        let first = calculate_backoff(0);
        assert!((750..=1250).contains(&first), "unexpected first delay {first}");
    }

    #[test]
    fn network_errors_are_retryable() {
        assert!(is_retryable(&AqademiqError::Network("503".into())));
        assert!(!is_retryable(&AqademiqError::Auth("401".into())));
        assert!(!is_retryable(&AqademiqError::Validation("bad".into())));
    }

    #[test]
    fn gone_sync_token_is_not_retryable() {
        let err = AqademiqError::Network("Google API error (410 Gone): Gone".into());
        assert!(!is_retryable(&err));
    }
}
