//! Calendar provider trait and factory
//!
//! Defines the common interface for calendar providers and factory function.

use async_trait::async_trait;
use aqademiq_domain::{AqademiqError, EventPatch, RemoteEvent, Result};
use serde::{Deserialize, Serialize};

/// Response from a provider `fetch_events` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEventsResponse {
    pub events: Vec<RemoteEvent>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

/// Token refresh response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Trait for calendar provider operations
#[async_trait]
pub trait CalendarProviderApi: Send + Sync {
    /// Fetch events from the calendar provider
    async fn fetch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query_params: &[(&str, String)],
    ) -> Result<FetchEventsResponse>;

    /// Create or update a single event
    async fn upsert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<()>;

    /// Refresh an access token using a refresh token
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse>;
}

/// Create a calendar provider instance by name
pub fn create_provider(provider: &str) -> Result<Box<dyn CalendarProviderApi>> {
    match provider {
        "google" => Ok(Box::new(super::google::GoogleCalendarProvider::new())),
        other => Err(AqademiqError::InvalidInput(format!("unknown provider: {other}"))),
    }
}
