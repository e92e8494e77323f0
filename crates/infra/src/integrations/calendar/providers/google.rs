//! Google Calendar provider implementation

use std::time::Duration;

use async_trait::async_trait;
use aqademiq_domain::{AqademiqError, EventPatch, EventTime, RemoteEvent, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{CalendarProviderApi, FetchEventsResponse, TokenRefreshResponse};
use crate::errors::InfraError;

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Google Calendar provider
pub struct GoogleCalendarProvider {
    http: Client,
    api_base: String,
    token_url: String,
}

impl GoogleCalendarProvider {
    pub fn new() -> Self {
        Self::with_base_urls(GOOGLE_CALENDAR_API_BASE, GOOGLE_TOKEN_URL)
    }

    /// Point the provider at different endpoints (test servers).
    pub fn with_base_urls(api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, api_base: api_base.into(), token_url: token_url.into() }
    }
}

impl Default for GoogleCalendarProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarProviderApi for GoogleCalendarProvider {
    async fn fetch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query_params: &[(&str, String)],
    ) -> Result<FetchEventsResponse> {
        let url = format!("{}/calendars/{}/events", self.api_base, calendar_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(fetch_status_error(status, &error_text));
        }

        let google_response: GoogleEventsResponse =
            response.json().await.map_err(|e| {
                AqademiqError::Validation(format!("Failed to parse Google response: {e}"))
            })?;

        let events = google_response
            .items
            .into_iter()
            .filter(|item| {
                // Incremental syncs deliver deletions as cancelled stubs
                // without start/end; nothing to reconcile against.
                let cancelled = item.status.as_deref() == Some("cancelled");
                if cancelled {
                    debug!(event_id = %item.id, "skipping cancelled event stub");
                }
                !cancelled
            })
            .map(GoogleEventDto::into_remote_event)
            .collect();

        Ok(FetchEventsResponse {
            events,
            next_page_token: google_response.next_page_token,
            next_sync_token: google_response.next_sync_token,
        })
    }

    async fn upsert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<()> {
        let body = GoogleEventWriteBody::from_patch(None, patch);
        let url = format!("{}/calendars/{}/events/{}", self.api_base, calendar_id, event_id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AqademiqError::RemoteWrite(format!("Google event update failed: {e}")))?;

        // The event may have been purged remotely; recreate it under the
        // same id so the mapping stays valid.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(event_id, "remote event missing, inserting instead");
            return self.insert_event(access_token, calendar_id, event_id, patch).await;
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AqademiqError::RemoteWrite(format!(
                "Google event update failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }

    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AqademiqError::Auth(format!("Token refresh request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AqademiqError::Auth(format!(
                "Token refresh failed ({status}): {error_text}"
            )));
        }

        let refresh_response: GoogleTokenRefreshResponse = response.json().await.map_err(|e| {
            AqademiqError::Auth(format!("Failed to parse token response: {e}"))
        })?;

        Ok(TokenRefreshResponse {
            access_token: refresh_response.access_token,
            expires_in: refresh_response.expires_in,
        })
    }
}

impl GoogleCalendarProvider {
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<()> {
        let body = GoogleEventWriteBody::from_patch(Some(event_id), patch);
        let url = format!("{}/calendars/{}/events", self.api_base, calendar_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AqademiqError::RemoteWrite(format!("Google event insert failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AqademiqError::RemoteWrite(format!(
                "Google event insert failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }
}

fn fetch_status_error(status: StatusCode, error_text: &str) -> AqademiqError {
    match status.as_u16() {
        401 | 403 => AqademiqError::Auth(format!("Google API error ({status}): {error_text}")),
        // 410 GONE marks an expired sync token; the worker clears the
        // cursor and retries with a full window.
        _ => AqademiqError::Network(format!("Google API error ({status}): {error_text}")),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEventDto>,
    #[serde(rename = "nextSyncToken")]
    next_sync_token: Option<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventDto {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    updated: Option<String>,
    #[serde(default)]
    start: GoogleEventDateTime,
    #[serde(default)]
    end: GoogleEventDateTime,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleEventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
    #[serde(rename = "timeZone")]
    time_zone: Option<String>,
}

impl GoogleEventDto {
    fn into_remote_event(self) -> RemoteEvent {
        RemoteEvent {
            id: self.id,
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            description: self.description,
            location: self.location,
            updated: self.updated,
            start: self.start.into_event_time(),
            end: self.end.into_event_time(),
        }
    }
}

impl GoogleEventDateTime {
    fn into_event_time(self) -> EventTime {
        EventTime { date_time: self.date_time, date: self.date, time_zone: self.time_zone }
    }
}

#[derive(Debug, Serialize)]
struct GoogleEventWriteBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: EventTime,
    end: EventTime,
}

impl GoogleEventWriteBody {
    fn from_patch(id: Option<&str>, patch: &EventPatch) -> Self {
        Self {
            id: id.map(str::to_string),
            summary: patch.summary.clone(),
            description: patch.description.clone(),
            location: patch.location.clone(),
            start: EventTime::from_datetime(patch.start),
            end: EventTime::from_datetime(patch.end),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}
