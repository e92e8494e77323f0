//! Calendar poll worker
//!
//! Fetches changed events from the provider (incremental via sync token,
//! full window otherwise), feeds them through the core sync service, and
//! persists the poll cursor afterwards.

use std::sync::Arc;

use aqademiq_domain::{AqademiqError, BatchReport, Result, SyncConfig};
use aqademiq_core::SyncService;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::CalendarClient;
use crate::database::DbManager;
use crate::errors::InfraError;

type QueryParam = (&'static str, String);

const EVENT_FIELDS: &str =
    "items(id,status,summary,description,location,updated,start,end),nextPageToken,nextSyncToken";

/// Persisted poll position for one user.
#[derive(Debug, Clone, Default)]
pub struct SyncCursor {
    pub sync_token: Option<String>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

/// Calendar poll worker
pub struct EventSyncWorker {
    client: Arc<CalendarClient>,
    service: Arc<SyncService>,
    db: Arc<DbManager>,
    settings: SyncConfig,
}

impl EventSyncWorker {
    pub fn new(
        client: Arc<CalendarClient>,
        service: Arc<SyncService>,
        db: Arc<DbManager>,
        settings: SyncConfig,
    ) -> Self {
        Self { client, service, db, settings }
    }

    /// Poll the provider and reconcile all changed events for one user.
    ///
    /// 1. Load the poll cursor
    /// 2. Build request params (initial vs incremental sync)
    /// 3. Fetch events, following pagination
    /// 4. Run the batch through the sync service
    /// 5. Persist the new cursor
    #[instrument(skip(self, cancel), fields(user_id))]
    pub async fn sync_user(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        if !self.settings.enabled {
            debug!(user_id, "sync disabled, skipping poll");
            return Ok(BatchReport::default());
        }

        info!(user_id, "starting calendar poll");

        let cursor = self.load_cursor(user_id).await?;
        let query_params = self.build_query_params(&cursor);

        // Fetch events from provider, following pagination when required
        let mut all_events = Vec::new();
        let mut page_cursor: Option<String> = None;
        let mut latest_sync_token: Option<String> = None;

        loop {
            let mut paged_params = query_params.clone();
            if let Some(ref token) = page_cursor {
                paged_params.push(("pageToken", token.clone()));
            }

            let response = match self.client.fetch_events(user_id, &paged_params).await {
                Ok(resp) => resp,
                Err(e) => {
                    // 410 GONE: the sync token expired; clear it so the next
                    // poll runs a full window.
                    if format!("{e:?}").contains("410") {
                        warn!(user_id, "sync token invalid (410 GONE), clearing for retry");
                        self.clear_sync_token(user_id).await?;
                    }
                    return Err(e);
                }
            };

            latest_sync_token = response.next_sync_token.or(latest_sync_token);
            page_cursor = response.next_page_token;
            all_events.extend(response.events);

            if page_cursor.is_none() {
                break;
            }
        }

        let report = self.service.process_batch(user_id, &all_events, cancel).await?;

        // A cancelled batch left items unprocessed; keep the old cursor so
        // the next poll re-fetches them.
        if report.cancelled {
            info!(user_id, "poll cancelled mid-batch, cursor unchanged");
            return Ok(report);
        }

        self.save_cursor(user_id, latest_sync_token.as_deref()).await?;

        info!(
            user_id,
            fetched = all_events.len(),
            created = report.created,
            updated_local = report.updated_local,
            conflicts = report.conflicts,
            "calendar poll completed"
        );
        Ok(report)
    }

    /// Build query parameters for the events request.
    fn build_query_params(&self, cursor: &SyncCursor) -> Vec<QueryParam> {
        build_query_params(cursor, &self.settings)
    }

    /// Load the poll cursor for a user.
    pub async fn load_cursor(&self, user_id: &str) -> Result<SyncCursor> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> Result<SyncCursor> {
            let conn = db.get_connection()?;
            let row = conn.query_row(
                "SELECT sync_token, last_polled_at FROM sync_cursors WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let sync_token: Option<String> = row.get(0)?;
                    let last_polled: Option<i64> = row.get(1)?;
                    Ok((sync_token, last_polled))
                },
            );
            match row {
                Ok((sync_token, last_polled)) => Ok(SyncCursor {
                    sync_token,
                    last_polled_at: last_polled.and_then(DateTime::from_timestamp_millis),
                }),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(SyncCursor::default()),
                Err(err) => Err(InfraError::from(err).into()),
            }
        })
        .await
        .map_err(join_error)?
    }

    /// Persist the cursor after a successful poll. A `None` token keeps the
    /// previous one (providers only return a sync token on the last page).
    async fn save_cursor(&self, user_id: &str, sync_token: Option<&str>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let sync_token = sync_token.map(str::to_string);

        task::spawn_blocking(move || -> Result<()> {
            let now = Utc::now().timestamp_millis();
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO sync_cursors (user_id, sync_token, last_polled_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     sync_token = COALESCE(excluded.sync_token, sync_cursors.sync_token),
                     last_polled_at = excluded.last_polled_at,
                     updated_at = excluded.updated_at",
                params![user_id, sync_token, now],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(join_error)?
    }

    /// Clear the sync token (triggered by 410 GONE).
    async fn clear_sync_token(&self, user_id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let now = Utc::now().timestamp_millis();
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE sync_cursors SET sync_token = NULL, updated_at = ?1 WHERE user_id = ?2",
                params![now, user_id],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(join_error)??;

        debug!("cleared sync token");
        Ok(())
    }
}

/// Incremental polls ride the provider sync token; an initial poll (or one
/// after a 410 reset) fetches the configured time window instead.
fn build_query_params(cursor: &SyncCursor, settings: &SyncConfig) -> Vec<QueryParam> {
    if let Some(ref sync_token) = cursor.sync_token {
        vec![("syncToken", sync_token.clone()), ("fields", EVENT_FIELDS.to_string())]
    } else {
        let now = Utc::now();
        let time_min = now - chrono::Duration::hours(i64::from(settings.lookback_hours));
        let time_max = now + chrono::Duration::hours(i64::from(settings.lookahead_hours));

        vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("timeZone", "UTC".to_string()),
            ("fields", EVENT_FIELDS.to_string()),
        ]
    }
}

fn join_error(err: task::JoinError) -> AqademiqError {
    if err.is_cancelled() {
        AqademiqError::Internal("blocking task cancelled".into())
    } else {
        AqademiqError::Internal(format!("blocking task failed: {err}"))
    }
}
