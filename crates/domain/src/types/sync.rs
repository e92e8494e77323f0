//! Synchronization types
//!
//! Wire shape of inbound remote events, the persisted entity↔event mapping,
//! conflict records, and the classifier/resolver vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AqademiqError, Result};
use crate::types::planner::{EntityKind, PlannerEntity};
use crate::utils::content_hash::hash_fields;
use crate::utils::event_time::{parse_all_day_date, parse_event_timestamp};

/// Start or end time of a remote calendar event.
///
/// Timed events carry `dateTime` (RFC 3339); all-day events carry `date`
/// (`YYYY-MM-DD`). `timeZone` is informational; datetimes resolve to UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    /// Build a timed UTC value.
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(value.to_rfc3339()),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }

    /// The raw wire value, whichever variant is present.
    pub fn raw_value(&self) -> String {
        self.date_time.clone().or_else(|| self.date.clone()).unwrap_or_default()
    }

    /// Resolve to a UTC instant. All-day dates resolve to UTC midnight.
    pub fn resolve(&self, field: &str) -> Result<DateTime<Utc>> {
        if let Some(ref dt) = self.date_time {
            parse_event_timestamp(dt, field)
        } else if let Some(ref d) = self.date {
            parse_all_day_date(d, field)
        } else {
            Err(AqademiqError::Validation(format!("Missing {field} time")))
        }
    }
}

/// Remote calendar event as delivered by the provider (poll or webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Provider-controlled modification timestamp (RFC 3339). Optional on
    /// the wire so malformed payloads surface as `Validation`, not as a
    /// deserialization failure aborting a whole page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
}

/// Parsed instants of a validated remote event.
#[derive(Debug, Clone, Copy)]
pub struct EventTimes {
    pub updated: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RemoteEvent {
    /// Validate the payload and parse its timestamps.
    ///
    /// A missing id, `updated`, or `start` makes the event unusable for
    /// classification; a missing end falls back to the start instant.
    pub fn times(&self) -> Result<EventTimes> {
        if self.id.trim().is_empty() {
            return Err(AqademiqError::Validation("Remote event has empty id".into()));
        }
        let updated = match self.updated.as_deref() {
            Some(raw) => parse_event_timestamp(raw, "updated")?,
            None => {
                return Err(AqademiqError::Validation(format!(
                    "Remote event {} has no updated timestamp",
                    self.id
                )))
            }
        };
        let start = self.start.resolve("start")?;
        let end = self.end.resolve("end").unwrap_or(start);
        Ok(EventTimes { updated, start, end })
    }
}

/// Persisted link between one planner entity and one remote calendar event.
///
/// `last_synced_at` is the reconciliation checkpoint: the last instant both
/// sides were known equal. It only advances when an update or resolution
/// makes them equal again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMapping {
    pub id: String,
    pub user_id: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub remote_event_id: String,
    /// Last-seen local entity `updated_at`.
    pub local_event_updated: DateTime<Utc>,
    /// Last-seen remote `updated`.
    pub remote_event_updated: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventMapping {
    /// Create a fresh mapping for a just-materialized entity.
    pub fn new(
        entity: &PlannerEntity,
        remote_event_id: &str,
        remote_event_updated: DateTime<Utc>,
        content_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: entity.user_id().to_string(),
            entity_kind: entity.kind(),
            entity_id: entity.id().to_string(),
            remote_event_id: remote_event_id.to_string(),
            local_event_updated: entity.updated_at(),
            remote_event_updated,
            last_synced_at: now,
            content_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle state of a conflict record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

impl ConflictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => {
                Err(AqademiqError::InvalidInput(format!("unknown conflict status: {other}")))
            }
        }
    }
}

/// Detected divergence: both sides changed independently since the last
/// checkpoint. Kept for audit after resolution, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: String,
    pub mapping_id: String,
    pub user_id: String,
    /// Full planner entity state at detection time.
    pub local_snapshot: serde_json::Value,
    /// Full remote event state at detection time.
    pub remote_snapshot: serde_json::Value,
    pub status: ConflictStatus,
    pub detected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    /// Snapshot both sides of a diverged mapping.
    pub fn detect(
        mapping: &EventMapping,
        entity: &PlannerEntity,
        event: &RemoteEvent,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let local_snapshot = serde_json::to_value(entity)
            .map_err(|e| AqademiqError::Internal(format!("entity snapshot failed: {e}")))?;
        let remote_snapshot = serde_json::to_value(event)
            .map_err(|e| AqademiqError::Internal(format!("event snapshot failed: {e}")))?;
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            mapping_id: mapping.id.clone(),
            user_id: mapping.user_id.clone(),
            local_snapshot,
            remote_snapshot,
            status: ConflictStatus::Pending,
            detected_at: now,
            resolved_at: None,
        })
    }

    /// Rehydrate the local entity snapshot.
    pub fn local_entity(&self) -> Result<PlannerEntity> {
        serde_json::from_value(self.local_snapshot.clone())
            .map_err(|e| AqademiqError::Internal(format!("corrupt local snapshot: {e}")))
    }

    /// Rehydrate the remote event snapshot.
    pub fn remote_event(&self) -> Result<RemoteEvent> {
        serde_json::from_value(self.remote_snapshot.clone())
            .map_err(|e| AqademiqError::Internal(format!("corrupt remote snapshot: {e}")))
    }
}

/// How a pending conflict should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    PreferLocal,
    PreferRemote,
    Merge,
}

/// Caller-supplied merged field values for [`ResolutionStrategy::Merge`].
///
/// `None` keeps the current local value for that field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Outbound event content pushed to the provider on `prefer_local`/`merge`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventPatch {
    /// Content hash over the same fields a poll would hash.
    pub fn content_hash(&self) -> String {
        hash_fields(
            Some(&self.summary),
            self.description.as_deref(),
            self.location.as_deref(),
            &EventTime::from_datetime(self.start).raw_value(),
            &EventTime::from_datetime(self.end).raw_value(),
        )
    }
}

/// Classification outcome for one inbound remote event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// No mapping existed; a local entity was materialized from the event.
    CreatedLocal { entity_kind: EntityKind, entity_id: String },
    /// Only the remote side changed; local entity now equals the event.
    UpdatedLocalFromRemote { entity_kind: EntityKind, entity_id: String },
    /// Only the local side changed; mapping bookkeeping refreshed, the
    /// outbound push belongs to the export pass.
    RemoteRefreshDeferred { entity_kind: EntityKind, entity_id: String },
    /// Both sides diverged; a conflict record awaits manual resolution.
    ConflictDetected { conflict_id: String },
    /// Nothing to do.
    NoOp,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub updated_local: usize,
    pub deferred: usize,
    pub conflicts: usize,
    pub noops: usize,
    /// Malformed payloads skipped per the validation policy.
    pub skipped_invalid: usize,
    /// Items that failed on non-systemic store/remote errors.
    pub failed: usize,
    /// True when the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchReport {
    /// Fold one classification outcome into the counters.
    pub fn record(&mut self, action: &SyncAction) {
        self.processed += 1;
        match action {
            SyncAction::CreatedLocal { .. } => self.created += 1,
            SyncAction::UpdatedLocalFromRemote { .. } => self.updated_local += 1,
            SyncAction::RemoteRefreshDeferred { .. } => self.deferred += 1,
            SyncAction::ConflictDetected { .. } => self.conflicts += 1,
            SyncAction::NoOp => self.noops += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(raw: &str) -> EventTime {
        EventTime { date_time: Some(raw.to_string()), date: None, time_zone: None }
    }

    #[test]
    fn remote_event_times_parse() {
        let event = RemoteEvent {
            id: "evt-1".into(),
            summary: Some("Lecture".into()),
            description: None,
            location: None,
            updated: Some("2025-03-01T12:00:00Z".into()),
            start: timed("2025-03-01T09:00:00Z"),
            end: timed("2025-03-01T10:00:00Z"),
        };

        let times = event.times().expect("valid event");
        assert_eq!(times.updated.to_rfc3339(), "2025-03-01T12:00:00+00:00");
        assert_eq!((times.end - times.start).num_minutes(), 60);
    }

    #[test]
    fn missing_updated_is_a_validation_error() {
        let event = RemoteEvent {
            id: "evt-2".into(),
            summary: None,
            description: None,
            location: None,
            updated: None,
            start: timed("2025-03-01T09:00:00Z"),
            end: EventTime::default(),
        };

        assert!(matches!(event.times(), Err(AqademiqError::Validation(_))));
    }

    #[test]
    fn missing_end_falls_back_to_start() {
        let event = RemoteEvent {
            id: "evt-3".into(),
            summary: None,
            description: None,
            location: None,
            updated: Some("2025-03-01T12:00:00Z".into()),
            start: timed("2025-03-01T09:00:00Z"),
            end: EventTime::default(),
        };

        let times = event.times().expect("valid event");
        assert_eq!(times.start, times.end);
    }

    #[test]
    fn resolution_strategy_uses_snake_case_wire_form() {
        let json = serde_json::to_string(&ResolutionStrategy::PreferLocal).expect("serializes");
        assert_eq!(json, "\"prefer_local\"");
        let parsed: ResolutionStrategy =
            serde_json::from_str("\"prefer_remote\"").expect("parses");
        assert_eq!(parsed, ResolutionStrategy::PreferRemote);
    }

    #[test]
    fn batch_report_counts_actions() {
        let mut report = BatchReport::default();
        report.record(&SyncAction::NoOp);
        report.record(&SyncAction::ConflictDetected { conflict_id: "c1".into() });
        assert_eq!(report.processed, 2);
        assert_eq!(report.noops, 1);
        assert_eq!(report.conflicts, 1);
    }
}
