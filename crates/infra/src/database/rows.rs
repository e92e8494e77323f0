//! Shared row-mapping helpers for the SQLite stores.

use aqademiq_domain::{ConflictStatus, EntityKind, EventMapping, SyncConflict};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Timestamps are persisted as unix epoch milliseconds.
pub(crate) fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn millis_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {value} out of range").into(),
        )
    })
}

pub(crate) fn opt_millis_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<i64> = row.get(idx)?;
    value
        .map(|v| {
            DateTime::from_timestamp_millis(v).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Integer,
                    format!("timestamp {v} out of range").into(),
                )
            })
        })
        .transpose()
}

pub(crate) fn entity_kind_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<EntityKind> {
    let raw: String = row.get(idx)?;
    EntityKind::parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

fn conflict_status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ConflictStatus> {
    let raw: String = row.get(idx)?;
    ConflictStatus::parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

/// Column order: id, user_id, entity_kind, entity_id, remote_event_id,
/// local_event_updated, remote_event_updated, last_synced_at, content_hash,
/// created_at, updated_at.
pub(crate) fn map_mapping_row(row: &Row<'_>) -> rusqlite::Result<EventMapping> {
    Ok(EventMapping {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entity_kind: entity_kind_column(row, 2)?,
        entity_id: row.get(3)?,
        remote_event_id: row.get(4)?,
        local_event_updated: millis_column(row, 5)?,
        remote_event_updated: millis_column(row, 6)?,
        last_synced_at: millis_column(row, 7)?,
        content_hash: row.get(8)?,
        created_at: millis_column(row, 9)?,
        updated_at: millis_column(row, 10)?,
    })
}

/// Column order: id, mapping_id, user_id, local_snapshot, remote_snapshot,
/// status, detected_at, resolved_at.
pub(crate) fn map_conflict_row(row: &Row<'_>) -> rusqlite::Result<SyncConflict> {
    Ok(SyncConflict {
        id: row.get(0)?,
        mapping_id: row.get(1)?,
        user_id: row.get(2)?,
        local_snapshot: json_column(row, 3)?,
        remote_snapshot: json_column(row, 4)?,
        status: conflict_status_column(row, 5)?,
        detected_at: millis_column(row, 6)?,
        resolved_at: opt_millis_column(row, 7)?,
    })
}
