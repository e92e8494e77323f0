//! Calendar provider integration
//!
//! HTTP client, provider implementations, and the poll worker that feeds
//! inbound events into the sync service.

pub mod client;
pub mod providers;
pub mod sync;

pub use client::{calculate_backoff, CalendarClient};
pub use providers::{CalendarProviderApi, FetchEventsResponse, TokenRefreshResponse};
pub use sync::{EventSyncWorker, SyncCursor};
