//! Calendar provider implementations

pub mod google;
mod traits;

pub use google::GoogleCalendarProvider;
pub use traits::{create_provider, CalendarProviderApi, FetchEventsResponse, TokenRefreshResponse};
