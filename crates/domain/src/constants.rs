//! Domain constants shared across crates

/// Default calendar identifier used for provider API calls.
pub const PRIMARY_CALENDAR_ID: &str = "primary";

/// Default look-back window for an initial (non-incremental) poll, in hours.
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24 * 7;

/// Default look-ahead window for an initial poll, in hours.
pub const DEFAULT_LOOKAHEAD_HOURS: u32 = 24 * 30;

/// Maximum retry attempts for a remote calendar API call.
pub const REMOTE_MAX_ATTEMPTS: u32 = 3;

/// Fallback duration assigned to an exam when the remote event carries no
/// usable end time.
pub const DEFAULT_EXAM_DURATION_MINUTES: i64 = 60;

/// Length of the calendar slot an assignment due date occupies when pushed
/// to the provider.
pub const ASSIGNMENT_EVENT_DURATION_MINUTES: i64 = 30;
