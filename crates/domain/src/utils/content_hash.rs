//! Content hashing for change-detection shortcuts
//!
//! A mapping stores a digest of the remote event's user-visible fields. An
//! unchanged digest means a provider `updated` bump carried no field change
//! (attendee responses, colour edits), so classification can skip it.

use sha2::{Digest, Sha256};

use crate::types::sync::RemoteEvent;

/// Compute the content hash for a remote event.
pub fn remote_event_hash(event: &RemoteEvent) -> String {
    hash_fields(
        event.summary.as_deref(),
        event.description.as_deref(),
        event.location.as_deref(),
        &event.start.raw_value(),
        &event.end.raw_value(),
    )
}

/// Hash the salient event fields. Field separators keep adjacent values from
/// colliding (`"ab", "c"` vs `"a", "bc"`).
pub fn hash_fields(
    summary: Option<&str>,
    description: Option<&str>,
    location: Option<&str>,
    start: &str,
    end: &str,
) -> String {
    let mut hasher = Sha256::new();
    for field in [summary.unwrap_or(""), description.unwrap_or(""), location.unwrap_or("")] {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(start.as_bytes());
    hasher.update([0x1f]);
    hasher.update(end.as_bytes());
    hex::encode(hasher.finalize())
}
