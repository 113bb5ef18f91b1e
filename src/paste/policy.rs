//! Expiry and visibility rules.
//!
//! Pure functions over a [`PasteRecord`] and a caller-supplied "now", so the
//! read path can substitute a fixed clock in test mode.

use super::record::PasteRecord;
use chrono::{DateTime, SecondsFormat, Utc};

/// Absolute expiry instant in ms since the epoch, if the paste has a TTL.
pub fn expiry_ms(record: &PasteRecord) -> Option<u64> {
    record
        .ttl_seconds
        .map(|ttl| record.created_at.saturating_add(ttl.saturating_mul(1000)))
}

/// True once `now_ms` reaches `created_at + ttl_seconds * 1000`.
pub fn is_expired(record: &PasteRecord, now_ms: u64) -> bool {
    expiry_ms(record).is_some_and(|expires| now_ms >= expires)
}

/// The expiry instant as a UTC timestamp.
///
/// Instants past the largest representable date clamp to it.
pub fn expires_at(record: &PasteRecord) -> Option<DateTime<Utc>> {
    expiry_ms(record).map(|ms| {
        i64::try_from(ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    })
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Remaining views according to the record's informational counter.
pub fn remaining_views(record: &PasteRecord) -> Option<u64> {
    record
        .max_views
        .map(|max| max.saturating_sub(record.view_count))
}

/// Whether the record's informational counter has reached the limit.
pub fn is_view_limit_exceeded(record: &PasteRecord) -> bool {
    record
        .max_views
        .is_some_and(|max| record.view_count >= max)
}

/// Fast-reject check on the authoritative counter before incrementing.
pub fn views_exhausted(max_views: u64, current: i64) -> bool {
    u64::try_from(current).is_ok_and(|current| current >= max_views)
}

/// Decides a view from the post-increment counter value.
///
/// Returns the views left after this one, or `None` when this reader came
/// after the limit was reached.
pub fn admit_view(max_views: u64, counted: i64) -> Option<u64> {
    u64::try_from(counted)
        .ok()
        .filter(|&counted| counted <= max_views)
        .map(|counted| max_views - counted)
}
