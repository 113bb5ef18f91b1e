//! Request time.

use axum::http::HeaderMap;
use chrono::Utc;

/// Carries a millisecond epoch that stands in for "now" in test mode.
pub const TEST_NOW_HEADER: &str = "x-test-now-ms";

pub fn system_now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// The instant expiry is judged at for this request.
///
/// In test mode the header is read as a leading integer: any text
/// after the digits is ignored (`"123abc"` is 123) and negative values clamp
/// to the epoch. Outside test mode, or when the header is missing or has no
/// leading digits, this is the system clock.
pub fn request_now_ms(headers: &HeaderMap, test_mode: bool) -> u64 {
    if test_mode {
        if let Some(ms) = headers
            .get(TEST_NOW_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(leading_millis)
        {
            return ms;
        }
    }
    system_now_ms()
}

fn leading_millis(raw: &str) -> Option<u64> {
    let raw = raw.trim_start();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    if negative {
        return Some(0);
    }
    Some(digits[..end].parse().unwrap_or(u64::MAX))
}
