//! Create-request validation.
//!
//! The body is checked field by field from a raw `serde_json::Value` rather
//! than a derived struct, so each problem gets its own client-facing message.

use crate::error::PasteError;
use serde_json::Value;

/// Ceiling on the UTF-8 length of trimmed content.
pub const MAX_CONTENT_BYTES: usize = 512 * 1024;

/// Largest integer a JSON number can carry without precision loss.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub const INVALID_JSON: &str = "Invalid JSON";
pub const INVALID_BODY: &str = "Missing or invalid body";
pub const INVALID_CONTENT: &str = "content is required and must be a non-empty string";
pub const INVALID_TTL: &str = "ttl_seconds must be an integer >= 1";
pub const INVALID_MAX_VIEWS: &str = "max_views must be an integer >= 1";

/// A validated create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaste {
    /// Already trimmed.
    pub content: String,
    pub ttl_seconds: Option<u64>,
    pub max_views: Option<u64>,
}

impl CreatePaste {
    /// Parses and validates a raw request body.
    pub fn from_body(body: &[u8]) -> Result<Self, PasteError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| PasteError::validation(INVALID_JSON))?;
        Self::from_json(&value)
    }

    pub fn from_json(body: &Value) -> Result<Self, PasteError> {
        let fields = body
            .as_object()
            .filter(|fields| fields.contains_key("content"))
            .ok_or_else(|| PasteError::validation(INVALID_BODY))?;

        let content = fields
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PasteError::validation(INVALID_CONTENT))?;

        if content.len() > MAX_CONTENT_BYTES {
            return Err(content_too_large());
        }

        let ttl_seconds = optional_positive(fields.get("ttl_seconds"), INVALID_TTL)?;
        let max_views = optional_positive(fields.get("max_views"), INVALID_MAX_VIEWS)?;

        Ok(Self {
            content: content.to_string(),
            ttl_seconds,
            max_views,
        })
    }
}

/// The error for content over [`MAX_CONTENT_BYTES`], also used when the
/// whole request body is too large to read.
pub fn content_too_large() -> PasteError {
    PasteError::validation(format!(
        "content must be at most {} KB",
        MAX_CONTENT_BYTES / 1024
    ))
}

/// An absent field is fine; anything present must be an integer >= 1.
///
/// Integral floats such as `3.0` are accepted, as JSON does not distinguish
/// them from `3`.
fn optional_positive(value: Option<&Value>, message: &str) -> Result<Option<u64>, PasteError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let n = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && (1.0..=MAX_SAFE_INTEGER).contains(f))
            .map(|f| f as u64)
    });

    match n {
        Some(n) if n >= 1 => Ok(Some(n)),
        _ => Err(PasteError::validation(message)),
    }
}
