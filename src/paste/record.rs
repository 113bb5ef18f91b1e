//! The stored paste record and its key layout.

use serde::{Deserialize, Serialize};

/// Prefix of every paste key in the store.
pub const KEY_PREFIX: &str = "paste:";

/// Suffix of the view counter key, appended to the record key.
pub const VIEWS_SUFFIX: &str = ":views";

/// One paste as written to the store.
///
/// Serialized as JSON with camelCase fields. `view_count` is informational
/// only: the authoritative count lives under the separate counter key,
/// because whole-record writes are not atomic in every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteRecord {
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<u64>,
    #[serde(default)]
    pub view_count: u64,
}

impl PasteRecord {
    pub fn new(
        content: String,
        created_at: u64,
        ttl_seconds: Option<u64>,
        max_views: Option<u64>,
    ) -> Self {
        Self {
            content,
            created_at,
            ttl_seconds,
            max_views,
            view_count: 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

pub fn paste_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

pub fn views_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}{VIEWS_SUFFIX}")
}
