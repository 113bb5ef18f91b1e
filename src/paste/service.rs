//! Create and read operations over a [`PasteStore`].

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::policy;
use super::record::PasteRecord;
use super::validate::CreatePaste;
use crate::error::{PasteError, Result};
use crate::store::{PasteStore, StoreHandle};

/// Content and derived fields of a paste a reader is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteView {
    pub content: String,
    /// `None` when the paste has no view limit.
    pub remaining_views: Option<u64>,
    /// ISO-8601 timestamp, `None` when the paste has no TTL.
    pub expires_at: Option<String>,
}

/// The paste operations shared by the JSON API and the HTML page.
#[derive(Clone)]
pub struct PasteService {
    store: Arc<StoreHandle>,
}

impl PasteService {
    pub fn new(store: Arc<StoreHandle>) -> Self {
        Self { store }
    }

    /// Stores a validated paste and returns its new identifier.
    ///
    /// Storage failures surface as [`PasteError::StorageUnavailable`] and are
    /// not retried.
    pub async fn create(&self, input: CreatePaste, now_ms: u64) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let record = PasteRecord::new(input.content, now_ms, input.ttl_seconds, input.max_views);

        let store = self.store.get().await;
        if let Err(e) = store.put(&id, &record).await {
            warn!(backend = store.backend(), error = %e, "Failed to store paste");
            return Err(e.into());
        }

        info!(
            id = %id,
            bytes = record.content.len(),
            ttl_seconds = record.ttl_seconds,
            max_views = record.max_views,
            "Paste created"
        );
        Ok(id)
    }

    /// Resolves a paste for one reader at `now_ms`, consuming a view when the
    /// paste is view-limited.
    ///
    /// Unknown, expired and exhausted pastes all return
    /// [`PasteError::NotFound`]. Store failures are logged and also reported
    /// as not found.
    pub async fn read(&self, id: &str, now_ms: u64) -> Result<PasteView> {
        let store = self.store.get().await;
        match resolve(store.as_ref(), id, now_ms).await {
            Ok(Some(view)) => Ok(view),
            Ok(None) => Err(PasteError::NotFound),
            Err(e) => {
                warn!(id = %id, backend = store.backend(), error = %e, "Read failed, reporting not found");
                Err(PasteError::NotFound)
            }
        }
    }

    /// Liveness of the backing store. Never fails.
    pub async fn health(&self) -> bool {
        self.store.get().await.health_check().await
    }
}

async fn resolve(
    store: &dyn PasteStore,
    id: &str,
    now_ms: u64,
) -> std::result::Result<Option<PasteView>, crate::store::StoreError> {
    let Some(record) = store.get(id).await? else {
        debug!(id = %id, "Paste does not exist");
        return Ok(None);
    };

    if policy::is_expired(&record, now_ms) {
        debug!(id = %id, now_ms, "Paste expired");
        return Ok(None);
    }

    let remaining_views = match record.max_views {
        None => None,
        Some(max_views) => {
            let current = store.get_view_count(id).await?;
            if policy::views_exhausted(max_views, current) {
                debug!(id = %id, views = current, max_views, "Paste view limit reached");
                return Ok(None);
            }

            // The increment stands even when this reader lost the race.
            let counted = store.increment_view_count(id).await?;
            match policy::admit_view(max_views, counted) {
                Some(remaining) => Some(remaining),
                None => {
                    debug!(id = %id, views = counted, max_views, "Lost race for last view");
                    return Ok(None);
                }
            }
        }
    };

    Ok(Some(PasteView {
        expires_at: policy::expires_at(&record).map(policy::format_timestamp),
        content: record.content,
        remaining_views,
    }))
}
