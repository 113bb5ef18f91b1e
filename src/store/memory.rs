//! In-process paste store on top of [`StorageEngine`].

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use super::{store_lifetime, PasteStore, StoreError};
use crate::paste::record::{paste_key, views_key, PasteRecord};
use crate::storage::{start_expiry_sweeper, ExpirySweeper, StorageEngine};

pub struct MemoryStore {
    engine: Arc<StorageEngine>,
    eviction_grace: Option<Duration>,
    _sweeper: Option<ExpirySweeper>,
}

impl MemoryStore {
    /// A store without a background sweeper; expired keys are only
    /// reclaimed when read.
    pub fn new(eviction_grace: Option<Duration>) -> Self {
        Self {
            engine: Arc::new(StorageEngine::new()),
            eviction_grace,
            _sweeper: None,
        }
    }

    /// A store whose expired keys are also reclaimed by a background task.
    /// Must be called inside a tokio runtime.
    pub fn with_sweeper(eviction_grace: Option<Duration>) -> Self {
        let engine = Arc::new(StorageEngine::new());
        let sweeper = start_expiry_sweeper(Arc::clone(&engine));
        Self {
            engine,
            eviction_grace,
            _sweeper: Some(sweeper),
        }
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }
}

#[async_trait]
impl PasteStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<PasteRecord>, StoreError> {
        match self.engine.get(&Bytes::from(paste_key(id))) {
            Some(raw) => Ok(Some(PasteRecord::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, id: &str, record: &PasteRecord) -> Result<(), StoreError> {
        let lifetime = store_lifetime(record, self.eviction_grace);
        let mut entries = vec![(
            Bytes::from(paste_key(id)),
            Bytes::from(record.to_json()?),
            lifetime,
        )];
        if record.max_views.is_some() {
            entries.push((Bytes::from(views_key(id)), Bytes::from_static(b"0"), lifetime));
        }

        self.engine.set_all(entries);
        Ok(())
    }

    async fn increment_view_count(&self, id: &str) -> Result<i64, StoreError> {
        self.engine
            .incr(&Bytes::from(views_key(id)))
            .map_err(|e| StoreError::Counter(e.to_string()))
    }

    async fn get_view_count(&self, id: &str) -> Result<i64, StoreError> {
        match self.engine.get(&Bytes::from(views_key(id))) {
            Some(raw) => std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| StoreError::Counter("view counter is not an integer".into())),
            None => Ok(0),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
