//! Stand-in used when no backend is configured.

use async_trait::async_trait;

use super::{PasteStore, StoreError};
use crate::paste::PasteRecord;

/// Reads find nothing, writes fail, health is `false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl PasteStore for UnavailableStore {
    async fn get(&self, _id: &str) -> Result<Option<PasteRecord>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _id: &str, _record: &PasteRecord) -> Result<(), StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn increment_view_count(&self, _id: &str) -> Result<i64, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn get_view_count(&self, _id: &str) -> Result<i64, StoreError> {
        Ok(0)
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_write_fails() {
        let store = UnavailableStore;
        let record = PasteRecord::new("x".into(), 0, None, None);

        assert!(matches!(
            store.put("a", &record).await,
            Err(StoreError::NotConfigured)
        ));
        assert!(store.increment_view_count("a").await.is_err());
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get_view_count("a").await.unwrap(), 0);
    }
}
