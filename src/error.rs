//! Service-level error taxonomy.

use crate::store::StoreError;
use thiserror::Error;

pub type Result<T, E = PasteError> = std::result::Result<T, E>;

/// Everything a paste operation can report to its caller.
#[derive(Debug, Error)]
pub enum PasteError {
    /// Malformed, missing or oversized input. The message is shown to the
    /// client verbatim.
    #[error("{0}")]
    Validation(String),

    /// Unknown, expired and view-exhausted pastes all map here.
    #[error("Paste not found")]
    NotFound,

    /// The backing store could not complete a write.
    #[error("Storage unavailable")]
    StorageUnavailable(#[source] StoreError),
}

impl PasteError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PasteError::Validation(msg.into())
    }
}

impl From<StoreError> for PasteError {
    fn from(err: StoreError) -> Self {
        PasteError::StorageUnavailable(err)
    }
}
