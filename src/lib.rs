//! # FlashPaste - Expiring, View-Limited Text Sharing
//!
//! FlashPaste stores a piece of text behind an unguessable link. A paste may
//! expire after a number of seconds, become unavailable after a number of
//! views, or both. Readers that arrive after either limit is reached get the
//! same "not found" as readers of a link that never existed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashPaste                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ axum Router │───>│  Handlers   │───>│ PasteService│                  │
//! │  │  (web)      │    │ JSON / HTML │    │ create/read │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │      StoreHandle (opened on first use)       │    │
//! │                     │  ┌──────────────┐ ┌──────────┐ ┌───────────┐ │    │
//! │                     │  │ MemoryStore  │ │RedisStore│ │Unavailable│ │    │
//! │                     │  │ StorageEngine│ │ RESP over│ │   Store   │ │    │
//! │                     │  │ + sweeper    │ │   TCP    │ │           │ │    │
//! │                     │  └──────────────┘ └──────────┘ └───────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashpaste::config::Config;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = flashpaste::app(&config);
//!
//!     let listener = TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`paste`]: records, expiry/view policy, validation and the service
//! - [`store`]: the storage trait and its backends
//! - [`storage`]: sharded in-memory engine with TTL and a background sweeper
//! - [`protocol`] / [`connection`]: RESP codec and client connection used by
//!   the Redis backend
//! - [`web`]: routes, handlers and pages
//! - [`config`]: flags and environment
//!
//! ## View Counting
//!
//! The view counter lives beside the record under its own key and is only
//! ever changed by an atomic increment. Concurrent readers each see a
//! distinct count, so at most `max_views` of them are shown the content.

pub mod config;
pub mod connection;
pub mod error;
pub mod paste;
pub mod protocol;
pub mod storage;
pub mod store;
pub mod web;

use std::sync::Arc;

pub use error::{PasteError, Result};
pub use paste::{CreatePaste, PasteRecord, PasteService, PasteView};
pub use store::{PasteStore, StoreConfig, StoreError, StoreHandle};
pub use web::AppState;

/// The default port FlashPaste listens on
pub const DEFAULT_PORT: u16 = 3000;

/// The default host FlashPaste binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default extra store lifetime for pastes with a TTL
pub const DEFAULT_EVICTION_GRACE_SECS: u64 = 3600;

/// Version of FlashPaste
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the application router for `config`.
///
/// The store is not contacted until the first request needs it.
pub fn app(config: &config::Config) -> axum::Router {
    let store = Arc::new(StoreHandle::new(config.store.clone(), config.eviction_grace));
    let state = AppState::new(PasteService::new(store))
        .with_test_mode(config.test_mode)
        .with_public_url(config.public_url.clone());
    web::router(state)
}
