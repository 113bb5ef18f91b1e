//! HTTP Surface
//!
//! | Method | Path               | Handler                     |
//! |--------|--------------------|-----------------------------|
//! | GET    | `/`                | [`pages::index`]            |
//! | GET    | `/healthz`         | [`handlers::healthz`]       |
//! | POST   | `/api/pastes`      | [`handlers::create_paste`]  |
//! | GET    | `/api/pastes/{id}` | [`handlers::get_paste`]     |
//! | GET    | `/p/{id}`          | [`handlers::view_paste`]    |
//!
//! The JSON read and the HTML page both go through
//! [`PasteService::read`](crate::paste::PasteService::read), so a page view
//! consumes a view exactly like an API read.

pub mod clock;
pub mod error;
pub mod handlers;
pub mod pages;
pub mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

/// Request bodies above this are refused before JSON parsing. Leaves room
/// for escaped content up to [`MAX_CONTENT_BYTES`](crate::paste::MAX_CONTENT_BYTES).
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/healthz", get(handlers::healthz))
        .route("/api/pastes", post(handlers::create_paste))
        .route("/api/pastes/{id}", get(handlers::get_paste))
        .route("/p/{id}", get(handlers::view_paste))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
