//! Request handlers.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use super::clock::{request_now_ms, system_now_ms};
use super::pages;
use super::state::AppState;
use crate::error::PasteError;
use crate::paste::validate::{content_too_large, INVALID_BODY};
use crate::paste::{CreatePaste, PasteView};

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PasteResponse {
    pub content: String,
    pub remaining_views: Option<u64>,
    pub expires_at: Option<String>,
}

impl From<PasteView> for PasteResponse {
    fn from(view: PasteView) -> Self {
        Self {
            content: view.content,
            remaining_views: view.remaining_views,
            expires_at: view.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// `GET /healthz`. Always 200, `ok` reflects the store.
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: state.service.health().await,
    })
}

/// `POST /api/pastes`
///
/// The body is taken raw so that malformed JSON and a missing content type
/// both get the same 400 as any other validation failure. A body over the
/// router's limit is reported as oversized content.
pub async fn create_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), PasteError> {
    let body = body.map_err(body_rejection)?;
    let input = CreatePaste::from_body(&body)?;
    let id = state.service.create(input, system_now_ms()).await?;
    let url = paste_url(&state, &headers, &id);

    Ok((StatusCode::CREATED, Json(CreatedResponse { id, url })))
}

fn body_rejection(rejection: BytesRejection) -> PasteError {
    debug!(error = %rejection, "Create body rejected");
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        content_too_large()
    } else {
        PasteError::validation(INVALID_BODY)
    }
}

/// `GET /api/pastes/{id}`
pub async fn get_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PasteResponse>, PasteError> {
    let now_ms = request_now_ms(&headers, state.test_mode);
    let view = state.service.read(&id, now_ms).await?;
    Ok(Json(view.into()))
}

/// `GET /p/{id}`
pub async fn view_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let now_ms = request_now_ms(&headers, state.test_mode);
    match state.service.read(&id, now_ms).await {
        Ok(view) => Html(pages::paste_page(&view)).into_response(),
        Err(e) => {
            debug!(id = %id, error = %e, "Paste page unavailable");
            (StatusCode::NOT_FOUND, Html(pages::not_found_page())).into_response()
        }
    }
}

/// Absolute link to the paste page.
///
/// Uses the configured public URL, else the request's `Host` with
/// `X-Forwarded-Proto` (default `https`).
pub fn paste_url(state: &AppState, headers: &HeaderMap, id: &str) -> String {
    if let Some(base) = &state.public_url {
        return format!("{}/p/{}", base, id);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("https");

    format!("{}://{}/p/{}", proto, host, id)
}
