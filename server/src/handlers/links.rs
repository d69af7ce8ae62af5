use super::ApiError;
use crate::{error::StoreError, models::LinkStats, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderValue,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    long_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    short_url: String,
}

const USAGE: &str = "POST / with {\"longUrl\": \"https://...\"} to create a short link.\n";

/// GET /
/// Send visitors to ROOT_REDIRECT_URL when configured, otherwise print usage.
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    match &state.config.root_redirect_url {
        Some(url) => Redirect::to(url).into_response(),
        None => USAGE.into_response(),
    }
}

/// POST /
///
/// Body: `{"longUrl": "https://..."}`. Returns `{"shortUrl": "<base>/<code>"}`.
/// Shortening a known URL returns its existing short link.
pub async fn shorten(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let Json(request) = payload?;

    // The link is only useful if the URL can later be sent as a Location header.
    if HeaderValue::from_bytes(request.long_url.trim().as_bytes()).is_err() {
        tracing::info!(long_url = ?request.long_url, "Rejected: not a valid redirect target");
        return Err(StoreError::InvalidUrl(request.long_url).into());
    }

    let code = state.store.shorten(&request.long_url).map_err(|e| {
        tracing::info!(long_url = %request.long_url, "Rejected: {e}");
        e
    })?;

    let short_url = state.config.short_url(&code);
    tracing::info!(long_url = %request.long_url, short_url = %short_url, "Shortened");

    Ok(Json(ShortenResponse { short_url }))
}

/// GET /_stats/:code
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<LinkStats>, ApiError> {
    state.store.stats(&code).map(Json).ok_or(ApiError::NotFound)
}
