use super::ApiError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /:code
///
/// Answers with a 302 to the long URL and counts the click, or 404 when the
/// code is unknown. A click is only counted when a redirect is sent.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let Some(link) = state.store.stats(&code) else {
        tracing::info!(short_code = %code, "Short link not found");
        return ApiError::NotFound.into_response();
    };

    // The store only checks the scheme; a restored snapshot may still hold
    // URLs a header cannot carry.
    let Ok(location) = HeaderValue::from_bytes(link.long_url.as_bytes()) else {
        tracing::error!(short_code = %code, "Stored URL is not a valid Location header");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
    };

    // Links are never removed, so the lookup above still holds.
    if state.store.resolve(&code).is_none() {
        return ApiError::NotFound.into_response();
    }

    tracing::info!(short_code = %code, long_url = %link.long_url, "Redirect");
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
