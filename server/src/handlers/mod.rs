use crate::{error::StoreError, AppState};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod links;
pub mod redirect;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_000_000;

// ── Router ─────────────────────────────────────────────────────────────────

/// Build the application router.
///
/// Service routes start with `_`, which never appears in a generated short
/// code, so they cannot shadow a link.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(links::index).post(links::shorten))
        .route("/_health", get(|| async { StatusCode::OK }))
        .route("/_stats/:code", get(links::stats))
        // Short-link redirect
        .route("/:code", get(redirect::redirect))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

// ── Errors ─────────────────────────────────────────────────────────────────

/// Everything a handler can fail with, mapped onto an HTTP status and a
/// `{"error": "..."}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("short link not found")]
    NotFound,

    /// Wrong content type, malformed JSON, missing fields or an oversized body.
    #[error(transparent)]
    Body(#[from] JsonRejection),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::CounterExhausted) => StatusCode::INSUFFICIENT_STORAGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, store::LinkStore};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state(root_redirect_url: Option<&str>) -> Arc<AppState> {
        let mut vars = vec![
            ("PORT", "8080".to_owned()),
            ("BASE_URL", "http://sho.rt".to_owned()),
        ];
        if let Some(url) = root_redirect_url {
            vars.push(("ROOT_REDIRECT_URL", url.to_owned()));
        }
        let config = AppConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap();

        Arc::new(AppState {
            store: Arc::new(LinkStore::new()),
            config,
        })
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
        router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn shorten_then_follow() {
        let state = test_state(None);

        let body = json!({"longUrl": "http://example.com"}).to_string();

        let response = send(&state, post_json(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"shortUrl": "http://sho.rt/a"}));

        let response = send(&state, post_json(body)).await;
        assert_eq!(json_body(response).await, json!({"shortUrl": "http://sho.rt/a"}));
        assert_eq!(state.store.counter(), 1);

        let response = send(&state, get("/a")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://example.com"
        );
        assert_eq!(state.store.stats("a").unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let state = test_state(None);

        let response = send(&state, get("/zz")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({"error": "short link not found"}));
        assert!(!state.store.is_dirty());
    }

    #[tokio::test]
    async fn invalid_url_is_a_bad_request() {
        let state = test_state(None);

        let response = send(&state, post_json(json!({"longUrl": "https://"}).to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("invalid URL"));
        assert_eq!(state.store.len(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected_without_side_effects() {
        let state = test_state(None);

        let response = send(&state, post_json("{ nope")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, post_json(json!({"url": "http://a"}).to_string())).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(json!({"longUrl": "http://a"}).to_string()))
            .unwrap();
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        assert_eq!(state.store.len(), 0);
        assert!(!state.store.is_dirty());
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let state = test_state(None);
        let long_url = format!("http://example.com/{}", "x".repeat(MAX_BODY_BYTES));

        let response = send(&state, post_json(json!({"longUrl": long_url}).to_string())).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(state.store.len(), 0);
    }

    #[tokio::test]
    async fn stats_reports_clicks_without_counting() {
        let state = test_state(None);
        let code = state.store.shorten("https://example.com").unwrap();
        state.store.resolve(&code);

        let response = send(&state, get(&format!("/_stats/{code}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["shortCode"], "a");
        assert_eq!(body["longUrl"], "https://example.com");
        assert_eq!(body["clicks"], 1);
        assert!(body["createdAt"].as_i64().unwrap() > 0);

        let response = send(&state, get("/_stats/zz")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.store.stats(&code).unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn url_that_cannot_be_a_location_is_rejected() {
        let state = test_state(None);

        for long_url in ["http://a\u{1}b", "http://example.com/\u{7f}", "https://a\nb"] {
            let body = json!({ "longUrl": long_url }).to_string();
            let response = send(&state, post_json(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{long_url:?}");
            assert!(json_body(response).await["error"]
                .as_str()
                .unwrap()
                .contains("invalid URL"));
        }

        assert_eq!(state.store.len(), 0);
        assert_eq!(state.store.counter(), 0);
        assert!(!state.store.is_dirty());
    }

    #[tokio::test]
    async fn non_ascii_url_is_followed() {
        let state = test_state(None);

        let body = json!({ "longUrl": "https://example.com/caf\u{e9}" }).to_string();
        let response = send(&state, post_json(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, get("/a")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(state.store.stats("a").unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn unusable_stored_url_is_not_counted() {
        let state = test_state(None);
        // Inserted directly, as a restored snapshot could.
        let code = state.store.shorten("http://a\u{1}b").unwrap();
        state.store.take_snapshot();

        for _ in 0..3 {
            let response = send(&state, get(&format!("/{code}"))).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        assert_eq!(state.store.stats(&code).unwrap().clicks, 0);
        assert!(!state.store.is_dirty());
    }

    #[tokio::test]
    async fn health_check() {
        let state = test_state(None);
        let response = send(&state, get("/_health")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_shows_usage_or_redirects() {
        let state = test_state(None);
        let response = send(&state, get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let state = test_state(Some("https://example.com/home"));
        let response = send(&state, get("/")).await;
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://example.com/home"
        );
    }
}
