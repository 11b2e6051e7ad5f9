//! Application routes served behind the rate limiter.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::debug;

use super::layer::RateLimitLayer;
use crate::cache::Cache;

/// Cache key under which the greeted name is remembered.
const NAME_KEY: &str = "name";

/// Shared state for the application routes.
#[derive(Clone)]
pub struct AppState {
    /// Names remembered by the greeting route
    names: Arc<Cache<String>>,
    /// How long a remembered name stays cached
    name_ttl: Duration,
}

impl AppState {
    pub fn new(names: Arc<Cache<String>>, name_ttl: Duration) -> Self {
        Self { names, name_ttl }
    }
}

/// Build the router. Everything except `/health` is rate limited.
pub fn router(state: AppState, rate_limit: RateLimitLayer) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/hello/:name", get(greet))
        .route_layer(rate_limit)
        .route("/health", get(health))
        .with_state(state)
}

async fn hello() -> &'static str {
    "Hello World!"
}

/// Greet the cached name if one is live, otherwise remember this one.
async fn greet(State(state): State<AppState>, Path(name): Path<String>) -> String {
    if let Some(stored) = state.names.get(NAME_KEY) {
        debug!(name = %stored, "Greeting cached name");
        return format!("hello {}", stored);
    }

    state.names.set(NAME_KEY, name.clone(), state.name_ttl);
    format!("hello {}", name)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn app(max_requests: u32, name_ttl: Duration) -> Router {
        let names = Arc::new(Cache::new(Duration::from_millis(100)));
        let layer = RateLimitLayer::new(&RateLimitConfig::new(max_requests, Duration::from_secs(1)));
        router(AppState::new(names, name_ttl), layer)
    }

    fn get_from(uri: &str, ip: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn text(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app.clone().oneshot(get_from(uri, "10.0.0.1")).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello() {
        let app = app(5, Duration::from_secs(5));
        assert_eq!(
            text(&app, "/hello").await,
            (StatusCode::OK, "Hello World!".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_greet_remembers_name_until_expiry() {
        let app = app(100, Duration::from_secs(5));

        assert_eq!(text(&app, "/hello/alice").await.1, "hello alice");
        assert_eq!(text(&app, "/hello/bob").await.1, "hello alice");

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(text(&app, "/hello/bob").await.1, "hello bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_is_not_rate_limited() {
        let app = app(1, Duration::from_secs(5));

        assert_eq!(text(&app, "/hello").await.0, StatusCode::OK);
        assert_eq!(text(&app, "/hello").await.0, StatusCode::TOO_MANY_REQUESTS);

        for _ in 0..5 {
            let (status, body) = text(&app, "/health").await;
            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("healthy"));
        }
    }
}
