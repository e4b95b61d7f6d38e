use crate::rate_limit::{RateDecision, RateLimiter};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

/// Key used when a request carries no client identity.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Shared middleware state.
#[derive(Clone)]
pub struct MiddlewareState {
    /// Limiter shared by every route.
    pub rate_limiter: Arc<RateLimiter>,
}

/// Client identity for rate limiting: the first `X-Forwarded-For` hop, then
/// `X-User-Id`, then a shared anonymous bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-user-id").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

/// Paths never rate limited.
const EXEMPT_PATHS: &[&str] = &["/health"];

/// Rate limiting middleware: sliding minute, hour and burst windows per
/// client key. Allowed responses carry the remaining allowances.
pub async fn rate_limit_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&headers);
    match state.rate_limiter.check(&key) {
        RateDecision::Limited(window) => {
            let retry_after = window.retry_after().as_secs();
            warn!(client = %key, path = %request.uri().path(), window = ?window, "Rate limited request");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(serde_json::json!({
                    "detail": window.detail(),
                    "retry_after": retry_after,
                })),
            )
                .into_response()
        }
        RateDecision::Allowed {
            remaining_minute,
            remaining_hour,
        } => {
            let limits = state.rate_limiter.limits();
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            for (name, value) in [
                ("x-ratelimit-limit-minute", limits.requests_per_minute),
                ("x-ratelimit-remaining-minute", remaining_minute),
                ("x-ratelimit-limit-hour", limits.requests_per_hour),
                ("x-ratelimit-remaining-hour", remaining_hour),
            ] {
                headers.insert(name, HeaderValue::from(value));
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-user-id", HeaderValue::from_static("alice"));
        assert_eq!(client_key(&headers), "203.0.113.9");
    }

    #[test]
    fn test_client_key_falls_back() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), ANONYMOUS_CLIENT);
        headers.insert("x-user-id", HeaderValue::from_static("alice"));
        assert_eq!(client_key(&headers), "alice");
    }
}
