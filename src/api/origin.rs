//! Same-origin guard
//!
//! Rejects browser requests whose `Origin` names a different host than the
//! one the request was sent to. Requests without an `Origin` header (native
//! clients, curl) pass through.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;

const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Middleware enforcing same-origin requests
pub async fn origin_guard(request: Request, next: Next) -> Result<Response, ApiError> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        let host = request_host(&request);

        if host.as_deref() != Some(origin_host(origin)) {
            tracing::warn!(
                origin = %origin,
                host = ?host,
                path = %request.uri().path(),
                "Cross-origin request blocked"
            );
            return Err(ApiError::Forbidden);
        }
    }

    Ok(next.run(request).await)
}

/// Host the client addressed, preferring the reverse proxy's view
fn request_host(request: &Request) -> Option<String> {
    header_str(request.headers(), X_FORWARDED_HOST)
        .or_else(|| header_str(request.headers(), header::HOST.as_str()))
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// `http://localhost:8088/` → `localhost:8088`
pub fn origin_host(origin: &str) -> &str {
    let host = match origin.find("://") {
        Some(idx) => &origin[idx + 3..],
        None => origin,
    };
    host.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::util::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(origin_guard))
    }

    async fn status(request: axum::http::Request<Body>) -> StatusCode {
        app().oneshot(request).await.unwrap().status()
    }

    #[test]
    fn test_origin_host() {
        assert_eq!(origin_host("http://localhost:8088"), "localhost:8088");
        assert_eq!(origin_host("https://example.com/"), "example.com");
        assert_eq!(origin_host("example.com"), "example.com");
    }

    #[tokio::test]
    async fn test_no_origin_passes() {
        let request = axum::http::Request::builder()
            .uri("/guarded")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_same_origin_passes() {
        let request = axum::http::Request::builder()
            .uri("/guarded")
            .header("host", "localhost:8088")
            .header("origin", "http://localhost:8088")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cross_origin_blocked() {
        let request = axum::http::Request::builder()
            .uri("/guarded")
            .header("host", "localhost:8088")
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_forwarded_host_preferred() {
        let request = axum::http::Request::builder()
            .uri("/guarded")
            .header("host", "127.0.0.1:8088")
            .header("x-forwarded-host", "app.example.com")
            .header("origin", "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::OK);
    }
}
