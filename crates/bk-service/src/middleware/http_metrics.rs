//! HTTP metrics middleware.
//!
//! Records every response, including framework-level rejections that never
//! reach a handler (unknown routes, wrong method, unreadable JSON bodies).

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records method, normalized path, status and duration.
///
/// Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_500() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "Error")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/success", get(handler_200))
            .route("/error", get(handler_500))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_for(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_responses_through() {
        assert_eq!(status_for("/success").await, StatusCode::OK);
        assert_eq!(status_for("/error").await, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for("/nonexistent").await, StatusCode::NOT_FOUND);
    }
}
