//! System handlers: root links, health, metrics and the compiled route table.

use crate::admin_api::types::*;
use crate::metrics::collect_metrics;
use crate::registry::RuleRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET / - Root endpoint
pub fn handle_root(base_url: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "_links": {
            "spaces": {"href": format!("{}/space", base_url)},
            "routes": {"href": format!("{}/routes", base_url)},
            "health": {"href": format!("{}/health", base_url)},
            "metrics": {"href": format!("{}/metrics", base_url)}
        }
    });
    json_response(StatusCode::OK, &body)
}

/// GET /health - Health check
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}

/// GET /routes - routes as currently published
///
/// Inside a debounce window this can lag the registry by one rebuild.
pub fn handle_routes(registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let tree = registry.compiler().current();
    let body = serde_json::json!({
        "generation": tree.generation(),
        "routes": tree.routes(),
    });
    json_response(StatusCode::OK, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_root() {
        let resp = handle_root("http://localhost:2525");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_handle_health() {
        let resp = handle_health();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_handle_metrics_content_type() {
        let resp = handle_metrics();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "text/plain; version=0.0.4"
        );
    }
}
