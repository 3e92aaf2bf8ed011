//! Request handling and transformation.
//!
//! # Responsibilities
//! - Strip the proxy route prefix and keep path plus query
//! - Read the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - Only method and path are forwarded; headers and body are not part of
//!   the broker request format

use axum::http::{HeaderMap, Method, Uri};

use crate::pipeline::ProxyRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Route prefix under which every request is proxied.
pub const PROXY_PREFIX: &str = "/api/proxy";

/// Build the pipeline request for an incoming HTTP request.
///
/// `/api/proxy/orders?id=7` becomes `/orders?id=7`; the bare prefix becomes `/`.
pub fn proxy_request(method: &Method, uri: &Uri) -> ProxyRequest {
    let rest = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or(uri.path());
    let mut path = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    };
    if let Some(query) = uri.query() {
        path.push('?');
        path.push_str(query);
    }
    ProxyRequest::new(method.as_str(), path)
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}
