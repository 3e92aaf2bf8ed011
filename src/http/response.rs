//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a pipeline outcome into an HTTP response
//! - Map pipeline errors to status codes
//!
//! # Design Decisions
//! - The request deadline expiring is reported as 504
//! - Any other cancellation (shutdown) is reported as 499 (client closed request)
//! - Decode and internal failures use RFC 7807 problem details
//! - A backend status outside the HTTP range is a bad gateway

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::{ProxyError, ProxyResponse, ProxyResult};

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Non-standard status for a caller that stopped waiting.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
struct Problem {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'static str,
    status: u16,
    detail: String,
}

fn problem(status: StatusCode, title: &'static str, detail: String) -> Response {
    let body = Problem {
        kind: "about:blank",
        title,
        status: status.as_u16(),
        detail,
    };
    (status, [(header::CONTENT_TYPE, PROBLEM_JSON)], Json(body)).into_response()
}

/// No response arrived before the request deadline.
pub fn gateway_timeout(timeout: Duration) -> Response {
    problem(
        StatusCode::GATEWAY_TIMEOUT,
        "Gateway Timeout",
        format!("no backend response within {timeout:?}"),
    )
}

pub fn proxy_response(result: ProxyResult<ProxyResponse>) -> Response {
    match result {
        Ok(response) => match StatusCode::from_u16(response.status_code) {
            Ok(status) => (status, response.body).into_response(),
            Err(_) => problem(
                StatusCode::BAD_GATEWAY,
                "Bad Gateway",
                format!("backend returned invalid status code {}", response.status_code),
            ),
        },
        Err(ProxyError::Cancelled) => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT)
                .into_response()
        }
        Err(e @ (ProxyError::Decode(_) | ProxyError::Internal(_))) => {
            problem(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", e.to_string())
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub version: String,
    pub status: String,
    pub mode: String,
    pub pending_responses: usize,
    pub in_flight_operations: usize,
}
