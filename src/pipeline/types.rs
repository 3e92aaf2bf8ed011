//! Request/response types, the error taxonomy, and the artifact codec.

use thiserror::Error;

use crate::messaging::{MessageEnvelope, WaitError};

/// An inbound HTTP call reduced to what the broker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    /// Path including the query string.
    pub path: String,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Decoded response artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: String,
}

/// Errors observable by callers of the request pipeline.
///
/// Transport failures are deliberately absent: the broker absorbs them and
/// the caller runs into its own deadline instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The caller stopped waiting before a response arrived.
    #[error("request cancelled before a response arrived")]
    Cancelled,

    /// The response artifact could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A shared operation ended without producing an outcome.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ProxyResult<T> = Result<T, ProxyError>;

impl From<WaitError> for ProxyError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Cancelled => ProxyError::Cancelled,
            WaitError::Closed => ProxyError::Internal(err.to_string()),
        }
    }
}

/// Request artifact content: `<METHOD> | <path>` on a single line.
pub fn encode_request(request: &ProxyRequest) -> Vec<u8> {
    format!("{} | {}\n", request.method, request.path).into_bytes()
}

/// Parse a response artifact: status code on the first line, body after it.
pub fn decode_response(message: &MessageEnvelope) -> ProxyResult<ProxyResponse> {
    let (status_line, body) = match message.payload.iter().position(|b| *b == b'\n') {
        Some(newline) => (&message.payload[..newline], &message.payload[newline + 1..]),
        None => (&message.payload[..], &[][..]),
    };

    let status_line = String::from_utf8_lossy(status_line);
    let status_code = status_line.trim().parse::<u16>().map_err(|_| {
        ProxyError::Decode(format!(
            "response for key {} has invalid status line '{}'",
            message.key,
            status_line.trim()
        ))
    })?;

    Ok(ProxyResponse {
        status_code,
        body: String::from_utf8_lossy(body).into_owned(),
    })
}
