//! Key derivation strategies.
//!
//! A request maps to two keys:
//! - the *message key* names the request/response artifact pair;
//! - the *coalesce key* groups requests whose responses are interchangeable.

use uuid::Uuid;

use crate::pipeline::ProxyRequest;

pub trait MessageKeyProvider: Send + Sync {
    fn message_key(&self, request: &ProxyRequest) -> String;
}

pub trait CoalesceKeyProvider: Send + Sync {
    fn coalesce_key(&self, request: &ProxyRequest) -> String;
}

/// Name-based UUID (SHA-1) over method and path, rendered as 32 hex digits.
///
/// Deterministic, so retries of the same request reuse the same artifact
/// names, and always safe to use as a file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedMessageKey;

impl MessageKeyProvider for HashedMessageKey {
    fn message_key(&self, request: &ProxyRequest) -> String {
        let name = format!("{}{}", request.method, request.path);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
            .simple()
            .to_string()
    }
}

/// `method|path`, lower-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseCoalesceKey;

impl CoalesceKeyProvider for LowercaseCoalesceKey {
    fn coalesce_key(&self, request: &ProxyRequest) -> String {
        format!("{}|{}", request.method, request.path).to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key_is_stable_hex() {
        let request = ProxyRequest::new("GET", "/users?id=1");
        let key = HashedMessageKey.message_key(&request);

        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, HashedMessageKey.message_key(&request));
        assert_ne!(key, HashedMessageKey.message_key(&ProxyRequest::new("POST", "/users?id=1")));
    }

    #[test]
    fn test_coalesce_key_ignores_case() {
        let upper = ProxyRequest::new("GET", "/Users");
        let lower = ProxyRequest::new("get", "/users");

        assert_eq!(LowercaseCoalesceKey.coalesce_key(&upper), "get|/users");
        assert_eq!(
            LowercaseCoalesceKey.coalesce_key(&upper),
            LowercaseCoalesceKey.coalesce_key(&lower)
        );
    }
}
