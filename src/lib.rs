//! Broker proxy library.
//!
//! HTTP requests are turned into request artifacts in a shared directory and
//! answered by whichever backend writes the matching response artifact.
//!
//! ```text
//!  HTTP ──▶ http ──▶ pipeline ──▶ messaging::registry (wait on key)
//!                       │
//!                       └──▶ broker: <key>.req ──▶ backend
//!                                                      │
//!  HTTP ◀── http ◀── pipeline ◀── consumer ◀── broker: <key>.resp
//! ```

pub mod broker;
pub mod config;
pub mod http;
pub mod keys;
pub mod lifecycle;
pub mod messaging;
pub mod observability;
pub mod pipeline;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
