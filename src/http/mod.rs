//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (strip /api/proxy, keep path and query)
//!     → pipeline (broker round trip, bounded by the request timeout)
//!     → response.rs (status mapping, problem details)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{proxy_request, X_REQUEST_ID};
pub use response::{proxy_response, StatusReport};
pub use server::{AppState, HttpServer};
