//! Messaging subsystem: correlation of requests and responses.
//!
//! # Data Flow
//! ```text
//! pipeline registers key
//!     → registry.rs (pending slot per message key)
//! pipeline publishes envelope
//!     → MessagePublisher (broker writes request artifact)
//! broker discovers response artifact
//!     → MessageReader stream (bounded queue)
//!     → consumer.rs (drains stream)
//!     → registry.rs complete() resolves every waiter for the key
//! ```
//!
//! # Design Decisions
//! - No global lock: insert-if-absent on a concurrent map plus a
//!   single-assignment slot per key
//! - Unmatched responses are dropped silently
//! - Transport is a trait pair so the pipeline can be exercised without disk

pub mod consumer;
pub mod registry;
pub mod types;

pub use consumer::MessageConsumer;
pub use registry::MessageRegistry;
pub use types::{MessageEnvelope, MessagePublisher, MessageReader, WaitError};
