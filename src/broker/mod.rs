//! File message broker.
//!
//! # Data Flow
//! ```text
//! publish(envelope)
//!     → write permit (concurrency limit)
//!     → <key>.req created exclusively, retried on failure
//!
//! backend writes <key>.resp
//!     → watcher event / startup scan
//!     → dispatcher (one discovery per path)
//!     → reserve queue slot → read (retried) → delivery queue
//!     → <key>.resp and <key>.req deleted
//!     → read() stream
//!
//! sweep.rs: artifacts older than the TTL are deleted
//! ```
//!
//! # Design Decisions
//! - Per-artifact failures are logged and absorbed, never surfaced
//! - The delivery queue is bounded; discovery waits for capacity
//! - The directory is flat; keys that are not plain file names are rejected

pub mod artifacts;
pub mod file;
pub mod responder;
pub mod sweep;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use file::FileMessageBroker;
pub use responder::Responder;
pub use types::{BrokerError, BrokerResult};
