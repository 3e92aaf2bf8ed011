//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Broker file write / read:
//!     → retries.rs (retry with fixed delay up to the configured count)
//!     → exhausted: error logged and absorbed by the broker
//! ```
//!
//! # Design Decisions
//! - Transport failures never reach request handlers; callers time out instead
//! - Every caller-facing wait has a deadline (see `TimeoutConfig`)

pub mod retries;

pub use retries::{retry_with_fixed_delay, RetryPolicy};
