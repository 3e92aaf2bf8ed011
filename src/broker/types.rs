//! Broker error and outcome types.

use thiserror::Error;

/// Failures that prevent the broker from starting.
///
/// Once running, the broker never returns errors: per-artifact failures are
/// retried, logged and absorbed.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to watch broker directory: {0}")]
    Watch(#[from] notify::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Result of publishing a request artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Duplicate publish of the same key; the existing artifact is kept.
    AlreadyExists,
}

/// Result of one discovery attempt for a response artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope is in the delivery queue.
    Delivered,
    /// The artifact vanished before it could be read.
    Missing,
}
