//! Error types for the chat broker.

use thiserror::Error;

/// Errors returned by the broker façade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The event loop has shut down
    #[error("Broker is closed")]
    Closed,

    /// The ingress queue is full (only from non-blocking publish)
    #[error("Broker ingress queue is full")]
    Busy,

    /// The identity is already registered and duplicates are rejected
    #[error("Client '{0}' is already subscribed")]
    DuplicateClient(String),
}

/// Errors raised by `BrokerConfig::validate`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A capacity setting is zero
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    /// A replay would overflow a freshly created delivery buffer
    #[error("replay_count ({replay_count}) must not exceed client_buffer ({client_buffer})")]
    ReplayExceedsBuffer {
        replay_count: usize,
        client_buffer: usize,
    },
}
