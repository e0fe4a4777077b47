//! Broker configuration.

use std::{fmt, str::FromStr};

use crate::error::ConfigError;

/// Default number of persisted messages kept for replay.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
/// Default number of history entries replayed to a joining client.
pub const DEFAULT_REPLAY_COUNT: usize = 50;
/// Default capacity of the publish ingress queue.
pub const DEFAULT_INGRESS_CAPACITY: usize = 100;
/// Default capacity of each client's delivery buffer.
pub const DEFAULT_CLIENT_BUFFER: usize = 256;
/// Capacity of the control command queue (joins and queries).
pub(crate) const CONTROL_QUEUE_CAPACITY: usize = 32;

/// What the event loop does when a client's delivery buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Drop the message for that client only and log it. The loop never waits.
    #[default]
    DropNewest,
    /// Wait for space in the client's buffer. A stalled client delays everyone.
    Block,
}

/// What `subscribe` does when the identity is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Replace the previous registration; its delivery stream ends.
    #[default]
    Overwrite,
    /// Refuse the new subscription with `BrokerError::DuplicateClient`.
    Reject,
}

impl FromStr for DeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" | "drop-newest" => Ok(Self::DropNewest),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown delivery policy '{other}' (expected 'drop' or 'block')")),
        }
    }
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropNewest => f.write_str("drop"),
            Self::Block => f.write_str("block"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected 'overwrite' or 'reject')"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Broker configuration
///
/// # Example
///
/// ```
/// use kairan_broker::{BrokerConfig, DuplicatePolicy};
///
/// let config = BrokerConfig::default()
///     .with_replay_count(20)
///     .with_duplicate_policy(DuplicatePolicy::Reject);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// History capacity N
    pub history_capacity: usize,
    /// Replay count K
    pub replay_count: usize,
    /// Ingress queue capacity C
    pub ingress_capacity: usize,
    /// Per-client delivery buffer size
    pub client_buffer: usize,
    pub delivery_policy: DeliveryPolicy,
    pub duplicate_policy: DuplicatePolicy,
    /// Whether announcements queued by the join hook also reach the joining client
    pub announce_to_joining_client: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            replay_count: DEFAULT_REPLAY_COUNT,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            delivery_policy: DeliveryPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            announce_to_joining_client: true,
        }
    }
}

impl BrokerConfig {
    pub fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    pub fn with_replay_count(mut self, replay_count: usize) -> Self {
        self.replay_count = replay_count;
        self
    }

    pub fn with_ingress_capacity(mut self, ingress_capacity: usize) -> Self {
        self.ingress_capacity = ingress_capacity;
        self
    }

    pub fn with_client_buffer(mut self, client_buffer: usize) -> Self {
        self.client_buffer = client_buffer;
        self
    }

    pub fn with_delivery_policy(mut self, delivery_policy: DeliveryPolicy) -> Self {
        self.delivery_policy = delivery_policy;
        self
    }

    pub fn with_duplicate_policy(mut self, duplicate_policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = duplicate_policy;
        self
    }

    pub fn with_announce_to_joining_client(mut self, announce: bool) -> Self {
        self.announce_to_joining_client = announce;
        self
    }

    /// Check the configuration for values the broker cannot run with.
    ///
    /// A `replay_count` of zero is valid and disables replay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("history_capacity"));
        }
        if self.ingress_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("ingress_capacity"));
        }
        if self.client_buffer == 0 {
            return Err(ConfigError::ZeroCapacity("client_buffer"));
        }
        if self.replay_count > self.client_buffer {
            return Err(ConfigError::ReplayExceedsBuffer {
                replay_count: self.replay_count,
                client_buffer: self.client_buffer,
            });
        }
        Ok(())
    }
}
