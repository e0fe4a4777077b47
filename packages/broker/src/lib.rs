//! In-process chat message broker.
//!
//! A single actor (the event loop) owns the client registry and a bounded
//! message history. Producers publish through a bounded ingress queue;
//! every registered client gets its own bounded delivery channel. Joining
//! clients are replayed the most recent persisted messages before live
//! traffic, and join/leave announcements are left to host-supplied hooks.
//!
//! ```no_run
//! use kairan_broker::{Broker, BrokerConfig, ClientId, Message};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (broker, _task) = Broker::spawn(BrokerConfig::default())?;
//!
//! let mut alice = broker.subscribe(ClientId::new("alice".to_string())?).await?;
//! broker.publish(Message::chat("bob", "hi")).await?;
//!
//! let received = alice.recv().await;
//! assert_eq!(received.map(|m| m.body.clone()), Some("hi".to_string()));
//! # Ok(())
//! # }
//! ```

mod broker;
pub mod config;
pub mod domain;
pub mod error;
mod event_loop;
pub mod history;
pub mod hooks;
pub mod registry;
mod subscription;

pub use broker::{Broker, BrokerBuilder};
pub use config::{BrokerConfig, DeliveryPolicy, DuplicatePolicy};
pub use domain::{ClientId, Message, MessageKind, SubscriptionId, ValueObjectError};
pub use error::{BrokerError, ConfigError};
pub use event_loop::BrokerStats;
pub use history::BoundedHistory;
pub use hooks::{BrokerHooks, HookContext, NoopHooks};
pub use subscription::{Subscription, Unsubscriber};
