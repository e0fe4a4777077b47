//! Domain layer for the chat broker.
//!
//! Value objects and the message entity that flow through the broker.
//! Nothing here knows about channels or the event loop.

pub mod error;
pub mod message;
pub mod value_object;

pub use error::ValueObjectError;
pub use message::{Message, MessageKind};
pub use value_object::{ClientId, SubscriptionId};
