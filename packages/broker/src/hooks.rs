//! Join/leave policy hooks.
//!
//! The broker only stores and fans out. Whatever a host wants to say when a
//! client arrives or leaves ("User 'x' has joined", user counts, ...) lives in
//! a `BrokerHooks` implementation supplied at spawn time.

use async_trait::async_trait;

use crate::domain::{ClientId, Message};

/// View of the broker handed to a hook while it runs.
///
/// `publish` does not touch the ingress queue: messages are queued and fanned
/// out by the event loop once the hook returns, so a hook can publish as much
/// as it likes without waiting on the loop that is running it.
#[derive(Debug, Default)]
pub struct HookContext {
    client_count: usize,
    outbox: Vec<Message>,
}

impl HookContext {
    pub fn new(client_count: usize) -> Self {
        Self {
            client_count,
            outbox: Vec::new(),
        }
    }

    /// Number of clients registered at the moment the hook was invoked
    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// Queue a message for fan-out after the hook returns
    pub fn publish(&mut self, message: Message) {
        self.outbox.push(message);
    }

    /// Messages queued so far, in publish order
    pub fn queued(&self) -> &[Message] {
        &self.outbox
    }

    pub fn into_outbox(self) -> Vec<Message> {
        self.outbox
    }
}

/// Host-supplied policy invoked by the event loop.
///
/// Both methods run on the event loop task, one event at a time. The join hook
/// runs after the client is registered; the leave hook runs after the client is
/// removed, so its announcements never reach the departed client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerHooks: Send + Sync {
    async fn on_client_joined(&self, _client: &ClientId, _ctx: &mut HookContext) {}

    async fn on_client_left(&self, _client: &ClientId, _ctx: &mut HookContext) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl BrokerHooks for NoopHooks {}
