//! Client registry.
//!
//! Maps each client identity to its private delivery channel. Only the event
//! loop task touches it, so there is no locking.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc;

use crate::domain::{ClientId, Message, SubscriptionId};

/// Sending half of a delivery channel (written only by the event loop)
pub type DeliverySender = mpsc::Sender<Arc<Message>>;

/// One registered client
#[derive(Debug)]
pub struct ClientHandle {
    /// Delivery sender（配信チャンネルの送信側）
    pub sender: DeliverySender,
    /// Identifies this registration
    pub subscription: SubscriptionId,
}

/// Client identity to `ClientHandle`
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing and returning any previous handle for the same id.
    ///
    /// Whether duplicates are allowed at all is decided by the caller.
    pub fn register(&mut self, client_id: ClientId, handle: ClientHandle) -> Option<ClientHandle> {
        self.clients.insert(client_id, handle)
    }

    /// Remove a client (idempotent).
    ///
    /// Does nothing and returns `None` when the id is not registered or when
    /// `subscription` is not the current registration (a leave left over from
    /// an overwritten subscription).
    pub fn unregister(
        &mut self,
        client_id: &ClientId,
        subscription: SubscriptionId,
    ) -> Option<ClientHandle> {
        match self.clients.get(client_id) {
            Some(handle) if handle.subscription == subscription => self.clients.remove(client_id),
            _ => None,
        }
    }

    /// Whether the id is registered
    pub fn exists(&self, client_id: &ClientId) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&ClientHandle> {
        self.clients.get(client_id)
    }

    /// Registered ids, sorted
    pub fn snapshot(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().cloned().collect();

        // Sort by client_id for consistent ordering
        ids.sort();

        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Delivery targets: everyone except `exclude`
    pub fn targets<'a>(
        &'a self,
        exclude: Option<&'a ClientId>,
    ) -> impl Iterator<Item = (&'a ClientId, &'a ClientHandle)> + 'a {
        self.clients
            .iter()
            .filter(move |(client_id, _)| Some(*client_id) != exclude)
    }

    /// Remove every registration (on shutdown).
    ///
    /// Dropping the senders ends every client's stream. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        count
    }
}
