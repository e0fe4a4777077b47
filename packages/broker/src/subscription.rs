//! Subscriber-side endpoints: the delivery stream and the unsubscribe handle.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use futures_util::stream::Stream;
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::domain::{ClientId, Message, SubscriptionId};

/// Leave event sent to the event loop.
#[derive(Debug, Clone)]
pub(crate) struct LeaveRequest {
    pub client_id: ClientId,
    pub subscription: SubscriptionId,
}

#[derive(Debug)]
struct UnsubscribeState {
    client_id: ClientId,
    subscription: SubscriptionId,
    fired: AtomicBool,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
}

/// Idempotent unsubscribe handle.
///
/// Clones share state: whichever path fires first (explicit logout, or the
/// `Subscription` being dropped when the connection goes away) sends the leave
/// event, every later call is a no-op.
#[derive(Debug, Clone)]
pub struct Unsubscriber {
    state: Arc<UnsubscribeState>,
}

impl Unsubscriber {
    fn new(
        client_id: ClientId,
        subscription: SubscriptionId,
        leave_tx: mpsc::UnboundedSender<LeaveRequest>,
    ) -> Self {
        Self {
            state: Arc::new(UnsubscribeState {
                client_id,
                subscription,
                fired: AtomicBool::new(false),
                leave_tx,
            }),
        }
    }

    /// Deregister the client.
    ///
    /// Returns `true` if this call sent the leave event, `false` if it had
    /// already been sent. Never blocks.
    pub fn unsubscribe(&self) -> bool {
        if self.state.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        let request = LeaveRequest {
            client_id: self.state.client_id.clone(),
            subscription: self.state.subscription,
        };
        if self.state.leave_tx.send(request).is_err() {
            tracing::debug!(
                "Broker already closed while unsubscribing '{}'",
                self.state.client_id
            );
        }
        true
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.state.fired.load(Ordering::Acquire)
    }

    pub fn client_id(&self) -> &ClientId {
        &self.state.client_id
    }

    /// The registration this handle ends
    pub fn subscription(&self) -> SubscriptionId {
        self.state.subscription
    }

    /// Mark as fired without telling the loop (registration never happened).
    pub(crate) fn disarm(&self) {
        self.state.fired.store(true, Ordering::Release);
    }
}

/// A registered client's delivery endpoint.
///
/// Yields the replayed history first, then live messages in publish order.
/// The stream ends once the client is unsubscribed, overwritten by a newer
/// registration of the same identity, or the broker shuts down.
///
/// Dropping a `Subscription` unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Arc<Message>>,
    unsubscriber: Unsubscriber,
}

impl Subscription {
    pub(crate) fn new(
        client_id: ClientId,
        id: SubscriptionId,
        receiver: mpsc::Receiver<Arc<Message>>,
        leave_tx: mpsc::UnboundedSender<LeaveRequest>,
    ) -> Self {
        Self {
            id,
            receiver,
            unsubscriber: Unsubscriber::new(client_id, id, leave_tx),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        self.unsubscriber.client_id()
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next message; `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// A handle that can unsubscribe this client from elsewhere (e.g. a logout route).
    pub fn unsubscriber(&self) -> Unsubscriber {
        self.unsubscriber.clone()
    }

    pub fn unsubscribe(&self) -> bool {
        self.unsubscriber.unsubscribe()
    }

    pub(crate) fn disarm(&self) {
        self.unsubscriber.disarm();
    }
}

impl Stream for Subscription {
    type Item = Arc<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscriber.unsubscribe();
    }
}
