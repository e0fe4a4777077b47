//! Publish/subscribe façade.
//!
//! `Broker` is the only thing callers touch. Every method just enqueues onto
//! one of the event loop's channels; presence queries are answered by the loop
//! itself through a oneshot reply, so they always reflect the loop's state at
//! the moment the query is processed.

use std::sync::Arc;

use kairan_shared::time::{Clock, SystemClock};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot, watch,
    },
    task::JoinHandle,
};

use crate::{
    config::{BrokerConfig, CONTROL_QUEUE_CAPACITY},
    domain::{ClientId, Message, SubscriptionId},
    error::{BrokerError, ConfigError},
    event_loop::{BrokerStats, Command, EventLoop, Inputs},
    hooks::{BrokerHooks, NoopHooks},
    registry::ClientHandle,
    subscription::{LeaveRequest, Subscription},
};

struct BrokerInner {
    config: BrokerConfig,
    ingress_tx: mpsc::Sender<Message>,
    control_tx: mpsc::Sender<Command>,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
    shutdown_tx: watch::Sender<bool>,
}

/// Handle to a running broker. Cheap to clone; all clones talk to the same loop.
///
/// The loop stops when `shutdown` is called or when the last handle is dropped.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

/// Configures hooks and clock before spawning a broker.
///
/// # Example
///
/// ```no_run
/// use kairan_broker::{Broker, BrokerConfig, NoopHooks};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (broker, task) = Broker::builder(BrokerConfig::default())
///     .hooks(NoopHooks)
///     .spawn()?;
/// broker.shutdown();
/// task.await?;
/// # Ok(())
/// # }
/// ```
pub struct BrokerBuilder {
    config: BrokerConfig,
    hooks: Arc<dyn BrokerHooks>,
    clock: Arc<dyn Clock>,
}

impl BrokerBuilder {
    pub fn hooks(mut self, hooks: impl BrokerHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate the configuration and start the event loop on the current tokio runtime.
    pub fn spawn(self) -> Result<(Broker, JoinHandle<()>), ConfigError> {
        self.config.validate()?;

        let (ingress_tx, ingress_rx) = mpsc::channel(self.config.ingress_capacity);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (leave_tx, leave_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let event_loop = EventLoop::new(
            self.config.clone(),
            self.hooks,
            self.clock,
            Inputs {
                control_rx,
                leave_rx,
                ingress_rx,
                shutdown_rx,
            },
        );
        let task = tokio::spawn(event_loop.run());

        let broker = Broker {
            inner: Arc::new(BrokerInner {
                config: self.config,
                ingress_tx,
                control_tx,
                leave_tx,
                shutdown_tx,
            }),
        };

        Ok((broker, task))
    }
}

impl Broker {
    pub fn builder(config: BrokerConfig) -> BrokerBuilder {
        BrokerBuilder {
            config,
            hooks: Arc::new(NoopHooks),
            clock: Arc::new(SystemClock),
        }
    }

    /// Spawn a broker without hooks, using the system clock.
    pub fn spawn(config: BrokerConfig) -> Result<(Self, JoinHandle<()>), ConfigError> {
        Self::builder(config).spawn()
    }

    /// Submit a message for fan-out.
    ///
    /// Waits while the ingress queue is full; this is the only place producers
    /// are slowed down.
    pub async fn publish(&self, message: Message) -> Result<(), BrokerError> {
        self.inner
            .ingress_tx
            .send(message)
            .await
            .map_err(|_| BrokerError::Closed)
    }

    /// Submit a message without waiting; `Busy` when the ingress queue is full.
    pub fn try_publish(&self, message: Message) -> Result<(), BrokerError> {
        self.inner
            .ingress_tx
            .try_send(message)
            .map_err(|e| match e {
                TrySendError::Full(_) => BrokerError::Busy,
                TrySendError::Closed(_) => BrokerError::Closed,
            })
    }

    /// Register `client_id` and return its delivery endpoint.
    ///
    /// The subscription first yields up to `replay_count` persisted messages,
    /// oldest first, then live traffic. What happens when `client_id` is
    /// already registered depends on `DuplicatePolicy`.
    pub async fn subscribe(&self, client_id: ClientId) -> Result<Subscription, BrokerError> {
        let (sender, receiver) = mpsc::channel(self.inner.config.client_buffer);
        let id = SubscriptionId::generate();

        // Created before the join is sent so that dropping this future at any
        // point still produces a leave event for a registration that went through.
        let subscription = Subscription::new(
            client_id.clone(),
            id,
            receiver,
            self.inner.leave_tx.clone(),
        );
        let handle = ClientHandle {
            sender,
            subscription: id,
        };

        let result = self
            .request(|reply| Command::Join {
                client_id,
                handle,
                reply,
            })
            .await
            .and_then(|joined| joined);

        match result {
            Ok(()) => Ok(subscription),
            Err(e) => {
                subscription.disarm();
                Err(e)
            }
        }
    }

    /// Whether `client_id` is currently registered.
    pub async fn exists(&self, client_id: &ClientId) -> Result<bool, BrokerError> {
        let client_id = client_id.clone();
        self.request(|reply| Command::Exists { client_id, reply })
            .await
    }

    /// Identities currently registered, sorted.
    pub async fn list_clients(&self) -> Result<Vec<ClientId>, BrokerError> {
        self.request(|reply| Command::ListClients { reply }).await
    }

    pub async fn client_count(&self) -> Result<usize, BrokerError> {
        Ok(self.stats().await?.clients)
    }

    /// The last `min(len, count)` persisted messages, oldest first.
    pub async fn history(&self, count: usize) -> Result<Vec<Arc<Message>>, BrokerError> {
        self.request(|reply| Command::History { count, reply })
            .await
    }

    pub async fn stats(&self) -> Result<BrokerStats, BrokerError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Ask the event loop to stop.
    ///
    /// Pending publishes are discarded, every subscription stream ends and
    /// later calls on any handle return `BrokerError::Closed`.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.control_tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BrokerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .control_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| BrokerError::Closed)?;
        reply_rx.await.map_err(|_| BrokerError::Closed)
    }
}
