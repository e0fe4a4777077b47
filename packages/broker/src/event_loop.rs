//! The broker actor.
//!
//! One task owns the client registry and the history and handles every event
//! in turn: leave, control commands (join and queries) and publishes, plus a
//! shutdown signal. Nothing else reads or writes that state, so there are no
//! locks. Messages queued by hooks go into an outbox that is drained through
//! the normal publish path before the next input is taken.

use std::{collections::VecDeque, sync::Arc};

use kairan_shared::time::Clock;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot, watch,
};

use crate::{
    config::{BrokerConfig, DeliveryPolicy, DuplicatePolicy},
    domain::{ClientId, Message},
    error::BrokerError,
    history::BoundedHistory,
    hooks::{BrokerHooks, HookContext},
    registry::{ClientHandle, ClientRegistry, DeliverySender},
    subscription::LeaveRequest,
};

/// Counters kept by the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Messages fanned out (published and hook-queued)
    pub published: u64,
    /// Messages appended to history
    pub persisted: u64,
    /// Individual deliveries into client buffers, replay included
    pub delivered: u64,
    /// Deliveries dropped because a client's buffer was full
    pub dropped: u64,
    pub history_len: usize,
    pub clients: usize,
}

/// Requests that need an answer from the loop.
pub(crate) enum Command {
    Join {
        client_id: ClientId,
        handle: ClientHandle,
        reply: oneshot::Sender<Result<(), BrokerError>>,
    },
    Exists {
        client_id: ClientId,
        reply: oneshot::Sender<bool>,
    },
    ListClients {
        reply: oneshot::Sender<Vec<ClientId>>,
    },
    History {
        count: usize,
        reply: oneshot::Sender<Vec<Arc<Message>>>,
    },
    Stats {
        reply: oneshot::Sender<BrokerStats>,
    },
}

/// Receiving ends of the loop's inputs.
pub(crate) struct Inputs {
    pub control_rx: mpsc::Receiver<Command>,
    pub leave_rx: mpsc::UnboundedReceiver<LeaveRequest>,
    pub ingress_rx: mpsc::Receiver<Message>,
    pub shutdown_rx: watch::Receiver<bool>,
}

enum Event {
    Leave(LeaveRequest),
    Control(Command),
    Publish(Message),
    Shutdown,
}

enum Delivery {
    Delivered,
    Dropped,
    Closed,
}

pub(crate) struct EventLoop {
    config: BrokerConfig,
    hooks: Arc<dyn BrokerHooks>,
    clock: Arc<dyn Clock>,
    registry: ClientRegistry,
    history: BoundedHistory<Arc<Message>>,
    outbox: VecDeque<(Message, Option<ClientId>)>,
    stats: BrokerStats,
    inputs: Inputs,
}

impl EventLoop {
    pub fn new(
        config: BrokerConfig,
        hooks: Arc<dyn BrokerHooks>,
        clock: Arc<dyn Clock>,
        inputs: Inputs,
    ) -> Self {
        let history = BoundedHistory::new(config.history_capacity);
        Self {
            config,
            hooks,
            clock,
            registry: ClientRegistry::new(),
            history,
            outbox: VecDeque::new(),
            stats: BrokerStats::default(),
            inputs,
        }
    }

    /// Run until shutdown is signalled or every broker handle is gone.
    pub async fn run(mut self) {
        tracing::info!(
            "Broker started (history={}, replay={}, ingress={}, client_buffer={}, delivery={}, duplicates={})",
            self.config.history_capacity,
            self.config.replay_count,
            self.config.ingress_capacity,
            self.config.client_buffer,
            self.config.delivery_policy,
            self.config.duplicate_policy,
        );

        loop {
            match self.next_event().await {
                Event::Leave(request) => self.handle_leave(request).await,
                Event::Control(command) => self.handle_command(command).await,
                Event::Publish(message) => self.publish(message, None).await,
                Event::Shutdown => break,
            }
            self.flush_outbox().await;
        }

        self.shutdown();
    }

    async fn next_event(&mut self) -> Event {
        let inputs = &mut self.inputs;
        tokio::select! {
            biased;
            _ = inputs.shutdown_rx.changed() => Event::Shutdown,
            Some(request) = inputs.leave_rx.recv() => Event::Leave(request),
            Some(command) = inputs.control_rx.recv() => Event::Control(command),
            Some(message) = inputs.ingress_rx.recv() => Event::Publish(message),
            else => Event::Shutdown,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        self.drain_ingress().await;

        match command {
            Command::Join {
                client_id,
                handle,
                reply,
            } => self.handle_join(client_id, handle, reply).await,
            Command::Exists { client_id, reply } => {
                let _ = reply.send(self.registry.exists(&client_id));
            }
            Command::ListClients { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
            Command::History { count, reply } => {
                let _ = reply.send(self.history.replay(count));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    async fn handle_join(
        &mut self,
        client_id: ClientId,
        handle: ClientHandle,
        reply: oneshot::Sender<Result<(), BrokerError>>,
    ) {
        // The subscriber gave up before we got here; registering would leave
        // an entry nobody will ever unsubscribe.
        if reply.is_closed() {
            tracing::debug!("Subscribe for '{}' was cancelled", client_id);
            return;
        }

        if self.registry.exists(&client_id) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Reject => {
                    tracing::warn!(
                        "Client '{}' is already subscribed. Rejecting subscription.",
                        client_id
                    );
                    let _ = reply.send(Err(BrokerError::DuplicateClient(
                        client_id.into_inner(),
                    )));
                    return;
                }
                DuplicatePolicy::Overwrite => {
                    tracing::warn!(
                        "Client '{}' is already subscribed. Replacing the previous subscription.",
                        client_id
                    );
                }
            }
        }

        let sender = handle.sender.clone();
        let subscription = handle.subscription;
        self.registry.register(client_id.clone(), handle);

        if reply.send(Ok(())).is_err() {
            self.registry.unregister(&client_id, subscription);
            tracing::debug!("Subscribe for '{}' was cancelled", client_id);
            return;
        }

        tracing::info!(
            "Client '{}' joined: {} active clients",
            client_id,
            self.registry.len()
        );

        let mut ctx = HookContext::new(self.registry.len());
        self.hooks.on_client_joined(&client_id, &mut ctx).await;

        // Replay goes straight to the new client so nobody else sees it twice.
        let replay = self.history.replay(self.config.replay_count);
        let replayed = replay.len();
        for message in replay {
            self.deliver(&client_id, &sender, message).await;
        }
        if replayed > 0 {
            tracing::debug!("Replayed {} messages to '{}'", replayed, client_id);
        }

        let exclude = if self.config.announce_to_joining_client {
            None
        } else {
            Some(client_id)
        };
        self.outbox.extend(
            ctx.into_outbox()
                .into_iter()
                .map(|message| (message, exclude.clone())),
        );
    }

    async fn handle_leave(&mut self, request: LeaveRequest) {
        self.drain_ingress().await;

        let LeaveRequest {
            client_id,
            subscription,
        } = request;

        if self.registry.unregister(&client_id, subscription).is_none() {
            tracing::debug!(
                "Ignoring leave for '{}': no matching subscription",
                client_id
            );
            return;
        }

        tracing::info!(
            "Client '{}' left: {} active clients",
            client_id,
            self.registry.len()
        );

        let mut ctx = HookContext::new(self.registry.len());
        self.hooks.on_client_left(&client_id, &mut ctx).await;
        self.outbox
            .extend(ctx.into_outbox().into_iter().map(|message| (message, None)));
    }

    /// Publish the messages sitting in the ingress queue right now (not ones that arrive meanwhile).
    ///
    /// Leaves and control commands outrank publishes in `next_event`. Both call
    /// this first, so neither overtakes a publish that had already been accepted.
    async fn drain_ingress(&mut self) {
        let pending = self.inputs.ingress_rx.len();
        for _ in 0..pending {
            match self.inputs.ingress_rx.try_recv() {
                Ok(message) => self.publish(message, None).await,
                Err(_) => break,
            }
        }
    }

    async fn flush_outbox(&mut self) {
        while let Some((message, exclude)) = self.outbox.pop_front() {
            self.publish(message, exclude.as_ref()).await;
        }
    }

    /// Store (if persisted) and fan out to every registered client except `exclude`.
    async fn publish(&mut self, mut message: Message, exclude: Option<&ClientId>) {
        if message.sent_at == 0 {
            message.sent_at = self.clock.now_millis();
        }
        let message = Arc::new(message);

        if message.persist {
            self.history.push(Arc::clone(&message));
            self.stats.persisted += 1;
        }
        self.stats.published += 1;

        let mut recipients = 0usize;
        for (client_id, handle) in self.registry.targets(exclude) {
            let outcome = deliver_to(
                self.config.delivery_policy,
                client_id,
                &handle.sender,
                Arc::clone(&message),
            )
            .await;
            match outcome {
                Delivery::Delivered => {
                    self.stats.delivered += 1;
                    recipients += 1;
                }
                Delivery::Dropped => self.stats.dropped += 1,
                Delivery::Closed => {}
            }
        }

        tracing::debug!(
            "Fanned out message from '{}' to {} clients",
            message.sender,
            recipients
        );
    }

    async fn deliver(&mut self, client_id: &ClientId, sender: &DeliverySender, message: Arc<Message>) {
        match deliver_to(self.config.delivery_policy, client_id, sender, message).await {
            Delivery::Delivered => self.stats.delivered += 1,
            Delivery::Dropped => self.stats.dropped += 1,
            Delivery::Closed => {}
        }
    }

    fn stats(&self) -> BrokerStats {
        BrokerStats {
            history_len: self.history.len(),
            clients: self.registry.len(),
            ..self.stats
        }
    }

    fn shutdown(&mut self) {
        self.inputs.ingress_rx.close();
        self.inputs.control_rx.close();

        let mut discarded = 0usize;
        while self.inputs.ingress_rx.try_recv().is_ok() {
            discarded += 1;
        }
        let disconnected = self.registry.clear();

        tracing::info!(
            "Broker stopped: disconnected {} clients, discarded {} pending messages",
            disconnected,
            discarded
        );
    }
}

async fn deliver_to(
    policy: DeliveryPolicy,
    client_id: &ClientId,
    sender: &DeliverySender,
    message: Arc<Message>,
) -> Delivery {
    match policy {
        DeliveryPolicy::DropNewest => match sender.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Delivery buffer of client '{}' is full, dropping message",
                    client_id
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Client '{}' stopped receiving, skipping", client_id);
                Delivery::Closed
            }
        },
        DeliveryPolicy::Block => match sender.send(message).await {
            Ok(()) => Delivery::Delivered,
            Err(_) => {
                tracing::debug!("Client '{}' stopped receiving, skipping", client_id);
                Delivery::Closed
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{broker::Broker, hooks::MockBrokerHooks, subscription::Subscription};

    fn client(name: &str) -> ClientId {
        ClientId::new(name.to_string()).unwrap()
    }

    async fn next_body(subscription: &mut Subscription) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .ok()
            .flatten()
            .map(|message| message.body.clone())
    }

    fn announcing_hooks(joins: usize, leaves: usize) -> MockBrokerHooks {
        let mut hooks = MockBrokerHooks::new();
        hooks
            .expect_on_client_joined()
            .times(joins)
            .returning(|client, ctx| {
                ctx.publish(Message::system(format!("{} joined", client)));
            });
        // Subscriptions dropped at the end of a test may still send leaves.
        hooks
            .expect_on_client_left()
            .times(leaves..)
            .returning(|client, ctx| {
                ctx.publish(Message::system(format!(
                    "{} left, {} online",
                    client,
                    ctx.client_count()
                )));
            });
        hooks
    }

    #[tokio::test]
    async fn test_join_hook_announcement_reaches_everyone() {
        // テスト項目: 参加フックが 1 回ずつ呼ばれ、アナウンスが参加者本人を含む全員に届く
        // given (前提条件):
        let (broker, _task) = Broker::builder(BrokerConfig::default())
            .hooks(announcing_hooks(2, 0))
            .spawn()
            .unwrap();
        let mut alice = broker.subscribe(client("alice")).await.unwrap();
        assert_eq!(next_body(&mut alice).await.as_deref(), Some("alice joined"));

        // when (操作):
        let mut bob = broker.subscribe(client("bob")).await.unwrap();

        // then (期待する結果):
        assert_eq!(next_body(&mut alice).await.as_deref(), Some("bob joined"));
        assert_eq!(next_body(&mut bob).await.as_deref(), Some("bob joined"));
    }

    #[tokio::test]
    async fn test_join_announcement_skips_joiner_when_disabled() {
        // テスト項目: announce_to_joining_client = false のとき、参加者本人にはアナウンスが届かない
        // given (前提条件):
        let config = BrokerConfig::default().with_announce_to_joining_client(false);
        let (broker, _task) = Broker::builder(config)
            .hooks(announcing_hooks(2, 0))
            .spawn()
            .unwrap();
        let mut alice = broker.subscribe(client("alice")).await.unwrap();

        // when (操作):
        let mut bob = broker.subscribe(client("bob")).await.unwrap();
        broker.publish(Message::chat("carol", "hello")).await.unwrap();

        // then (期待する結果): bob の最初の受信はチャットメッセージ
        assert_eq!(next_body(&mut alice).await.as_deref(), Some("bob joined"));
        assert_eq!(next_body(&mut bob).await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_leave_announcement_never_reaches_departed_client() {
        // テスト項目: 退出アナウンスは残っているクライアントにだけ届き、退出者のストリームは終了する
        // given (前提条件):
        let (broker, _task) = Broker::builder(BrokerConfig::default())
            .hooks(announcing_hooks(2, 1))
            .spawn()
            .unwrap();
        let mut a = broker.subscribe(client("a")).await.unwrap();
        let mut b = broker.subscribe(client("b")).await.unwrap();
        assert_eq!(next_body(&mut a).await.as_deref(), Some("a joined"));
        assert_eq!(next_body(&mut a).await.as_deref(), Some("b joined"));
        assert_eq!(next_body(&mut b).await.as_deref(), Some("b joined"));

        // when (操作):
        assert!(b.unsubscribe());

        // then (期待する結果):
        assert_eq!(
            next_body(&mut a).await.as_deref(),
            Some("b left, 1 online")
        );
        let end = tokio::time::timeout(Duration::from_secs(1), b.recv())
            .await
            .unwrap();
        assert!(end.is_none());
        assert_eq!(broker.list_clients().await.unwrap(), vec![client("a")]);
    }

    #[tokio::test]
    async fn test_leave_announcement_follows_earlier_publish() {
        // テスト項目: 退出前に publish 済みのメッセージは退出アナウンスより先に届く
        // given (前提条件):
        let mut hooks = MockBrokerHooks::new();
        hooks.expect_on_client_joined().returning(|_, _| ());
        hooks.expect_on_client_left().returning(|client, ctx| {
            ctx.publish(Message::system(format!("{} left", client)));
        });
        let (broker, _task) = Broker::builder(BrokerConfig::default())
            .hooks(hooks)
            .spawn()
            .unwrap();
        let mut a = broker.subscribe(client("a")).await.unwrap();
        let b = broker.subscribe(client("b")).await.unwrap();

        // when (操作):
        broker.publish(Message::chat("b", "bye")).await.unwrap();
        assert!(b.unsubscribe());

        // then (期待する結果):
        assert_eq!(next_body(&mut a).await.as_deref(), Some("bye"));
        assert_eq!(next_body(&mut a).await.as_deref(), Some("b left"));
    }

    #[tokio::test]
    async fn test_hook_can_publish_more_than_ingress_capacity() {
        // テスト項目: フックが ingress 容量を超える数のメッセージを publish してもデッドロックしない
        // given (前提条件):
        let config = BrokerConfig::default()
            .with_ingress_capacity(1)
            .with_client_buffer(64);
        let mut hooks = MockBrokerHooks::new();
        hooks.expect_on_client_joined().times(1).returning(|_, ctx| {
            for i in 0..20 {
                ctx.publish(Message::system(format!("notice {}", i)));
            }
        });
        let (broker, _task) = Broker::builder(config).hooks(hooks).spawn().unwrap();

        // when (操作):
        let mut alice = broker.subscribe(client("alice")).await.unwrap();

        // then (期待する結果):
        for i in 0..20 {
            assert_eq!(next_body(&mut alice).await, Some(format!("notice {}", i)));
        }
    }

    #[tokio::test]
    async fn test_hook_messages_are_not_persisted_unless_marked() {
        // テスト項目: フックのシステムメッセージは履歴に残らず、persist 指定のものだけ残る
        // given (前提条件):
        let mut hooks = MockBrokerHooks::new();
        hooks.expect_on_client_joined().times(1).returning(|_, ctx| {
            ctx.publish(Message::system("transient"));
            ctx.publish(Message::system("kept").with_persist(true));
        });
        let (broker, _task) = Broker::builder(BrokerConfig::default())
            .hooks(hooks)
            .spawn()
            .unwrap();

        // when (操作):
        let mut alice = broker.subscribe(client("alice")).await.unwrap();
        assert_eq!(next_body(&mut alice).await.as_deref(), Some("transient"));
        assert_eq!(next_body(&mut alice).await.as_deref(), Some("kept"));

        // then (期待する結果):
        let history = broker.history(10).await.unwrap();
        let bodies: Vec<&str> = history.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["kept"]);
    }

    #[tokio::test]
    async fn test_full_client_buffer_drops_and_counts() {
        // テスト項目: DropNewest ではバッファが満杯のクライアント宛てのメッセージが破棄され、統計に数えられる
        // given (前提条件):
        let config = BrokerConfig::default()
            .with_client_buffer(2)
            .with_replay_count(0);
        let (broker, _task) = Broker::spawn(config).unwrap();
        let _slow = broker.subscribe(client("slow")).await.unwrap();

        // when (操作):
        for i in 0..5 {
            broker.publish(Message::chat("bob", i.to_string())).await.unwrap();
        }

        // then (期待する結果):
        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.published, 5);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.history_len, 5);
    }

    #[tokio::test]
    async fn test_sent_at_is_stamped_by_clock() {
        // テスト項目: sent_at が 0 のメッセージには時計の値が入り、指定済みの値は保持される
        // given (前提条件):
        let (broker, _task) = Broker::builder(BrokerConfig::default())
            .clock(kairan_shared::time::FixedClock::new(42))
            .spawn()
            .unwrap();

        // when (操作):
        broker.publish(Message::chat("bob", "stamped")).await.unwrap();
        broker
            .publish(Message::chat("bob", "kept").with_sent_at(7))
            .await
            .unwrap();

        // then (期待する結果):
        let history = broker.history(2).await.unwrap();
        assert_eq!(history[0].sent_at, 42);
        assert_eq!(history[1].sent_at, 7);
    }
}
