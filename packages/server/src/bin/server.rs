//! Kairan chat server.
//!
//! Serves the chat over HTTP with a server-sent event stream per user.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kairan-server
//! cargo run --bin kairan-server -- --host 0.0.0.0 --port 3000 --replay-count 20
//! ```

use clap::Parser;
use kairan_broker::{Broker, BrokerConfig, DeliveryPolicy, DuplicatePolicy, config};
use kairan_server::{ChatAnnouncements, Server};
use kairan_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kairan-server")]
#[command(about = "Real-time chat server backed by an in-process message broker", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Number of chat messages kept for replay
    #[arg(long, default_value_t = config::DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,

    /// Number of messages replayed to a user when they connect
    #[arg(long, default_value_t = config::DEFAULT_REPLAY_COUNT)]
    replay_count: usize,

    /// Capacity of the publish queue
    #[arg(long, default_value_t = config::DEFAULT_INGRESS_CAPACITY)]
    ingress_capacity: usize,

    /// Capacity of each user's delivery buffer
    #[arg(long, default_value_t = config::DEFAULT_CLIENT_BUFFER)]
    client_buffer: usize,

    /// What to do when a user's buffer is full: drop or block
    #[arg(long, default_value_t = DeliveryPolicy::DropNewest)]
    delivery_policy: DeliveryPolicy,

    /// What to do when a name connects twice: overwrite or reject
    #[arg(long, default_value_t = DuplicatePolicy::Overwrite)]
    duplicate_policy: DuplicatePolicy,

    /// Whether a joining user also sees their own join announcement
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    announce_to_joining_client: bool,

    /// UTC offset in hours used to render message times
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    utc_offset_hours: i32,
}

impl Args {
    fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::default()
            .with_history_capacity(self.history_capacity)
            .with_replay_count(self.replay_count)
            .with_ingress_capacity(self.ingress_capacity)
            .with_client_buffer(self.client_buffer)
            .with_delivery_policy(self.delivery_policy)
            .with_duplicate_policy(self.duplicate_policy)
            .with_announce_to_joining_client(self.announce_to_joining_client)
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // 1. Broker
    let (broker, broker_task) = match Broker::builder(args.broker_config())
        .hooks(ChatAnnouncements)
        .spawn()
    {
        Ok(spawned) => spawned,
        Err(e) => {
            tracing::error!("Invalid broker configuration: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Server
    let server = Server::new(broker.clone()).with_utc_offset_seconds(args.utc_offset_hours.saturating_mul(3600));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        broker.shutdown();
        let _ = broker_task.await;
        std::process::exit(1);
    }

    // 3. Wait for the broker to finish closing streams
    broker.shutdown();
    if let Err(e) = broker_task.await {
        tracing::error!("Broker task failed: {}", e);
        std::process::exit(1);
    }
}
