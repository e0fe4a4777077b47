//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use kairan_broker::Broker;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{chat_stream, health_check, list_users, login, logout, post_chat},
    signal::shutdown_signal,
    state::AppState,
};

/// Chat server
///
/// Owns nothing but a broker handle; the broker task itself is spawned (and
/// awaited) by the caller.
///
/// # Example
///
/// ```no_run
/// use kairan_broker::{Broker, BrokerConfig};
/// use kairan_server::{ChatAnnouncements, Server};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (broker, task) = Broker::builder(BrokerConfig::default())
///     .hooks(ChatAnnouncements)
///     .spawn()?;
/// Server::new(broker).run("127.0.0.1".to_string(), 8080).await?;
/// task.await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    broker: Broker,
    utc_offset_seconds: i32,
}

impl Server {
    pub fn new(broker: Broker) -> Self {
        Self {
            broker,
            utc_offset_seconds: 0,
        }
    }

    /// Render message times in the given UTC offset (seconds east of UTC)
    pub fn with_utc_offset_seconds(mut self, utc_offset_seconds: i32) -> Self {
        self.utc_offset_seconds = utc_offset_seconds;
        self
    }

    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState::new(
            self.broker.clone(),
            self.utc_offset_seconds,
        ));

        Router::new()
            // チャット
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/chat", post(post_chat))
            .route("/chat-stream", get(chat_stream))
            // 参照系
            .route("/users", get(list_users))
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or serving fails.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Stream chat from: http://{}/chat-stream?username=<name>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// On shutdown the broker is stopped first: that ends every open chat
    /// stream, which lets the graceful shutdown finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let broker = self.broker;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutting down, closing chat streams");
                broker.shutdown();
            })
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
