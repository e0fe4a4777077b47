//! Server-sent event chat stream.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::StreamExt;
use kairan_broker::{ClientId, Message, SubscriptionId};
use kairan_shared::time::format_time_of_day;
use serde::{Deserialize, Serialize};

use super::parse_username;
use crate::{error::ApiError, hooks::SERVER_USERNAME, ui::state::AppState};

/// Query parameters for the chat stream
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub username: String,
    /// Render chat lines as "user says message" instead of JSON
    #[serde(default)]
    pub plain: bool,
}

/// Chat line as sent in a `chat` event
#[derive(Debug, Serialize)]
struct ChatEventDto<'a> {
    username: &'a str,
    message: &'a str,
    time: String,
    is_self: bool,
    is_server: bool,
}

/// Lives as long as the response body and forgets the stream's logout
/// handle when the body is dropped (disconnect, logout, overwrite, shutdown).
struct SessionGuard {
    state: Arc<AppState>,
    client_id: ClientId,
    subscription: SubscriptionId,
}

impl SessionGuard {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.state.forget_session(&self.client_id, self.subscription) {
            tracing::debug!("Chat stream closed for '{}'", self.client_id);
        }
    }
}

/// Subscribe `username` and stream everything the broker delivers.
///
/// Chat lines arrive as `chat` events, system text as `system` events. When
/// the client goes away the response body is dropped, and with it the
/// subscription, which deregisters the user.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = parse_username(query.username)?;
    let subscription = state.broker.subscribe(client_id.clone()).await?;
    state.track_session(subscription.unsubscriber());

    tracing::info!("Chat stream opened for '{}'", client_id);

    let plain = query.plain;
    let utc_offset_seconds = state.utc_offset_seconds;
    let guard = SessionGuard {
        state: Arc::clone(&state),
        client_id,
        subscription: subscription.id(),
    };
    let events = subscription.map(move |message| {
        Ok::<_, Infallible>(render_event(
            &message,
            guard.client_id(),
            plain,
            utc_offset_seconds,
        ))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn render_event(message: &Message, client_id: &ClientId, plain: bool, utc_offset_seconds: i32) -> Event {
    if message.is_system() {
        return Event::default().event("system").data(single_line(&message.body));
    }

    let data = if plain {
        format!("{} says {}", message.sender, message.body)
    } else {
        let dto = ChatEventDto {
            username: &message.sender,
            message: &message.body,
            time: format_time_of_day(message.sent_at, utc_offset_seconds),
            is_self: message.sender == client_id.as_str(),
            is_server: message.sender == SERVER_USERNAME,
        };
        match serde_json::to_string(&dto) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize chat event: {}", e);
                return Event::default().comment("unrenderable message");
            }
        }
    };

    Event::default().event("chat").data(single_line(&data))
}

/// SSE data may not contain carriage returns, and newlines would split the
/// payload into several data lines.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
