//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use kairan_broker::{ClientId, Message};
use serde::{Deserialize, Serialize};

use super::parse_username;
use crate::{error::ApiError, ui::state::AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
    pub count: usize,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Check that a name can be used for the chat stream.
///
/// Only names nobody is connected with are accepted.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = parse_username(request.username)?;

    if state.broker.exists(&username).await? {
        return Err(ApiError::NameTaken(username.into_inner()));
    }

    tracing::info!("User '{}' logged in", username);
    Ok(Json(LoginResponse {
        username: username.into_inner(),
    }))
}

/// Post a chat line for broadcast
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<StatusCode, ApiError> {
    let username = parse_username(request.username)?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::EmptyMessage);
    }

    tracing::debug!("Chat from '{}': {}", username, message);
    state
        .broker
        .publish(Message::chat(username.into_inner(), message))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// End the user's chat stream
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<StatusCode, ApiError> {
    let username = ClientId::try_from(request.username)?;

    if state.end_session(&username) {
        tracing::info!("User '{}' logged out", username);
    } else {
        tracing::debug!("Logout for '{}' without an open stream", username);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Users currently connected, sorted by name
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users: Vec<String> = state
        .broker
        .list_clients()
        .await?
        .into_iter()
        .map(ClientId::into_inner)
        .collect();

    Ok(Json(UsersResponse {
        count: users.len(),
        users,
    }))
}
