//! HTTP API errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kairan_broker::{BrokerError, ValueObjectError};
use thiserror::Error;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] ValueObjectError),

    #[error("Message can not be empty")]
    EmptyMessage,

    #[error("That name is already taken, please pick another name")]
    NameTaken(String),

    #[error("The name '{0}' is reserved")]
    ReservedName(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUsername(_) | Self::EmptyMessage | Self::ReservedName(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NameTaken(_) | Self::Broker(BrokerError::DuplicateClient(_)) => {
                StatusCode::CONFLICT
            }
            Self::Broker(BrokerError::Busy | BrokerError::Closed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
