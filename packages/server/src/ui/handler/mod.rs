//! Route handlers.

mod http;
mod stream;

pub use http::{health_check, list_users, login, logout, post_chat};
pub use stream::chat_stream;

use kairan_broker::ClientId;

use crate::{error::ApiError, hooks::SERVER_USERNAME};

/// Validate a user-supplied name; the announcement sender's name is not available.
fn parse_username(raw: String) -> Result<ClientId, ApiError> {
    let username = ClientId::try_from(raw)?;
    if username.as_str() == SERVER_USERNAME {
        return Err(ApiError::ReservedName(username.into_inner()));
    }
    Ok(username)
}
