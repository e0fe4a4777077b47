//! Kairan chat server.
//!
//! Wires the broker to HTTP: login and presence routes, a server-sent event
//! stream per connected user, and the join/leave announcements of the chat.

pub mod error;
pub mod hooks;
pub mod ui;

pub use error::ApiError;
pub use hooks::{ChatAnnouncements, SERVER_USERNAME};
pub use ui::Server;
