//! Utilities shared by the Kairan broker and its host server.

pub mod logger;
pub mod time;
