//! Domain layer error types.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Client ID is empty (or whitespace only)
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Client ID exceeds the maximum length
    #[error("Client ID is too long: {0} characters (max {max})", max = super::value_object::CLIENT_ID_MAX_LEN)]
    ClientIdTooLong(usize),

    /// Client ID contains a control character
    #[error("Client ID contains a control character")]
    InvalidClientIdCharacter,
}
