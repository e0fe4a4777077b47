//! Value objects for the chat broker.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum length of a client identity, in characters.
pub const CLIENT_ID_MAX_LEN: usize = 64;

/// Client identity (the chat user name).
///
/// Unique among the clients currently registered with a broker. The broker
/// itself does not enforce uniqueness on its own; see `DuplicatePolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Create a new ClientId with validation.
    ///
    /// Surrounding whitespace is trimmed before validation.
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::EmptyClientId);
        }

        let len = trimmed.chars().count();
        if len > CLIENT_ID_MAX_LEN {
            return Err(ValueObjectError::ClientIdTooLong(len));
        }

        if trimmed.chars().any(char::is_control) {
            return Err(ValueObjectError::InvalidClientIdCharacter);
        }

        if trimmed.len() == id.len() {
            Ok(Self(id))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ClientId {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl From<ClientId> for String {
    fn from(value: ClientId) -> Self {
        value.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one registration of a client.
///
/// A new value is minted for every successful subscribe, so a stale
/// unsubscribe left over from an overwritten registration never removes
/// the newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new random subscription id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_valid() {
        // テスト項目: 有効な文字列から ClientId を生成できる
        // given (前提条件):
        let input = "alice".to_string();

        // when (操作):
        let result = ClientId::new(input);

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(result.unwrap().as_str(), "alice");
    }

    #[test]
    fn test_client_id_trims_whitespace() {
        // テスト項目: 前後の空白は取り除かれる
        // given (前提条件):
        let input = "  bob \t".to_string();

        // when (操作):
        let result = ClientId::new(input);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "bob");
    }

    #[test]
    fn test_client_id_empty_is_rejected() {
        // テスト項目: 空文字列・空白のみは拒否される
        // given (前提条件):
        let empty = String::new();
        let blank = "   ".to_string();

        // when (操作):
        let empty_result = ClientId::new(empty);
        let blank_result = ClientId::new(blank);

        // then (期待する結果):
        assert_eq!(empty_result, Err(ValueObjectError::EmptyClientId));
        assert_eq!(blank_result, Err(ValueObjectError::EmptyClientId));
    }

    #[test]
    fn test_client_id_too_long_is_rejected() {
        // テスト項目: 最大長を超える ClientId は拒否される
        // given (前提条件):
        let input = "a".repeat(CLIENT_ID_MAX_LEN + 1);

        // when (操作):
        let result = ClientId::new(input);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ValueObjectError::ClientIdTooLong(CLIENT_ID_MAX_LEN + 1))
        );
    }

    #[test]
    fn test_client_id_max_length_counts_characters() {
        // テスト項目: 長さはバイト数ではなく文字数で数える
        // given (前提条件):
        let input = "ç".repeat(CLIENT_ID_MAX_LEN);

        // when (操作):
        let result = ClientId::new(input);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_client_id_control_character_is_rejected() {
        // テスト項目: 制御文字を含む ClientId は拒否される
        // given (前提条件):
        let input = "ali\nce".to_string();

        // when (操作):
        let result = ClientId::new(input);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::InvalidClientIdCharacter));
    }

    #[test]
    fn test_client_id_deserialize_validates() {
        // テスト項目: デシリアライズ時にもバリデーションが行われる
        // given (前提条件):
        let valid = "\"carol\"";
        let invalid = "\"\"";

        // when (操作):
        let valid_result = serde_json::from_str::<ClientId>(valid);
        let invalid_result = serde_json::from_str::<ClientId>(invalid);

        // then (期待する結果):
        assert_eq!(valid_result.unwrap().as_str(), "carol");
        assert!(invalid_result.is_err());
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        // テスト項目: SubscriptionId は生成ごとに異なる値になる
        // given (前提条件):

        // when (操作):
        let first = SubscriptionId::generate();
        let second = SubscriptionId::generate();

        // then (期待する結果):
        assert_ne!(first, second);
    }
}
