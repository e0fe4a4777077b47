//! Chat message entity.

use serde::{Deserialize, Serialize};

/// Kind of a message.
///
/// `System` messages carry status text (such as user counts) that the
/// transport renders differently from chat lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    System,
}

/// A message published through the broker.
///
/// Immutable once published: the broker hands every recipient the same
/// `Arc<Message>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender identity; empty for pure system text
    pub sender: String,
    /// Message body
    pub body: String,
    pub kind: MessageKind,
    /// Whether the broker keeps this message in its history for replay
    pub persist: bool,
    /// Unix timestamp (milliseconds) at which the message was created
    pub sent_at: i64,
}

impl Message {
    /// A chat line from `sender`, kept in history.
    pub fn chat(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            kind: MessageKind::Chat,
            persist: true,
            sent_at: 0,
        }
    }

    /// A chat-styled announcement (e.g. "User 'x' has joined"), not kept in history.
    pub fn announcement(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            persist: false,
            ..Self::chat(sender, body)
        }
    }

    /// Plain system text with no sender, not kept in history.
    pub fn system(body: impl Into<String>) -> Self {
        Self {
            sender: String::new(),
            body: body.into(),
            kind: MessageKind::System,
            persist: false,
            sent_at: 0,
        }
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_sent_at(mut self, sent_at: i64) -> Self {
        self.sent_at = sent_at;
        self
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_is_persisted() {
        // テスト項目: チャットメッセージはデフォルトで履歴に保存される
        // given (前提条件):

        // when (操作):
        let msg = Message::chat("alice", "hi");

        // then (期待する結果):
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.kind, MessageKind::Chat);
        assert!(msg.persist);
    }

    #[test]
    fn test_system_message_has_empty_sender_and_is_not_persisted() {
        // テスト項目: システムメッセージは送信者なし・履歴保存なし
        // given (前提条件):

        // when (操作):
        let msg = Message::system("There are 3 users online");

        // then (期待する結果):
        assert!(msg.sender.is_empty());
        assert!(msg.is_system());
        assert!(!msg.persist);
    }

    #[test]
    fn test_announcement_is_chat_kind_but_not_persisted() {
        // テスト項目: アナウンスはチャット扱いだが履歴には保存されない
        // given (前提条件):

        // when (操作):
        let msg = Message::announcement("server", "User 'bob' has joined");

        // then (期待する結果):
        assert_eq!(msg.kind, MessageKind::Chat);
        assert!(!msg.persist);
    }

    #[test]
    fn test_with_persist_overrides_flag() {
        // テスト項目: with_persist で保存フラグを上書きできる
        // given (前提条件):
        let msg = Message::chat("alice", "ephemeral");

        // when (操作):
        let msg = msg.with_persist(false);

        // then (期待する結果):
        assert!(!msg.persist);
    }

    #[test]
    fn test_message_serializes_kind_in_lowercase() {
        // テスト項目: kind は小文字の文字列としてシリアライズされる
        // given (前提条件):
        let msg = Message::system("hello").with_sent_at(42);

        // when (操作):
        let json = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(json["kind"], "system");
        assert_eq!(json["sent_at"], 42);
        assert_eq!(json["persist"], false);
    }
}
