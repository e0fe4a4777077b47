//! Chat announcements posted when users come and go.

use async_trait::async_trait;
use kairan_broker::{BrokerHooks, ClientId, HookContext, Message};

/// Sender name used for announcements
pub const SERVER_USERNAME: &str = "💻 Server Message";

/// Announces joins and leaves, followed by the number of users online.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatAnnouncements;

#[async_trait]
impl BrokerHooks for ChatAnnouncements {
    async fn on_client_joined(&self, client: &ClientId, ctx: &mut HookContext) {
        ctx.publish(Message::announcement(
            SERVER_USERNAME,
            format!("User '{}' has joined the chat 💬", client),
        ));
        ctx.publish(users_online(ctx.client_count()));
    }

    async fn on_client_left(&self, client: &ClientId, ctx: &mut HookContext) {
        ctx.publish(Message::announcement(
            SERVER_USERNAME,
            format!("User '{}' has left the chat 👋", client),
        ));
        ctx.publish(users_online(ctx.client_count()));
    }
}

fn users_online(count: usize) -> Message {
    Message::system(format!("There are {} users online", count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_announces_user_and_count() {
        // テスト項目: 参加時に参加アナウンスと現在の人数が順に積まれる
        // given (前提条件):
        let hooks = ChatAnnouncements;
        let mut ctx = HookContext::new(2);

        // when (操作):
        hooks
            .on_client_joined(&ClientId::new("bob".to_string()).unwrap(), &mut ctx)
            .await;

        // then (期待する結果):
        let queued = ctx.queued();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].sender, SERVER_USERNAME);
        assert_eq!(queued[0].body, "User 'bob' has joined the chat 💬");
        assert!(!queued[0].persist);
        assert!(queued[1].is_system());
        assert_eq!(queued[1].body, "There are 2 users online");
    }

    #[tokio::test]
    async fn test_leave_counts_remaining_users() {
        // テスト項目: 退出時の人数は退出者を含まない
        // given (前提条件):
        let hooks = ChatAnnouncements;
        let mut ctx = HookContext::new(1);

        // when (操作):
        hooks
            .on_client_left(&ClientId::new("bob".to_string()).unwrap(), &mut ctx)
            .await;

        // then (期待する結果):
        let bodies: Vec<&str> = ctx.queued().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(
            bodies,
            vec!["User 'bob' has left the chat 👋", "There are 1 users online"]
        );
    }
}
