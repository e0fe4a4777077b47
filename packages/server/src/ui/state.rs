//! Shared state for the HTTP handlers.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use kairan_broker::{Broker, ClientId, SubscriptionId, Unsubscriber};

/// Shared application state
pub struct AppState {
    /// Broker（メッセージ配信）
    pub broker: Broker,
    /// Logout handles of the open chat streams, one per user
    sessions: Mutex<HashMap<ClientId, Unsubscriber>>,
    /// UTC offset used when rendering message times
    pub utc_offset_seconds: i32,
}

impl AppState {
    pub fn new(broker: Broker, utc_offset_seconds: i32) -> Self {
        Self {
            broker,
            sessions: Mutex::new(HashMap::new()),
            utc_offset_seconds,
        }
    }

    /// Remember the logout handle of a newly opened stream.
    ///
    /// A previous handle for the same user belongs to a registration the
    /// broker has already replaced, so it is simply forgotten.
    pub fn track_session(&self, unsubscriber: Unsubscriber) {
        let client_id = unsubscriber.client_id().clone();
        self.sessions().insert(client_id, unsubscriber);
    }

    /// Fire and forget the logout handle of `client_id`; `false` when there was none.
    pub fn end_session(&self, client_id: &ClientId) -> bool {
        let removed = self.sessions().remove(client_id);
        match removed {
            Some(unsubscriber) => unsubscriber.unsubscribe(),
            None => false,
        }
    }

    /// Drop the handle of a stream that has ended.
    ///
    /// Only removes the entry if it still belongs to `subscription`, so a
    /// stream replaced by a newer login does not take the newer handle with it.
    pub fn forget_session(&self, client_id: &ClientId, subscription: SubscriptionId) -> bool {
        let mut sessions = self.sessions();
        match sessions.get(client_id) {
            Some(unsubscriber) if unsubscriber.subscription() == subscription => {
                sessions.remove(client_id);
                true
            }
            _ => false,
        }
    }

    /// Number of streams with a tracked logout handle
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    // Critical sections never panic, a poisoned map is still consistent.
    fn sessions(&self) -> MutexGuard<'_, HashMap<ClientId, Unsubscriber>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use kairan_broker::BrokerConfig;

    use super::*;

    fn client_id(name: &str) -> ClientId {
        ClientId::new(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_forget_session_ignores_replaced_stream() {
        // テスト項目: 上書きされた古いストリームの終了では、新しいログアウトハンドルは消えない
        // given (前提条件):
        let (broker, _task) = Broker::spawn(BrokerConfig::default()).unwrap();
        let state = AppState::new(broker.clone(), 0);
        let first = broker.subscribe(client_id("alice")).await.unwrap();
        state.track_session(first.unsubscriber());
        let second = broker.subscribe(client_id("alice")).await.unwrap();
        state.track_session(second.unsubscriber());

        // when (操作):
        let forgot_stale = state.forget_session(&client_id("alice"), first.id());

        // then (期待する結果):
        assert!(!forgot_stale);
        assert_eq!(state.session_count(), 1);
        assert!(state.forget_session(&client_id("alice"), second.id()));
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn test_end_session_fires_unsubscribe_once() {
        // テスト項目: end_session はハンドルを取り除いて unsubscribe し、2 回目は何もしない
        // given (前提条件):
        let (broker, _task) = Broker::spawn(BrokerConfig::default()).unwrap();
        let state = AppState::new(broker.clone(), 0);
        let subscription = broker.subscribe(client_id("bob")).await.unwrap();
        state.track_session(subscription.unsubscriber());

        // when (操作):
        let first = state.end_session(&client_id("bob"));
        let second = state.end_session(&client_id("bob"));

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert_eq!(state.session_count(), 0);
        assert!(subscription.unsubscriber().is_unsubscribed());
    }
}
