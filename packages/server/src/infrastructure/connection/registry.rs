//! DashMap を使った ConnectionRegistry 実装
//!
//! ## 責務
//!
//! - WebSocket ごとに生成された `UnboundedSender` をユーザー ID で管理
//! - 同一ユーザーの再接続時は新しい接続で置き換える
//!
//! ## 設計ノート
//!
//! 配車オファー・チャット招待・位置配信のすべてがここを経由するため、
//! グローバルロックではなくシャード単位でロックされる `DashMap` を使う。
//! ロックは同期的で、`.await` をまたいで保持しない。

use std::sync::Arc;

use dashmap::DashMap;
use ridelink_shared::time::{Clock, SystemClock};

use crate::domain::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, PusherChannel, Timestamp, UserId,
};

/// インメモリ Connection Registry
pub struct InMemoryConnectionRegistry {
    /// Key: ユーザー ID, Value: 現役の接続
    connections: DashMap<UserId, ConnectionHandle>,
    clock: Arc<dyn Clock>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: DashMap::new(),
            clock,
        }
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn register(&self, identity: UserId, channel: PusherChannel) -> ConnectionHandle {
        let handle = ConnectionHandle {
            connection_id: ConnectionId::generate(),
            connected_at: Timestamp::new(self.clock.now_millis()),
            channel,
        };

        if let Some(previous) = self.connections.insert(identity.clone(), handle.clone()) {
            tracing::info!(
                user_id = %identity,
                previous = %previous.connection_id,
                current = %handle.connection_id,
                "connection replaced"
            );
        } else {
            tracing::debug!(user_id = %identity, connection_id = %handle.connection_id, "connection registered");
        }

        handle
    }

    fn lookup(&self, identity: &UserId) -> Option<PusherChannel> {
        self.connections
            .get(identity)
            .map(|entry| entry.channel.clone())
    }

    fn remove(&self, identity: &UserId) {
        if self.connections.remove(identity).is_some() {
            tracing::debug!(user_id = %identity, "connection removed");
        }
    }

    fn remove_connection(&self, identity: &UserId, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(identity, |_, handle| handle.connection_id == connection_id)
            .is_some();

        if !removed {
            tracing::debug!(
                user_id = %identity,
                connection_id = %connection_id,
                "stale connection not removed"
            );
        }
        removed
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessagePushError;
    use ridelink_shared::time::FixedClock;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - register / lookup / remove の基本操作
    // - 同一ユーザーの再登録で古い接続が到達不能になること
    // - 置き換え済みの古い接続の切断が新しい接続を消さないこと
    //
    // 【なぜこのテストが必要か】
    // - Registry はすべての配信経路が通る中核で、接続の一意性が崩れると
    //   配車オファーが古いソケットへ送られてしまう
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_test_registry() -> InMemoryConnectionRegistry {
        InMemoryConnectionRegistry::with_clock(Arc::new(FixedClock::new(1_700_000_000_000)))
    }

    #[test]
    fn test_register_and_lookup() {
        // テスト項目: 登録した接続を ID で引ける
        // given (前提条件):
        let registry = create_test_registry();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // when (操作):
        let handle = registry.register(user("alice"), tx);

        // then (期待する結果):
        assert_eq!(handle.connected_at.value(), 1_700_000_000_000);
        let channel = registry.lookup(&user("alice")).expect("alice should be connected");
        channel.send("ping".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "ping");
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_lookup_missing_identity_returns_none() {
        // テスト項目: 未接続のユーザーは None（エラーではない）
        // given (前提条件):
        let registry = create_test_registry();

        // when (操作):
        let result = registry.lookup(&user("ghost"));

        // then (期待する結果):
        assert!(result.is_none());
    }

    #[test]
    fn test_register_twice_replaces_previous_connection() {
        // テスト項目: 同じユーザーを 2 回登録すると、2 つ目の接続のみに届く
        // given (前提条件):
        let registry = create_test_registry();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(user("alice"), tx1);

        // when (操作):
        registry.register(user("alice"), tx2);
        registry.push_to(&user("alice"), "offer").unwrap();

        // then (期待する結果):
        assert_eq!(rx2.try_recv().unwrap(), "offer");
        // 古い接続の sender は Registry から破棄されているため、受信側は閉じている
        assert!(matches!(
            rx1.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        // テスト項目: 存在しないユーザーの削除は何もしない（冪等性）
        // given (前提条件):
        let registry = create_test_registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(user("alice"), tx);

        // when (操作):
        registry.remove(&user("alice"));
        registry.remove(&user("alice"));
        registry.remove(&user("nobody"));

        // then (期待する結果):
        assert!(registry.lookup(&user("alice")).is_none());
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_remove_stale_connection_keeps_replacement() {
        // テスト項目: 置き換え済みの古い接続 ID での削除は新しい接続を残す
        // given (前提条件):
        let registry = create_test_registry();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let old = registry.register(user("alice"), tx1);
        let new = registry.register(user("alice"), tx2);

        // when (操作):
        let removed_old = registry.remove_connection(&user("alice"), old.connection_id);

        // then (期待する結果):
        assert!(!removed_old);
        assert!(registry.lookup(&user("alice")).is_some());
        assert!(registry.remove_connection(&user("alice"), new.connection_id));
        assert!(registry.lookup(&user("alice")).is_none());
    }

    #[test]
    fn test_push_to_unknown_client() {
        // テスト項目: 未接続ユーザーへの送信は ClientNotFound
        // given (前提条件):
        let registry = create_test_registry();

        // when (操作):
        let result = registry.push_to(&user("ghost"), "hello");

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MessagePushError::ClientNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_push_to_closed_channel() {
        // テスト項目: 受信側が閉じた接続への送信は PushFailed
        // given (前提条件):
        let registry = create_test_registry();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(user("alice"), tx);
        drop(rx);

        // when (操作):
        let result = registry.push_to(&user("alice"), "hello");

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::PushFailed(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_lookup_remove() {
        // テスト項目: 複数タスクから同時に操作しても整合性が保たれる
        // given (前提条件):
        let registry = Arc::new(create_test_registry());

        // when (操作): 50 ユーザーを並行に登録し、偶数番だけ削除
        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = user(&format!("user-{}", i));
                let (tx, rx) = mpsc::unbounded_channel();
                registry.register(id.clone(), tx);
                assert!(registry.lookup(&id).is_some());
                if i % 2 == 0 {
                    registry.remove(&id);
                }
                rx
            }));
        }
        let mut receivers = Vec::new();
        for handle in handles {
            receivers.push(handle.await.unwrap());
        }

        // then (期待する結果):
        assert_eq!(registry.connection_count(), 25);
        assert!(registry.lookup(&user("user-1")).is_some());
        assert!(registry.lookup(&user("user-2")).is_none());
    }
}
