//! UseCase: WebSocket 切断処理
//!
//! ユーザー接続のルームメンバーシップは切断時に削除しない。再接続したユーザーは
//! 新しい接続でそのままルーム配信を受け取る。
//!
//! ride tracking 接続は接続ごとに発行される識別子でルームに参加するため、
//! 現役の接続が切断されたら追跡ルームから退出させる。

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRegistry, Principal, RoomId, RoomMembership};

/// 切断のユースケース
pub struct DisconnectUserUseCase {
    /// ConnectionRegistry（接続管理の抽象化）
    registry: Arc<dyn ConnectionRegistry>,
    rooms: Arc<dyn RoomMembership>,
}

impl DisconnectUserUseCase {
    /// 新しい DisconnectUserUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>, rooms: Arc<dyn RoomMembership>) -> Self {
        Self { registry, rooms }
    }

    /// 切断を実行
    ///
    /// # Arguments
    ///
    /// * `principal` - 切断した接続の認証主体
    /// * `connection_id` - 切断した接続の ID
    ///
    /// # Returns
    ///
    /// Registry から削除した場合は `true`。既に新しい接続で置き換えられていた場合は
    /// 新しい接続を残して `false` を返す。
    pub fn execute(&self, principal: &Principal, connection_id: ConnectionId) -> bool {
        let identity = principal.identity();
        let removed = self.registry.remove_connection(identity, connection_id);
        if !removed {
            tracing::debug!(
                user_id = %identity,
                %connection_id,
                "connection already replaced, keeping the newer one"
            );
            return false;
        }

        tracing::info!(user_id = %identity, %connection_id, "connection removed");
        if let Principal::RideTracker { observer, ride_id } = principal {
            self.rooms.leave(observer, &RoomId::ride_tracking(ride_id));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{RideId, UserId},
        infrastructure::connection::{InMemoryConnectionRegistry, InMemoryRoomMembership},
    };
    use tokio::sync::mpsc;

    fn create_usecase() -> (
        DisconnectUserUseCase,
        Arc<InMemoryConnectionRegistry>,
        Arc<InMemoryRoomMembership>,
    ) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let rooms = Arc::new(InMemoryRoomMembership::new(registry.clone()));
        let usecase = DisconnectUserUseCase::new(registry.clone(), rooms.clone());
        (usecase, registry, rooms)
    }

    #[test]
    fn test_disconnect_removes_current_connection() {
        // テスト項目: 現役の接続の切断で Registry から削除される
        // given (前提条件):
        let (usecase, registry, _rooms) = create_usecase();
        let alice = UserId::new("alice".to_string()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = registry.register(alice.clone(), tx);

        // when (操作):
        let removed = usecase.execute(&Principal::User(alice.clone()), handle.connection_id);

        // then (期待する結果):
        assert!(removed);
        assert!(registry.lookup(&alice).is_none());
    }

    #[test]
    fn test_stale_disconnect_keeps_replacement() {
        // テスト項目: 置き換え済みの古い接続の切断は新しい接続を消さない
        // given (前提条件):
        let (usecase, registry, _rooms) = create_usecase();
        let alice = UserId::new("alice".to_string()).unwrap();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        let old = registry.register(alice.clone(), old_tx);
        registry.register(alice.clone(), new_tx);

        // when (操作):
        let removed = usecase.execute(&Principal::User(alice.clone()), old.connection_id);

        // then (期待する結果):
        assert!(!removed);
        assert!(registry.lookup(&alice).is_some());
    }

    #[test]
    fn test_user_disconnect_keeps_room_membership() {
        // テスト項目: ユーザー接続の切断ではルームのメンバーシップが残る
        // given (前提条件):
        let (usecase, registry, rooms) = create_usecase();
        let alice = UserId::new("alice".to_string()).unwrap();
        let room = RoomId::ride_tracking(&RideId::new("ride-1".to_string()).unwrap());
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = registry.register(alice.clone(), tx);
        rooms.join(&alice, &room);

        // when (操作):
        usecase.execute(&Principal::User(alice.clone()), handle.connection_id);

        // then (期待する結果):
        assert!(rooms.is_member(&alice, &room));
    }

    #[test]
    fn test_tracker_connections_do_not_accumulate_in_room() {
        // テスト項目: ride tracking 接続の接続・切断を繰り返しても追跡ルームに識別子が溜まらない
        // given (前提条件):
        let (usecase, registry, rooms) = create_usecase();
        let ride_id = RideId::new("ride-1".to_string()).unwrap();
        let room = RoomId::ride_tracking(&ride_id);

        // when (操作):
        for _ in 0..1000 {
            let principal = Principal::RideTracker {
                observer: UserId::tracking_observer(&ride_id),
                ride_id: ride_id.clone(),
            };
            let (tx, _rx) = mpsc::unbounded_channel();
            let handle = registry.register(principal.identity().clone(), tx);
            rooms.join(principal.identity(), &room);
            assert!(usecase.execute(&principal, handle.connection_id));
        }

        // then (期待する結果):
        assert!(rooms.members(&room).is_empty());
        assert!(!rooms.has_members(&room));
    }

    #[test]
    fn test_stale_tracker_disconnect_stays_in_room() {
        // テスト項目: 置き換え済みの ride tracking 接続の切断では追跡ルームから退出しない
        // given (前提条件):
        let (usecase, registry, rooms) = create_usecase();
        let ride_id = RideId::new("ride-1".to_string()).unwrap();
        let room = RoomId::ride_tracking(&ride_id);
        let principal = Principal::RideTracker {
            observer: UserId::new("tracker-1".to_string()).unwrap(),
            ride_id,
        };
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        let old = registry.register(principal.identity().clone(), old_tx);
        registry.register(principal.identity().clone(), new_tx);
        rooms.join(principal.identity(), &room);

        // when (操作):
        let removed = usecase.execute(&principal, old.connection_id);

        // then (期待する結果):
        assert!(!removed);
        assert!(rooms.is_member(principal.identity(), &room));
    }
}
