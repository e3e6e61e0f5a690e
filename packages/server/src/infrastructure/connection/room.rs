//! DashMap を使った RoomMembership 実装
//!
//! ## 責務
//!
//! - ルームごとのメンバー（ユーザー ID）集合の管理
//! - メンバーへの一斉配信（接続の解決は `ConnectionRegistry` に委譲）
//!
//! ## 設計ノート
//!
//! メンバーは接続ではなくユーザー ID で保持する。再接続したユーザーは
//! 新しい接続でそのままルーム配信を受け取れる。切断時の退出は呼び出し側
//! （`DisconnectUserUseCase`）が接続の種類に応じて判断する。空になったルームは削除する。

use std::{collections::BTreeSet, sync::Arc};

use dashmap::DashMap;

use crate::domain::{ConnectionRegistry, RoomId, RoomMembership, UserId};

/// インメモリ Room Membership
pub struct InMemoryRoomMembership {
    rooms: DashMap<RoomId, BTreeSet<UserId>>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl InMemoryRoomMembership {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self {
            rooms: DashMap::new(),
            registry,
        }
    }
}

impl RoomMembership for InMemoryRoomMembership {
    fn join(&self, identity: &UserId, room_id: &RoomId) -> bool {
        let joined = self
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(identity.clone());

        if joined {
            tracing::debug!(user_id = %identity, room_id = %room_id, "joined room");
        }
        joined
    }

    fn leave(&self, identity: &UserId, room_id: &RoomId) -> bool {
        let left = self
            .rooms
            .get_mut(room_id)
            .is_some_and(|mut members| members.remove(identity));
        self.rooms.remove_if(room_id, |_, members| members.is_empty());

        if left {
            tracing::debug!(user_id = %identity, room_id = %room_id, "left room");
        }
        left
    }

    fn is_member(&self, identity: &UserId, room_id: &RoomId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(identity))
    }

    fn members(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn has_members(&self, room_id: &RoomId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| !members.is_empty())
    }

    fn broadcast(&self, room_id: &RoomId, frame: &str) -> usize {
        // シャードのロックを配信中に保持しないよう、先にメンバーを複製する
        let members = self.members(room_id);

        let mut delivered = 0;
        for member in &members {
            let Some(channel) = self.registry.lookup(member) else {
                tracing::trace!(user_id = %member, room_id = %room_id, "member offline, skipping");
                continue;
            };
            if channel.send(frame.to_string()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(user_id = %member, room_id = %room_id, "member channel closed, skipping");
            }
        }

        tracing::debug!(room_id = %room_id, members = members.len(), delivered, "room broadcast");
        delivered
    }
}
