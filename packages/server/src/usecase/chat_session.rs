//! UseCase: Ride に紐づく 2 人用チャット
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChatSessionUseCase の initiate / join / send_message / get_history
//!
//! ### なぜこのテストが必要か
//! - 同じペアで initiate を繰り返してもルームが増えないことを保証
//! - メッセージの配信順が保存順と一致することを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：招待を受けた相手の参加とメッセージ送受信
//! - 異常系：メンバー外からの送信、存在しない Ride・ルーム
//! - エッジケース：相手がオフラインの間に始まった会話への後からの参加

use std::sync::Arc;

use dashmap::DashMap;
use ridelink_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatRoom, ChatRoomId, ChatRoomRepository, ConnectionRegistry, MessageBody, RideId,
    RideStore, RoomId, RoomMembership, ServerEvent, Timestamp, UserId,
};

use super::error::ChatError;

/// チャットのユースケース
pub struct ChatSessionUseCase {
    rides: Arc<dyn RideStore>,
    chat_rooms: Arc<dyn ChatRoomRepository>,
    rooms: Arc<dyn RoomMembership>,
    registry: Arc<dyn ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    /// ルームごとの送信ロック（保存と配信の順序を揃える）
    send_locks: DashMap<ChatRoomId, Arc<Mutex<()>>>,
}

impl ChatSessionUseCase {
    pub fn new(
        rides: Arc<dyn RideStore>,
        chat_rooms: Arc<dyn ChatRoomRepository>,
        rooms: Arc<dyn RoomMembership>,
        registry: Arc<dyn ConnectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rides,
            chat_rooms,
            rooms,
            registry,
            clock,
            send_locks: DashMap::new(),
        }
    }

    /// チャットを開始する
    ///
    /// `(ride, {requester, target})` のルームを探すか作成し、requester を参加させる。
    /// target が接続中かつ未参加なら `chat:invite` を送る。オフラインなら何もしない
    /// （target は後から `join` で参加できる）。
    pub async fn initiate(
        &self,
        requester: &UserId,
        target: &UserId,
        ride_id: &RideId,
    ) -> Result<ChatRoomId, ChatError> {
        if requester == target {
            return Err(ChatError::SelfChat);
        }

        let ride = self
            .rides
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| ChatError::RideNotFound(ride_id.to_string()))?;
        if !ride.involves(requester) {
            return Err(ChatError::NotPartOfRide {
                user: requester.to_string(),
                ride: ride_id.to_string(),
            });
        }

        let now = Timestamp::new(self.clock.now_millis());
        let (room, created) = self
            .chat_rooms
            .find_or_create(ride_id, requester, target, now)
            .await?;
        let room_id = RoomId::chat(&room.id);
        self.rooms.join(requester, &room_id);

        if created {
            tracing::info!(chat_room_id = %room.id, ride_id = %ride_id, "chat room created");
        }

        if self.registry.lookup(target).is_some() && !self.rooms.is_member(target, &room_id) {
            let invite = ServerEvent::ChatInvite {
                chat_room_id: room.id.clone(),
                ride_id: ride_id.clone(),
                from: requester.clone(),
            };
            if let Err(e) = self.registry.push_event(target, &invite) {
                tracing::debug!(target_user = %target, error = %e, "chat invite not delivered");
            }
        }

        Ok(room.id)
    }

    /// ルームの参加者としてチャットに参加する
    pub async fn join(
        &self,
        chat_room_id: &ChatRoomId,
        identity: &UserId,
    ) -> Result<ChatRoom, ChatError> {
        let room = self.load_room(chat_room_id).await?;
        if !room.is_participant(identity) {
            return Err(ChatError::NotAMember(chat_room_id.to_string()));
        }
        self.rooms.join(identity, &RoomId::chat(chat_room_id));
        Ok(room)
    }

    /// メッセージを保存し、ルームのメンバーに `chat:message:new` を配信する
    pub async fn send_message(
        &self,
        chat_room_id: &ChatRoomId,
        sender: &UserId,
        body: MessageBody,
    ) -> Result<ChatMessage, ChatError> {
        // 存在確認を先に行い、未知の ID でロックが増えないようにする
        self.load_room(chat_room_id).await?;
        let room_id = RoomId::chat(chat_room_id);
        if !self.rooms.is_member(sender, &room_id) {
            return Err(ChatError::NotAMember(chat_room_id.to_string()));
        }

        let lock = self
            .send_locks
            .entry(chat_room_id.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let message = ChatMessage::new(
            sender.clone(),
            body,
            Timestamp::new(self.clock.now_millis()),
        );
        self.chat_rooms
            .append_message(chat_room_id, message.clone())
            .await?;

        let event = ServerEvent::ChatMessageNew {
            chat_room_id: chat_room_id.clone(),
            message: message.clone(),
        };
        let delivered = self.rooms.broadcast_event(&room_id, &event)?;
        tracing::debug!(chat_room_id = %chat_room_id, delivered, "chat message broadcast");

        Ok(message)
    }

    /// 保存順のメッセージ履歴
    pub async fn get_history(
        &self,
        chat_room_id: &ChatRoomId,
        requester: &UserId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let room = self.load_room(chat_room_id).await?;
        if !self.rooms.is_member(requester, &RoomId::chat(chat_room_id)) {
            return Err(ChatError::NotAMember(chat_room_id.to_string()));
        }
        Ok(room.messages)
    }

    async fn load_room(&self, chat_room_id: &ChatRoomId) -> Result<ChatRoom, ChatError> {
        self.chat_rooms
            .get(chat_room_id)
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(chat_room_id.to_string()))
    }
}
