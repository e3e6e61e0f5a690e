//! InMemory ChatRoomRepository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatRoom, ChatRoomId, ChatRoomRepository, RepositoryError, RideId, Timestamp,
    UserId,
};

/// インメモリ ChatRoomRepository
///
/// `find_or_create` は 1 つのロック内で検索と作成を行うため、
/// 同じペアの同時 initiate でもルームは 1 つしか作られない。
#[derive(Default)]
pub struct InMemoryChatRoomRepository {
    rooms: Mutex<HashMap<ChatRoomId, ChatRoom>>,
}

impl InMemoryChatRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRoomRepository for InMemoryChatRoomRepository {
    async fn find_or_create(
        &self,
        ride_id: &RideId,
        requester: &UserId,
        target: &UserId,
        created_at: Timestamp,
    ) -> Result<(ChatRoom, bool), RepositoryError> {
        let mut rooms = self.rooms.lock().await;

        if let Some(existing) = rooms
            .values()
            .find(|room| &room.ride_id == ride_id && room.has_pair(requester, target))
        {
            return Ok((existing.clone(), false));
        }

        let room = ChatRoom::new(
            ChatRoomId::generate(),
            ride_id.clone(),
            [requester.clone(), target.clone()],
            created_at,
        );
        rooms.insert(room.id.clone(), room.clone());
        Ok((room, true))
    }

    async fn get(&self, chat_room_id: &ChatRoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(chat_room_id).cloned())
    }

    async fn append_message(
        &self,
        chat_room_id: &ChatRoomId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(chat_room_id)
            .ok_or_else(|| RepositoryError::ChatRoomNotFound(chat_room_id.to_string()))?;
        room.append(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageBody;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn ride(id: &str) -> RideId {
        RideId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_room_for_same_pair() {
        // テスト項目: 同じ Ride・同じペアなら順序が逆でも同じルームが返る
        // given (前提条件):
        let repo = InMemoryChatRoomRepository::new();

        // when (操作):
        let (first, created_first) = repo
            .find_or_create(&ride("ride-1"), &user("alice"), &user("bob"), Timestamp::new(0))
            .await
            .unwrap();
        let (second, created_second) = repo
            .find_or_create(&ride("ride-1"), &user("bob"), &user("alice"), Timestamp::new(1))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_find_or_create_separates_rides() {
        // テスト項目: 同じペアでも Ride が違えば別のルームになる
        // given (前提条件):
        let repo = InMemoryChatRoomRepository::new();

        // when (操作):
        let (first, _) = repo
            .find_or_create(&ride("ride-1"), &user("alice"), &user("bob"), Timestamp::new(0))
            .await
            .unwrap();
        let (second, created) = repo
            .find_or_create(&ride("ride-2"), &user("alice"), &user("bob"), Timestamp::new(0))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(created);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_append_message_to_missing_room() {
        // テスト項目: 存在しないルームへの追記は ChatRoomNotFound
        // given (前提条件):
        let repo = InMemoryChatRoomRepository::new();
        let message = ChatMessage::new(
            user("alice"),
            MessageBody::new("hi".to_string()).unwrap(),
            Timestamp::new(0),
        );

        // when (操作):
        let result = repo
            .append_message(&ChatRoomId::new("missing".to_string()).unwrap(), message)
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::ChatRoomNotFound("missing".to_string()))
        );
    }
}
