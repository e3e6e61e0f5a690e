//! サーバーからクライアントへ送るイベント
//!
//! WebSocket 上では `type` フィールドでタグ付けされた JSON として送信される。

use serde::{Deserialize, Serialize};

use super::{
    entity::{ChatMessage, Ride},
    error::MessagePushError,
    value_object::{ChatRoomId, Coordinate, RideClass, RideId, RideRequestId, Timestamp, UserId},
};

/// サーバー発のイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// 候補ドライバーへの配車オファー
    #[serde(rename = "ride:offer")]
    RideOffer {
        request_id: RideRequestId,
        requester_id: UserId,
        pickup: Coordinate,
        ride_class: RideClass,
        distance_m: f64,
        /// 降車地点が指定されたリクエストのみ
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fare_estimate: Option<u64>,
        expires_in_ms: u64,
    },

    /// 応答がないままオファーの期限が切れた
    #[serde(rename = "ride:offer:expired")]
    RideOfferExpired { request_id: RideRequestId },

    /// マッチング成立（ドライバーと乗客の双方に送る）
    #[serde(rename = "ride:matched")]
    RideMatched { ride: Ride },

    #[serde(rename = "ride:cancelled")]
    RideCancelled {
        ride_id: RideId,
        request_id: RideRequestId,
    },

    /// ドライバーが乗車地点に到着した
    #[serde(rename = "rider:arrived")]
    RiderArrived { ride_id: RideId, driver_id: UserId },

    #[serde(rename = "chat:invite")]
    ChatInvite {
        chat_room_id: ChatRoomId,
        ride_id: RideId,
        from: UserId,
    },

    #[serde(rename = "chat:message:new")]
    ChatMessageNew {
        chat_room_id: ChatRoomId,
        message: ChatMessage,
    },

    #[serde(rename = "ride:location_update")]
    RideLocationUpdate {
        ride_id: RideId,
        driver_id: UserId,
        coordinates: Coordinate,
        recorded_at: Timestamp,
    },

    /// 通話の着信（発信者の peer id を渡す）
    #[serde(rename = "call:incoming")]
    CallIncoming { caller: UserId, peer_id: String },

    /// 応答がないまま着信が打ち切られた
    #[serde(rename = "call:timeout")]
    CallTimeout { caller: UserId, message: String },
}

impl ServerEvent {
    /// 送信用の JSON フレームに変換
    pub fn to_frame(&self) -> Result<String, MessagePushError> {
        serde_json::to_string(self).map_err(|e| MessagePushError::Serialization(e.to_string()))
    }
}
