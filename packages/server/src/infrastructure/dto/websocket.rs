//! WebSocket DTOs.

use serde::{Deserialize, Serialize};

/// Events sent by clients, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "ride:accepted")]
    RideAccepted { request_id: String },
    #[serde(rename = "ride:rejected")]
    RideRejected { request_id: String },
    #[serde(rename = "chat:initiate")]
    ChatInitiate { target_id: String, ride_id: String },
    #[serde(rename = "chat:join")]
    ChatJoin { chat_room_id: String },
    #[serde(rename = "chat:message:new")]
    ChatMessageNew { chat_room_id: String, body: String },
    #[serde(rename = "chat:message:previous")]
    ChatMessagePrevious { chat_room_id: String },
    #[serde(rename = "location:update")]
    LocationUpdate { coordinates: [f64; 2] },
    #[serde(rename = "location:get-location")]
    LocationGet { driver_id: String },
    #[serde(rename = "location:room:join")]
    LocationRoomJoin { ride_id: String },
    #[serde(rename = "call:request")]
    CallRequest { target_id: String, peer_id: String },
    /// `peer_id` が null または欠落していれば拒否
    #[serde(rename = "call:request:response")]
    CallRequestResponse {
        #[serde(default)]
        peer_id: Option<String>,
    },
}

impl ClientEvent {
    /// The event name as it appears in the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RideAccepted { .. } => "ride:accepted",
            ClientEvent::RideRejected { .. } => "ride:rejected",
            ClientEvent::ChatInitiate { .. } => "chat:initiate",
            ClientEvent::ChatJoin { .. } => "chat:join",
            ClientEvent::ChatMessageNew { .. } => "chat:message:new",
            ClientEvent::ChatMessagePrevious { .. } => "chat:message:previous",
            ClientEvent::LocationUpdate { .. } => "location:update",
            ClientEvent::LocationGet { .. } => "location:get-location",
            ClientEvent::LocationRoomJoin { .. } => "location:room:join",
            ClientEvent::CallRequest { .. } => "call:request",
            ClientEvent::CallRequestResponse { .. } => "call:request:response",
        }
    }

    /// Whether handling waits on another client and must not hold up the reader
    pub fn waits_on_peer(&self) -> bool {
        matches!(self, ClientEvent::CallRequest { .. })
    }
}

/// Reply to a client event: `{"type": "response:<event>", "error": ..., "data": ...}`
///
/// Exactly one of `error` and `data` is non-null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub r#type: String,
    pub error: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl ResponseEnvelope {
    pub fn ok(event: &str, data: serde_json::Value) -> Self {
        Self {
            r#type: format!("response:{}", event),
            error: None,
            data: Some(data),
        }
    }

    pub fn error(event: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: format!("response:{}", event),
            error: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_event() {
        // テスト項目: type でタグ付けされた JSON がクライアントイベントに変換される
        // given (前提条件):
        let json = r#"{"type":"chat:message:new","chat_room_id":"room-1","body":"hi"}"#;

        // when (操作):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ClientEvent::ChatMessageNew {
                chat_room_id: "room-1".to_string(),
                body: "hi".to_string(),
            }
        );
        assert_eq!(event.name(), "chat:message:new");
    }

    #[test]
    fn test_call_response_without_peer_id_parses_as_rejection() {
        // テスト項目: peer_id のない call:request:response は peer_id なしとして受け付ける
        // given (前提条件):
        let missing = r#"{"type":"call:request:response"}"#;
        let null = r#"{"type":"call:request:response","peer_id":null}"#;

        // when (操作):
        let missing: ClientEvent = serde_json::from_str(missing).unwrap();
        let null: ClientEvent = serde_json::from_str(null).unwrap();

        // then (期待する結果):
        assert_eq!(missing, ClientEvent::CallRequestResponse { peer_id: None });
        assert_eq!(null, missing);
        assert!(!missing.waits_on_peer());
        let request = ClientEvent::CallRequest {
            target_id: "bob".to_string(),
            peer_id: "peer-alice".to_string(),
        };
        assert!(request.waits_on_peer());
        assert_eq!(request.name(), "call:request");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        // テスト項目: 未知の type はパースエラーになる
        // given (前提条件):
        let json = r#"{"type":"ride:teleport","request_id":"r"}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientEvent>(json);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_response_envelope_shape() {
        // テスト項目: 応答は response:<event> の type と error/data を持つ
        // given (前提条件):
        let ok = ResponseEnvelope::ok("chat:initiate", serde_json::json!({"chat_room_id": "x"}));
        let err = ResponseEnvelope::error("chat:join", "not a member of chat room x");

        // when (操作):
        let ok_json = serde_json::to_value(&ok).unwrap();
        let err_json = serde_json::to_value(&err).unwrap();

        // then (期待する結果):
        assert_eq!(ok_json["type"], "response:chat:initiate");
        assert!(ok_json["error"].is_null());
        assert_eq!(ok_json["data"]["chat_room_id"], "x");
        assert_eq!(err_json["type"], "response:chat:join");
        assert_eq!(err_json["error"], "not a member of chat room x");
        assert!(err_json["data"].is_null());
    }
}
