//! WebSocket connection handlers.
//!
//! Each socket gets a writer task draining its `PusherChannel` and a reader
//! task routing inbound events to the use cases. Every inbound event is
//! answered with a `response:<event>` frame on the same socket.
//!
//! Events that wait on another client (`call:request`) run on their own task
//! so the reader keeps serving the socket meanwhile.

use std::{fmt::Display, sync::Arc};

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ChatRoomId, Coordinate, Credentials, MessageBody, Principal, PusherChannel, RideId,
        RideRequestId, UserId, ValueObjectError,
    },
    infrastructure::dto::websocket::{ClientEvent, ResponseEnvelope},
    ui::state::AppState,
    usecase::{ChatError, ConnectError, ConnectedSession, INTERNAL_ERROR_MESSAGE, LocationError},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub ride_tracking_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let credentials = Credentials {
        user_id: query.user_id,
        ride_tracking_id: query.ride_tracking_id,
    };

    // Create a channel for this connection to receive pushed frames
    let (tx, rx) = mpsc::unbounded_channel();

    match state.connect_user.execute(&credentials, tx).await {
        Ok(session) => {
            tracing::info!("Client '{}' connected", session.principal.identity());
            Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session, rx)))
        }
        Err(ConnectError::Unauthenticated(e)) => {
            tracing::warn!("Rejecting WebSocket connection: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Spawns a task that receives frames from the rx channel and pushes them to the WebSocket sender.
///
/// # Arguments
///
/// * `rx` - Channel receiver for frames addressed to this connection
/// * `sender` - WebSocket sink to send frames to this client
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session: ConnectedSession,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();
    let identity = session.principal.identity().clone();
    let connection_id = session.handle.connection_id;

    let state_clone = state.clone();
    let principal = session.principal.clone();
    let reply_channel = session.handle.channel.clone();

    // Spawn a task to receive events from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let response =
                        route_frame(&state_clone, &principal, &reply_channel, text.as_str()).await;
                    if response.is_some_and(|r| !send_response(&reply_channel, &r)) {
                        break;
                    }
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", principal.identity());
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to push frames from the use cases to this client
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.disconnect_user.execute(&session.principal, connection_id);
    tracing::info!("Client '{}' disconnected", identity);
}

/// Queue a response on the connection. Returns `false` once the channel is closed
fn send_response(channel: &PusherChannel, response: &ResponseEnvelope) -> bool {
    match serde_json::to_string(response) {
        Ok(json) => channel.send(json).is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode response: {}", e);
            true
        }
    }
}

/// Parse one inbound frame and run it against the use cases
///
/// Returns `None` when the response is sent later by a spawned task.
async fn route_frame(
    state: &Arc<AppState>,
    principal: &Principal,
    reply_channel: &PusherChannel,
    text: &str,
) -> Option<ResponseEnvelope> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse frame as JSON: {}", e);
            return Some(ResponseEnvelope::error("invalid", "invalid JSON frame"));
        }
    };
    let event_name = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("invalid")
        .to_string();
    let event: ClientEvent = match serde_json::from_value(value) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Unsupported or malformed event '{}': {}", event_name, e);
            return Some(ResponseEnvelope::error(
                &event_name,
                format!("invalid event: {}", e),
            ));
        }
    };

    match principal {
        Principal::User(user) if event.waits_on_peer() => {
            let state = state.clone();
            let user = user.clone();
            let reply_channel = reply_channel.clone();
            tokio::spawn(async move {
                let response = handle_user_event(&state, &user, event).await;
                send_response(&reply_channel, &response);
            });
            None
        }
        Principal::User(user) => Some(handle_user_event(state, user, event).await),
        Principal::RideTracker { observer, ride_id } => {
            Some(handle_tracker_event(state, observer, ride_id, event))
        }
    }
}

/// Tracking-only connections may only (re)join their own tracking room
fn handle_tracker_event(
    state: &AppState,
    observer: &UserId,
    tracked_ride: &RideId,
    event: ClientEvent,
) -> ResponseEnvelope {
    let name = event.name();
    match event {
        ClientEvent::LocationRoomJoin { ride_id } if ride_id == tracked_ride.as_str() => {
            let joined = state.location.subscribe(observer, tracked_ride);
            ok(name, &serde_json::json!({ "ride_id": ride_id, "joined": joined }))
        }
        _ => failure(name, &LocationError::NotPermitted, LocationError::NotPermitted.client_message()),
    }
}

async fn handle_user_event(state: &AppState, user: &UserId, event: ClientEvent) -> ResponseEnvelope {
    let name = event.name();
    match event {
        ClientEvent::RideAccepted { request_id } | ClientEvent::RideRejected { request_id } => {
            let accepted = name == "ride:accepted";
            let request_id = match parse_id::<RideRequestId>(name, request_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.dispatch.respond(&request_id, user, accepted) {
                Ok(()) => ok(name, &serde_json::json!({ "request_id": request_id })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::ChatInitiate { target_id, ride_id } => {
            let target = match parse_id::<UserId>(name, target_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            let ride_id = match parse_id::<RideId>(name, ride_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.chat.initiate(user, &target, &ride_id).await {
                Ok(chat_room_id) => ok(name, &serde_json::json!({ "chat_room_id": chat_room_id })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::ChatJoin { chat_room_id } => {
            let chat_room_id = match parse_id::<ChatRoomId>(name, chat_room_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.chat.join(&chat_room_id, user).await {
                Ok(room) => ok(name, &room),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::ChatMessageNew { chat_room_id, body } => {
            let chat_room_id = match parse_id::<ChatRoomId>(name, chat_room_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            let body = match MessageBody::new(body) {
                Ok(body) => body,
                Err(e) => {
                    let e = ChatError::from(e);
                    return failure(name, &e, e.client_message());
                }
            };
            match state.chat.send_message(&chat_room_id, user, body).await {
                Ok(message) => ok(name, &message),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::ChatMessagePrevious { chat_room_id } => {
            let chat_room_id = match parse_id::<ChatRoomId>(name, chat_room_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.chat.get_history(&chat_room_id, user).await {
                Ok(messages) => ok(name, &serde_json::json!({ "messages": messages })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::LocationUpdate { coordinates } => {
            let coordinate = match Coordinate::try_from(coordinates) {
                Ok(coordinate) => coordinate,
                Err(e) => {
                    let e = LocationError::from(e);
                    return failure(name, &e, e.client_message());
                }
            };
            match state.location.publish(user, coordinate).await {
                Ok(delivered) => ok(name, &serde_json::json!({ "delivered": delivered })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::LocationGet { driver_id } => {
            let driver = match parse_id::<UserId>(name, driver_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.location.latest(&driver).await {
                Ok(sample) => ok(name, &serde_json::json!({ "location": sample })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::LocationRoomJoin { ride_id } => {
            let ride_id = match parse_id::<RideId>(name, ride_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            let joined = state.location.subscribe(user, &ride_id);
            ok(name, &serde_json::json!({ "ride_id": ride_id, "joined": joined }))
        }
        ClientEvent::CallRequest { target_id, peer_id } => {
            let target = match parse_id::<UserId>(name, target_id) {
                Ok(id) => id,
                Err(response) => return response,
            };
            match state.call.request(user, &target, peer_id).await {
                Ok(peer_id) => ok(name, &serde_json::json!({ "peer_id": peer_id })),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
        ClientEvent::CallRequestResponse { peer_id } => {
            let accepted = peer_id.is_some();
            match state.call.respond(user, peer_id) {
                Ok(caller) => ok(
                    name,
                    &serde_json::json!({ "caller": caller, "accepted": accepted }),
                ),
                Err(e) => failure(name, &e, e.client_message()),
            }
        }
    }
}

fn parse_id<T>(event: &str, raw: String) -> Result<T, ResponseEnvelope>
where
    T: TryFrom<String, Error = ValueObjectError>,
{
    T::try_from(raw).map_err(|e| {
        tracing::debug!("Invalid identifier in '{}': {}", event, e);
        ResponseEnvelope::error(event, format!("invalid request: {}", e))
    })
}

fn ok<T: Serialize + ?Sized>(event: &str, data: &T) -> ResponseEnvelope {
    match serde_json::to_value(data) {
        Ok(value) => ResponseEnvelope::ok(event, value),
        Err(e) => {
            tracing::error!("Failed to encode '{}' response: {}", event, e);
            ResponseEnvelope::error(event, INTERNAL_ERROR_MESSAGE)
        }
    }
}

fn failure(event: &str, detail: &dyn Display, client_message: String) -> ResponseEnvelope {
    if client_message == INTERNAL_ERROR_MESSAGE {
        tracing::error!("'{}' failed: {}", event, detail);
    } else {
        tracing::debug!("'{}' rejected: {}", event, detail);
    }
    ResponseEnvelope::error(event, client_message)
}
