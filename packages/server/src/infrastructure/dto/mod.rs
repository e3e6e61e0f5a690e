//! Data Transfer Objects (DTOs) for the dispatch server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: inbound WebSocket events and request/response envelopes
//! - `http`: HTTP API request/response bodies
//!
//! Outbound push events are domain types (`domain::ServerEvent`).

pub mod conversion;
pub mod http;
pub mod websocket;
