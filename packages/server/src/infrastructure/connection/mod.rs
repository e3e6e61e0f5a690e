//! 接続管理の実装
//!
//! - `registry`: `ConnectionRegistry` の DashMap 実装
//! - `room`: `RoomMembership` の DashMap 実装

pub mod registry;
pub mod room;

pub use registry::InMemoryConnectionRegistry;
pub use room::InMemoryRoomMembership;
