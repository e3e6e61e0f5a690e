//! Repository の実装
//!
//! - `inmemory`: プロセス内メモリを使った実装（単一ノード・開発用）

pub mod inmemory;

pub use inmemory::{
    InMemoryCandidateSupplier, InMemoryChatRoomRepository, InMemoryDriverDirectory,
    InMemoryLocationStore, InMemoryRideStore,
};
