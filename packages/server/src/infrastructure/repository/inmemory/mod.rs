//! InMemory 実装
//!
//! ## 技術的負債
//!
//! 永続化層の代替としてドメインモデルを直接保持している。
//! DBMS を導入する際は DB Row → DTO → ドメインモデルの変換層を挟む。

mod candidate;
mod chat_room;
mod driver;
mod location;
mod ride;

pub use candidate::InMemoryCandidateSupplier;
pub use chat_room::InMemoryChatRoomRepository;
pub use driver::InMemoryDriverDirectory;
pub use location::InMemoryLocationStore;
pub use ride::InMemoryRideStore;
