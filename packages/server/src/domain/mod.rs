//! Domain layer: value objects, entities, and the collaborator interfaces the
//! use cases depend on.

pub mod connection;
pub mod entity;
pub mod error;
pub mod event;
pub mod repository;
pub mod value_object;

pub use connection::{ConnectionHandle, ConnectionRegistry, PusherChannel, RoomMembership};
pub use entity::{
    Candidate, ChatMessage, ChatRoom, Credentials, DriverProfile, LocationSample, Principal, Ride,
    RideRequest, RideStatus,
};
pub use error::{
    AuthError, CandidateQueryError, MessagePushError, RepositoryError, RideStatusError,
    ValueObjectError,
};
pub use event::ServerEvent;
pub use repository::{
    Authenticator, CandidateSupplier, ChatRoomRepository, DriverDirectory, LocationStore,
    RideStore,
};
pub use value_object::{
    ChatRoomId, ConnectionId, Coordinate, MessageBody, RideClass, RideId, RideRequestId, RoomId,
    Timestamp, UserId,
};
