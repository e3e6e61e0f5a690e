//! UseCase layer: one struct per application operation, wired with the domain
//! traits it needs.

mod call_signal;
mod chat_session;
mod connect_user;
mod disconnect_user;
mod dispatch_ride;
mod error;
mod ride_lifecycle;
mod track_location;

pub use call_signal::{CallSignalUseCase, DEFAULT_CALL_TIMEOUT};
pub use chat_session::ChatSessionUseCase;
pub use connect_user::{ConnectUserUseCase, ConnectedSession};
pub use disconnect_user::DisconnectUserUseCase;
pub use dispatch_ride::{
    CancelOutcome, DEFAULT_OFFER_TIMEOUT, DispatchConfig, DispatchCoordinator, DispatchOutcome,
    MAX_CANDIDATES, UnreachablePolicy,
};
pub use error::{
    CallError, ChatError, ConnectError, DispatchError, INTERNAL_ERROR_MESSAGE, LocationError,
    RideLifecycleError,
};
pub use ride_lifecycle::RideLifecycleUseCase;
pub use track_location::TrackLocationUseCase;
