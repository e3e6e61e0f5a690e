//! Request handlers.

mod http;
mod websocket;

pub use http::{
    cancel_ride, dispatch_ride, health_check, list_drivers, register_driver, ride_arrived,
    ride_complete, ride_start,
};
pub use websocket::websocket_handler;
