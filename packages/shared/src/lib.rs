//! Utilities shared by the Ridelink packages: logging setup and time helpers.

pub mod logger;
pub mod time;
