//! Realtime ride-dispatch server library.
//!
//! Drivers and riders hold a WebSocket connection to the server. Ride requests
//! are offered to nearby drivers one at a time, and the matched pair can then
//! chat and share live locations over the same connection.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
