//! Infrastructure layer: in-memory implementations of the domain traits and
//! the wire DTOs.

pub mod auth;
pub mod connection;
pub mod dto;
pub mod repository;
