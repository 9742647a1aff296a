//! Business logic services

pub mod request_auth;

pub use request_auth::{RequestVerifier, UserAction};
