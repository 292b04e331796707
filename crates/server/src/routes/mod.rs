//! API route handlers.

pub mod auth;
pub mod health;
pub mod library;
pub mod notify;
pub mod users;
