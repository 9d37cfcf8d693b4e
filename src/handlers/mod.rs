//! HTTP handlers.

pub mod user;
pub use user::*;
