//! Data models shared across persistence and the rotation protocol.

pub mod session;

pub use session::Session;
