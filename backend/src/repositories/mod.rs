pub mod memory;
pub mod session;

pub use memory::InMemorySessionStore;
pub use session::{PgSessionStore, SessionStore};

#[cfg(test)]
pub use session::MockSessionStore;
