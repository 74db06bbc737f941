pub mod hashing;
pub mod jwt;

pub use hashing::*;
pub use jwt::*;
