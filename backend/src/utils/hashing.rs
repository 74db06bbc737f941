//! One-way hashing of refresh secrets.
//!
//! Only the digest is persisted; the plaintext secret leaves the server once,
//! inside the token pair handed to the client.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

/// Memory cost in KiB.
pub const HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const HASH_ITERATIONS: u32 = 2;
pub const HASH_PARALLELISM: u32 = 1;

/// Capability pair for storing secrets at rest.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch; errors only when `digest` cannot be parsed.
    fn verify(&self, secret: &str, digest: &str) -> anyhow::Result<bool>;
}

/// Salted argon2id with a cost fixed at build time.
#[derive(Clone)]
pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl Argon2SecretHasher {
    pub fn new() -> anyhow::Result<Self> {
        let params = Params::new(HASH_MEMORY_KIB, HASH_ITERATIONS, HASH_PARALLELISM, None)
            .map_err(|e| anyhow::anyhow!("Invalid argon2 parameters: {}", e))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let digest = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash refresh token: {}", e))?;

        Ok(digest.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> anyhow::Result<bool> {
        let parsed_hash = PasswordHash::new(digest)
            .map_err(|e| anyhow::anyhow!("Invalid refresh token hash: {}", e))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("Refresh token verification error: {}", e)),
        }
    }
}
