//! Password hashing capability.
//!
//! Digests are argon2id PHC strings, so every digest carries its own salt
//! and cost parameters and stays verifiable after the defaults change.
//! Stores written by earlier releases hold bcrypt digests (`$2b$...`); those
//! are still accepted by [`CredentialHasher::verify`] but never produced.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::error::HashError;

/// Turns plaintext passwords into digests and checks them.
pub trait CredentialHasher: Send + Sync {
    /// Produces a fresh salted digest.
    fn hash(&self, password: &SecretString) -> Result<String, HashError>;

    /// Checks `password` against a stored digest.
    ///
    /// A digest that cannot be parsed never matches.
    fn verify(&self, digest: &str, password: &SecretString) -> Result<bool, HashError>;
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Hasher {
    /// Hasher with the library's recommended parameters.
    pub fn new() -> Self {
        Self { params: Params::DEFAULT }
    }

    /// Hasher with explicit cost parameters.
    ///
    /// # Arguments
    /// * `memory_kib` - memory cost in KiB
    /// * `iterations` - time cost
    /// * `parallelism` - lanes
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Primitive(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &SecretString) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Primitive(e.to_string()))
    }

    fn verify(&self, digest: &str, password: &SecretString) -> Result<bool, HashError> {
        if is_bcrypt(digest) {
            return Ok(verify_bcrypt(digest, password));
        }

        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Stored password digest is not a valid PHC string: {}", e);
                return Ok(false);
            }
        };

        // Cost parameters come from the digest itself
        match self.argon2().verify_password(password.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Primitive(e.to_string())),
        }
    }
}

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

fn is_bcrypt(digest: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| digest.starts_with(prefix))
}

fn verify_bcrypt(digest: &str, password: &SecretString) -> bool {
    match bcrypt::verify(password.expose_secret(), digest) {
        Ok(matched) => matched,
        Err(e) => {
            log::warn!("Stored bcrypt digest is malformed: {}", e);
            false
        }
    }
}

/// Runs [`CredentialHasher::hash`] on the blocking pool.
pub async fn hash_async(hasher: Arc<dyn CredentialHasher>, password: SecretString) -> Result<String, HashError> {
    tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
}

/// Runs [`CredentialHasher::verify`] on the blocking pool.
pub async fn verify_async(
    hasher: Arc<dyn CredentialHasher>,
    digest: String,
    password: SecretString,
) -> Result<bool, HashError> {
    tokio::task::spawn_blocking(move || hasher.verify(&digest, &password)).await?
}
