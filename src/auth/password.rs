use argon2::{
    password_hash::{Error as ArgonError, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{debug, error, warn};

use crate::config::HashingConfig;

/// Longest plaintext accepted for hashing, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 4096;

// Verified against when the login email is unknown, so both paths do the same work.
const DUMMY_PASSWORD: &str = "dummy-password-for-timing-equalization";

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("password exceeds {} bytes", MAX_PASSWORD_BYTES)]
    InputTooLong,
    #[error("malformed password hash: {0}")]
    Malformed(String),
    #[error("invalid hashing parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Primitive(String),
}

/// Argon2id hasher producing self-describing PHC strings.
///
/// Verification reads the parameters embedded in the stored hash, so raising the
/// configured cost does not invalidate existing hashes.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cfg: HashingConfig) -> Result<Self, HashError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        if plain.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::InputTooLong);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError::Primitive(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; errors only when `hash` cannot be parsed.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            warn!(error = %e, "argon2 parse hash error");
            HashError::Malformed(e.to_string())
        })?;
        match self.argon2.verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(ArgonError::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(HashError::Primitive(e.to_string()))
            }
        }
    }

    /// Burns one verification's worth of work. Always `false`.
    pub fn verify_dummy(&self, plain: &str) -> bool {
        let _ = self.verify(plain, &self.dummy_hash);
        debug!("dummy password verification performed");
        false
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(HashingConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap hasher")
}
