/// Password hashing and verification using Argon2id
///
/// Credentials are stored as a raw hash plus a separate random salt.
/// The cost parameters are fixed so stored hashes stay verifiable:
/// - Algorithm: Argon2id, version 0x13
/// - Iterations: 1
/// - Memory: 64 MiB
/// - Parallelism: 4 lanes
/// - Salt: 32 bytes random
/// - Output: 32 bytes hash
use argon2::{Algorithm, Argon2, Params, Version};
use munit_core::User;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::debug;

/// Argon2 passes over memory
pub const ARGON_TIME_COST: u32 = 1;
/// Argon2 memory cost in KiB (64 MiB)
pub const ARGON_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2 lanes
pub const ARGON_PARALLELISM: u32 = 4;
/// Hash output length in bytes
pub const HASH_LEN: usize = 32;
/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to generate salt: {0}")]
    SaltUnavailable(#[from] rand::Error),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Stored password credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
}

impl Credential {
    /// Salt and hash a plaintext password
    pub fn new(password: &str) -> Result<Self, PasswordError> {
        let salt = make_salt()?;
        let hash = hash_password(password.as_bytes(), &salt)?;
        Ok(Self { hash, salt })
    }

    /// Credential that matches no password
    ///
    /// Verified in place of a missing account so an unknown email costs the
    /// same hash as a wrong password.
    pub fn decoy() -> Self {
        Self {
            hash: vec![0u8; HASH_LEN],
            salt: vec![0u8; SALT_LEN],
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_password(&self.hash, password.as_bytes(), &self.salt)
    }
}

impl From<&User> for Credential {
    fn from(user: &User) -> Self {
        Self {
            hash: user.password_hash.clone(),
            salt: user.salt.clone(),
        }
    }
}

/// Generate a fresh random salt
pub fn make_salt() -> Result<Vec<u8>, PasswordError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt)?;
    Ok(salt)
}

/// Derive the password hash for a salt
///
/// Deterministic for identical inputs. Fails only for inputs the Argon2
/// primitive rejects, such as a salt shorter than 8 bytes.
pub fn hash_password(password: &[u8], salt: &[u8]) -> Result<Vec<u8>, PasswordError> {
    let mut hash = vec![0u8; HASH_LEN];
    hasher()?
        .hash_password_into(password, salt, &mut hash)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
    Ok(hash)
}

/// Check a submitted password against a stored hash
pub fn verify_password(stored_hash: &[u8], password: &[u8], salt: &[u8]) -> bool {
    match hash_password(password, salt) {
        Ok(candidate) => constant_time_eq(stored_hash, &candidate),
        Err(e) => {
            debug!(error = %e, "password verification failed");
            false
        }
    }
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(
        ARGON_MEMORY_KIB,
        ARGON_TIME_COST,
        ARGON_PARALLELISM,
        Some(HASH_LEN),
    )
    .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Byte comparison whose duration does not depend on where inputs differ
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
