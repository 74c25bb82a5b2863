//! Argon2 password hashes in PHC string form.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 8;

fn hashing_failed(stage: &'static str, e: password_hash::Error) -> anyhow::Error {
    error!(stage, error = %e, "argon2 failure");
    anyhow::anyhow!("password {stage} failed: {e}")
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| hashing_failed("hashing", e))
}

/// `Ok(false)` on a mismatch; errors only when `stored` cannot be used.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| hashing_failed("parsing", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hashing_failed("verification", e)),
    }
}
