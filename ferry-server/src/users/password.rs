//! Password hashing using Argon2id
//!
//! Provides secure password hashing for production use, with an optional
//! fast mode for testing that avoids Argon2's intentional slowness.
//!
//! # Fast Mode
//!
//! When `fast: true` is passed to `hash_password`, it produces a simple hash
//! with the format `$FAST$<password>`. This is detected automatically by
//! `verify_password` for instant verification.
//!
//! **Never use fast mode in production** - it stores passwords in plaintext.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Prefix for fast (test-only) password hashes
const FAST_HASH_PREFIX: &str = "$FAST$";

/// Hash a password
///
/// Fast mode produces `$FAST$<password>`; normal mode an Argon2id hash in
/// PHC string format.
pub fn hash_password(password: &str, fast: bool) -> Result<String, argon2::password_hash::Error> {
    if fast {
        Ok(format!("{}{}", FAST_HASH_PREFIX, password))
    } else {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }
}

/// Verify a password against a stored hash
///
/// Automatically detects the hash type: hashes starting with `$FAST$` use
/// direct string comparison, all others use Argon2 verification.
///
/// Returns `Ok(false)` on a wrong password; `Err` only when the stored hash
/// itself is malformed.
pub fn verify_password(
    password: &str,
    password_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    // Fast hash - direct comparison (test mode only)
    if let Some(stored) = password_hash.strip_prefix(FAST_HASH_PREFIX) {
        return Ok(stored == password);
    }

    let parsed_hash = PasswordHash::new(password_hash)?;
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
