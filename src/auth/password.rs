//! Password hashing for stored credentials.
//!
//! Hashes are bcrypt strings (`$2a$`/`$2b$`/`$2y$`), so records created by
//! other bcrypt implementations verify unchanged.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AuthError;

/// Hash a password with the default bcrypt cost.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Hash a password with an explicit bcrypt cost (4-31).
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    hash(password, cost).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a password against a stored hash.
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    verify(password, stored_hash).unwrap_or(false)
}
