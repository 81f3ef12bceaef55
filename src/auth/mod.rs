// SPDX-License-Identifier: MIT
//! Credential and session-token primitives.
//!
//! Passwords are stored as hex-encoded SHA-256 over a random 16-byte salt
//! concatenated with the password. Session tokens are UUIDv4 hex without
//! dashes (32 chars) and live in the `auth_sessions` table.

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A freshly generated salt + hash pair, both hex-encoded.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    pub salt: String,
    pub hash: String,
}

/// Hash a password with a new random salt.
pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let hash = digest(&salt, password);
    PasswordHash { salt, hash }
}

/// Check a password against a stored salt + hash pair.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    digest(salt, password) == expected_hash
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint a new session token (UUID v4, hex without dashes = 32 chars).
pub fn generate_token() -> String {
    Uuid::new_v4().to_string().replace('-', "")
}

/// Extract the token from a `Bearer <token>` authorization header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
}
