//! Signed bearer tokens.
//!
//! A token binds a username to an expiry time with an HMAC-SHA256 signature:
//!
//! ```text
//! token     = "{hex(username)}.{expiry}.{signature}"
//! signature = hex(HMAC-SHA256(secret_key, "{hex(username)}.{expiry}"))
//! ```
//!
//! The username is hex-encoded so it can never contain the `.` separator.
//! Tokens are stateless: nothing is stored server-side and there is no
//! revocation; a client logs out by discarding its token.
//!
//! # Example
//!
//! ```rust
//! use image_vault::auth::TokenSigner;
//! use std::time::Duration;
//!
//! let signer = TokenSigner::new("my-secret-key", Duration::from_secs(3600));
//! let (token, _expiry) = signer.issue("alice");
//!
//! let claims = signer.verify(&token).unwrap();
//! assert_eq!(claims.user, "alice");
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Longest accepted token lifetime (30 days).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// The verified content of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Authenticated username
    pub user: String,

    /// Expiry timestamp (Unix epoch seconds)
    pub expires_at: u64,
}

/// Issues and verifies signed, expiring bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret_key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    /// Create a signer with the given secret key and token lifetime.
    ///
    /// The secret should be at least 32 bytes.
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl,
        }
    }

    /// Lifetime of newly issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`, valid for the configured lifetime.
    ///
    /// Returns the token and its expiry timestamp.
    pub fn issue(&self, user: &str) -> (String, u64) {
        let expiry = now_secs().saturating_add(self.ttl.as_secs());
        (self.issue_with_expiry(user, expiry), expiry)
    }

    /// Issue a token with a specific expiry timestamp.
    pub fn issue_with_expiry(&self, user: &str, expiry: u64) -> String {
        let payload = format!("{}.{}", hex::encode(user.as_bytes()), expiry);
        let signature = self.compute_signature(&payload);
        format!("{}.{}", payload, signature)
    }

    /// Verify a token and return its claims.
    ///
    /// Checks, in order: structure, expiry, signature (constant-time).
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (user_hex, expiry_str, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(e), Some(s)) if parts.next().is_none() => (u, e, s),
            _ => return Err(AuthError::InvalidToken),
        };

        let expiry: u64 = expiry_str.parse().map_err(|_| AuthError::InvalidToken)?;

        let current_time = now_secs();
        if current_time > expiry {
            return Err(AuthError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        let provided_sig = hex::decode(signature).map_err(|_| AuthError::InvalidToken)?;
        let expected_sig = self.compute_mac(&format!("{}.{}", user_hex, expiry_str));

        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(AuthError::InvalidToken);
        }

        let user_bytes = hex::decode(user_hex).map_err(|_| AuthError::InvalidToken)?;
        let user = String::from_utf8(user_bytes).map_err(|_| AuthError::InvalidToken)?;

        Ok(Claims {
            user,
            expires_at: expiry,
        })
    }

    fn compute_mac(&self, payload: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn compute_signature(&self, payload: &str) -> String {
        hex::encode(self.compute_mac(payload))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
