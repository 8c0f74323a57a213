//! Authentication: password checks against the credential store and signed
//! bearer tokens.

pub mod password;
mod service;
pub mod token;

pub use password::{hash_password, hash_password_with_cost, verify_password};
pub use service::{AuthService, Session};
pub use token::{Claims, TokenSigner, DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL};
