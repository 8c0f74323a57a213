use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::password::verify_password;
use super::token::{Claims, TokenSigner};
use crate::error::AuthError;
use crate::store::{MetadataStore, UserSummary};

/// A successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub expires_at: u64,
}

/// Checks credentials against the user collection and issues tokens.
pub struct AuthService<M> {
    store: Arc<M>,
    signer: TokenSigner,
}

impl<M> Clone for AuthService<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            signer: self.signer.clone(),
        }
    }
}

impl<M: MetadataStore> AuthService<M> {
    pub fn new(store: Arc<M>, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Authenticate `name` with `password` and issue a token.
    pub async fn login(&self, name: &str, password: &str) -> Result<Session, AuthError> {
        let user = self
            .store
            .find_user_by_name(name)
            .await?
            .ok_or_else(|| AuthError::NoSuchUser(name.to_string()))?;

        // bcrypt is CPU-bound; keep it off the async workers
        let candidate = password.to_string();
        let stored_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| AuthError::Hash(format!("Password verification task failed: {e}")))?;

        if !matches {
            return Err(AuthError::WrongPassword);
        }

        let (token, expires_at) = self.signer.issue(&user.name);
        debug!(user = %user.name, expires_at = expires_at, "Issued token");

        Ok(Session {
            token,
            user: user.name,
            expires_at,
        })
    }

    /// Verify a bearer token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.signer.verify(token)
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AuthError> {
        Ok(self.store.list_users().await?)
    }
}
