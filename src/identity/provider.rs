use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::directory::{hash_password, write_users_file, UserDirectory, UserRecord};
use super::principal::{Credentials, Identity, Role};
use crate::error::{AppError, AppResult};

/// Why an authenticator declined to resolve an identity. Ordinary rejection is a value,
/// never a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication timed out")]
    Timeout,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
}

fn gen_token() -> Result<String, AuthError> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::Network(format!("token source unavailable: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-process authenticator over a shared `UserDirectory`. The username is the account email.
#[derive(Debug, Clone, Default)]
pub struct LocalAuthenticator {
    users: Arc<RwLock<UserDirectory>>,
}

impl LocalAuthenticator {
    pub fn new(users: UserDirectory) -> Self {
        Self { users: Arc::new(RwLock::new(users)) }
    }

    /// Shared handle to the directory, for registration and saving.
    pub fn directory(&self) -> Arc<RwLock<UserDirectory>> {
        Arc::clone(&self.users)
    }

    /// Create an account and, when `save_to` is set, persist the directory. Either both
    /// happen or neither: a failed save removes the new record again. Hashing and file IO
    /// run on the blocking pool; the directory lock is not held while hashing.
    pub async fn register(
        &self,
        email: String,
        password: String,
        name: String,
        role: Role,
        save_to: Option<PathBuf>,
    ) -> AppResult<UserRecord> {
        let users = Arc::clone(&self.users);
        tokio::task::spawn_blocking(move || -> AppResult<UserRecord> {
            users.read().check_new(&email, &password, &name)?;
            let hash = hash_password(&password)?;

            let mut dir = users.write();
            let rec = dir.add(&email, &name, role, hash)?.clone();
            if let Some(path) = &save_to {
                if let Err(e) = dir.to_json().and_then(|text| write_users_file(path, &text)) {
                    dir.remove(&rec.email);
                    warn!(target: "mealy::auth", "registration of {} rolled back: {}", rec.email, e);
                    return Err(e);
                }
                debug!(target: "mealy::auth", "saved {} users to {}", dir.len(), path.display());
            }
            Ok(rec)
        })
        .await
        .map_err(|e| AppError::internal("register_task_failed".to_string(), e.to_string()))?
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let users = Arc::clone(&self.users);
        let creds = credentials.clone();
        // argon2 verification is CPU bound; keep it off the async worker
        let found = tokio::task::spawn_blocking(move || {
            users.read().verify(&creds.username, &creds.secret).cloned()
        })
        .await
        .map_err(|e| AuthError::Network(format!("verifier task failed: {}", e)))?;

        let Some(rec) = found else {
            debug!(target: "mealy::auth", "login failed for user={}", credentials.username.trim());
            return Err(AuthError::InvalidCredentials);
        };
        let identity = Identity::new(rec.id, rec.role)
            .with_display_name(rec.name)
            .with_token(gen_token()?);
        info!(target: "mealy::auth", "login ok user={} role={}", rec.email, identity.role());
        Ok(identity)
    }
}
