use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::principal::{Credentials, Identity};
use super::provider::{AuthError, Authenticator};
use super::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("{field} must not be empty")]
    InvalidInput { field: &'static str },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication timed out")]
    Timeout,
    #[error("a login is already in progress")]
    AlreadyInProgress,
    #[error("login was cancelled")]
    Cancelled,
}

impl From<AuthError> for SubmitError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => SubmitError::InvalidCredentials,
            AuthError::Network(msg) => SubmitError::Network(msg),
            AuthError::Timeout => SubmitError::Timeout,
        }
    }
}

pub type SubmissionResult = Result<Identity, SubmitError>;

/// A submission started with [`LoginForm::begin`], running on the tokio runtime.
pub type PendingLogin = JoinHandle<SubmissionResult>;

/// Clears the in-flight flag however the submission ends, including the future being dropped.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One login form instance. At most one submission runs at a time; a successful one signs
/// the resolved identity into the injected store, every failure leaves the store untouched.
pub struct LoginForm {
    store: SessionStore,
    authenticator: Arc<dyn Authenticator>,
    timeout: Option<Duration>,
    in_flight: Arc<AtomicBool>,
    // held across the stale check and the sign-in, and by `cancel`
    generation: Mutex<u64>,
}

impl LoginForm {
    pub fn new(store: SessionStore, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            store,
            authenticator,
            timeout: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            generation: Mutex::new(0),
        }
    }

    /// Bound each authenticator call; expiry reports `Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Supersede whatever is in flight. Its result, when it arrives, is discarded with
    /// `Cancelled`. Once this returns, a superseded submission can no longer sign in.
    /// The in-flight slot stays taken until that call actually resolves.
    pub fn cancel(&self) {
        let mut gen = self.generation.lock();
        *gen += 1;
        debug!(target: "mealy::submit", "cancel: generation now {}", *gen);
    }

    pub async fn submit(&self, credentials: Credentials) -> SubmissionResult {
        let (_slot, gen) = self.claim(&credentials)?;
        self.resolve(credentials, gen).await
    }

    /// Start a submission in the background. Validation, the single-flight check and the
    /// generation are settled before this returns, so a `cancel()` issued afterwards always
    /// supersedes it, even if the task has not been polled yet.
    pub fn begin(self: &Arc<Self>, credentials: Credentials) -> Result<PendingLogin, SubmitError> {
        let (slot, gen) = self.claim(&credentials)?;
        let form = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _slot = slot;
            form.resolve(credentials, gen).await
        }))
    }

    fn claim(&self, credentials: &Credentials) -> Result<(InFlight, u64), SubmitError> {
        validate(credentials)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "mealy::submit", "rejecting duplicate submit for user={}", credentials.username.trim());
            return Err(SubmitError::AlreadyInProgress);
        }
        let slot = InFlight(Arc::clone(&self.in_flight));
        let gen = *self.generation.lock();
        Ok((slot, gen))
    }

    async fn resolve(&self, credentials: Credentials, gen: u64) -> SubmissionResult {
        debug!(target: "mealy::submit", "submit: user={} generation={}", credentials.username.trim(), gen);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.authenticator.authenticate(&credentials)).await {
                Ok(res) => res,
                Err(_) => Err(AuthError::Timeout),
            },
            None => self.authenticator.authenticate(&credentials).await,
        };

        let current = self.generation.lock();
        if *current != gen {
            info!(target: "mealy::submit", "discarding stale result for user={}", credentials.username.trim());
            return Err(SubmitError::Cancelled);
        }

        match outcome {
            Ok(identity) => {
                self.store.sign_in(identity.clone());
                drop(current);
                info!(target: "mealy::submit", "signed in user={} role={}", identity.id(), identity.role());
                Ok(identity)
            }
            Err(e) => {
                warn!(target: "mealy::submit", "login failed for user={}: {}", credentials.username.trim(), e);
                Err(e.into())
            }
        }
    }
}

fn validate(credentials: &Credentials) -> Result<(), SubmitError> {
    if credentials.username.trim().is_empty() {
        return Err(SubmitError::InvalidInput { field: "username" });
    }
    if credentials.secret.trim().is_empty() {
        return Err(SubmitError::InvalidInput { field: "secret" });
    }
    Ok(())
}
