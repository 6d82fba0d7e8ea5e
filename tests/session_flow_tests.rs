//! Session flow integration tests: landing -> login -> dashboard, the single-flight guard on
//! the login form, and what happens to results that resolve after the user moved on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex, Notify};

use mealy::identity::{
    AuthError, Authenticator, Credentials, Identity, LoginForm, Role, SessionState, SessionStore, SubmitError,
};
use mealy::view::{select_view, Dispatcher, ViewIdentity};

/// Authenticator whose answer is supplied by the test after the call has started.
struct Gated {
    calls: AtomicUsize,
    entered: Notify,
    answer: Mutex<Option<oneshot::Receiver<Result<Identity, AuthError>>>>,
}

impl Gated {
    fn new() -> (Arc<Self>, oneshot::Sender<Result<Identity, AuthError>>) {
        let (tx, rx) = oneshot::channel();
        let gated = Arc::new(Self { calls: AtomicUsize::new(0), entered: Notify::new(), answer: Mutex::new(Some(rx)) });
        (gated, tx)
    }
}

#[async_trait]
impl Authenticator for Gated {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<Identity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rx = self.answer.lock().await.take();
        self.entered.notify_one();
        match rx {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(AuthError::Network("gate dropped".into()))),
            None => Err(AuthError::Network("gate already used".into())),
        }
    }
}

/// Authenticator that resolves `alice`/`pw` to a fixed customer.
struct Alice;

#[async_trait]
impl Authenticator for Alice {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        if credentials.username == "alice" && credentials.secret == "pw" {
            Ok(Identity::new("u1", Role::Customer).with_display_name("Alice"))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[tokio::test]
async fn landing_to_customer_dashboard() -> Result<()> {
    let store = SessionStore::new();
    let mut dispatcher = Dispatcher::new(store.clone());
    let form = LoginForm::new(store.clone(), Arc::new(Alice));

    assert_eq!(store.current(), SessionState::Anonymous);
    assert_eq!(dispatcher.view().identity, ViewIdentity::Landing);

    dispatcher.show_login();
    assert_eq!(dispatcher.view().identity, ViewIdentity::Login);

    let who = form.submit(Credentials::new("alice", "pw")).await?;
    assert_eq!(who.id(), "u1");
    assert_eq!(store.current(), SessionState::Authenticated(who.clone()));

    let view = dispatcher.view();
    assert_eq!(view.identity, ViewIdentity::CustomerDashboard);
    assert_eq!(view.user, Some(who.clone()));
    // the login intent is still set, and irrelevant
    assert!(dispatcher.wants_login_form());
    assert_eq!(select_view(&store.current(), false), ViewIdentity::CustomerDashboard);
    assert_eq!(select_view(&store.current(), true), ViewIdentity::CustomerDashboard);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_keep_the_login_screen() -> Result<()> {
    let store = SessionStore::new();
    let mut dispatcher = Dispatcher::new(store.clone());
    let form = LoginForm::new(store.clone(), Arc::new(Alice));
    dispatcher.show_login();

    let err = form.submit(Credentials::new("alice", "nope")).await.unwrap_err();
    assert_eq!(err, SubmitError::InvalidCredentials);
    assert_eq!(store.current(), SessionState::Anonymous);
    assert_eq!(dispatcher.view().identity, ViewIdentity::Login);

    // the form is usable again right away
    form.submit(Credentials::new("alice", "pw")).await?;
    assert_eq!(dispatcher.view().identity, ViewIdentity::CustomerDashboard);
    Ok(())
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected() -> Result<()> {
    let store = SessionStore::new();
    let (gated, answer) = Gated::new();
    let form = Arc::new(LoginForm::new(store.clone(), gated.clone()));
    let dispatcher = {
        let mut d = Dispatcher::new(store.clone());
        d.show_login();
        d
    };

    let first = {
        let form = Arc::clone(&form);
        tokio::spawn(async move { form.submit(Credentials::new("bob", "pw")).await })
    };
    gated.entered.notified().await;
    assert!(form.is_pending());
    // the screen keeps showing the login form while the call is out
    assert_eq!(dispatcher.view().identity, ViewIdentity::Login);

    let err = form.submit(Credentials::new("bob", "pw")).await.unwrap_err();
    assert_eq!(err, SubmitError::AlreadyInProgress);
    assert_eq!(gated.calls.load(Ordering::SeqCst), 1);

    let bob = Identity::new("u2", Role::Admin);
    answer.send(Ok(bob.clone())).map_err(|_| anyhow::anyhow!("receiver gone"))?;
    let got = first.await??;
    assert_eq!(got, bob);
    assert!(!form.is_pending());
    assert_eq!(dispatcher.view().identity, ViewIdentity::AdminDashboard);
    Ok(())
}

#[tokio::test]
async fn late_result_is_applied_unless_cancelled() -> Result<()> {
    // without cancellation a result arriving after navigation still signs in
    let store = SessionStore::new();
    let (gated, answer) = Gated::new();
    let form = Arc::new(LoginForm::new(store.clone(), gated.clone()));
    let mut dispatcher = Dispatcher::new(store.clone());
    dispatcher.show_login();

    let pending = {
        let form = Arc::clone(&form);
        tokio::spawn(async move { form.submit(Credentials::new("carol", "pw")).await })
    };
    gated.entered.notified().await;
    dispatcher.dismiss_login();
    answer.send(Ok(Identity::new("u3", Role::Customer))).map_err(|_| anyhow::anyhow!("receiver gone"))?;
    pending.await??;
    assert_eq!(dispatcher.view().identity, ViewIdentity::CustomerDashboard);

    // with cancellation the same late result is dropped
    let store = SessionStore::new();
    let (gated, answer) = Gated::new();
    let form = Arc::new(LoginForm::new(store.clone(), gated.clone()));
    let pending = {
        let form = Arc::clone(&form);
        tokio::spawn(async move { form.submit(Credentials::new("carol", "pw")).await })
    };
    gated.entered.notified().await;
    form.cancel();
    answer.send(Ok(Identity::new("u3", Role::Customer))).map_err(|_| anyhow::anyhow!("receiver gone"))?;
    assert_eq!(pending.await?.unwrap_err(), SubmitError::Cancelled);
    assert_eq!(store.current(), SessionState::Anonymous);
    assert!(!form.is_pending());
    Ok(())
}

#[tokio::test]
async fn timeout_leaves_session_untouched() -> Result<()> {
    let store = SessionStore::new();
    let (gated, _answer) = Gated::new();
    let form = LoginForm::new(store.clone(), gated).with_timeout(Duration::from_millis(30));
    let err = form.submit(Credentials::new("dave", "pw")).await.unwrap_err();
    assert_eq!(err, SubmitError::Timeout);
    assert_eq!(store.current(), SessionState::Anonymous);
    assert!(!form.is_pending());
    Ok(())
}

#[tokio::test]
async fn sign_out_after_login_never_recovers_the_identity() -> Result<()> {
    let store = SessionStore::new();
    let mut dispatcher = Dispatcher::new(store.clone());
    let form = LoginForm::new(store.clone(), Arc::new(Alice));
    dispatcher.show_login();
    form.submit(Credentials::new("alice", "pw")).await?;

    dispatcher.sign_out();
    assert_eq!(store.current(), SessionState::Anonymous);
    assert_eq!(dispatcher.view().identity, ViewIdentity::Landing);
    assert!(dispatcher.view().user.is_none());
    Ok(())
}

#[tokio::test]
async fn subscribers_can_drive_reselection() -> Result<()> {
    let store = SessionStore::new();
    let dispatcher = Dispatcher::new(store.clone());
    let mut changes = store.subscribe();
    let form = LoginForm::new(store.clone(), Arc::new(Alice));

    form.submit(Credentials::new("alice", "pw")).await?;
    changes.changed().await?;
    assert_eq!(*changes.borrow_and_update(), store.revision());
    assert_eq!(dispatcher.view().identity, ViewIdentity::CustomerDashboard);
    Ok(())
}
