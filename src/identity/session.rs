use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use super::principal::Identity;

/// Authentication status of the shell. There is no "logged in without a user" case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(id) => Some(id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Debug)]
struct Cell {
    state: SessionState,
    revision: u64,
}

/// Handle to one shared session cell. Clones share the cell, so a mutation through any
/// handle is visible to every other handle as soon as the call returns.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cell: Arc<RwLock<Cell>>,
    changes: Arc<watch::Sender<u64>>,
}

static GLOBAL: Lazy<SessionStore> = Lazy::new(SessionStore::new);

impl Default for SessionStore {
    fn default() -> Self { Self::new() }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self {
            cell: Arc::new(RwLock::new(Cell { state: SessionState::Anonymous, revision: 0 })),
            changes: Arc::new(tx),
        }
    }

    /// The process-wide store, created on first use.
    pub fn global() -> &'static SessionStore { &GLOBAL }

    pub fn current(&self) -> SessionState {
        self.cell.read().state.clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.cell.read().state.identity().cloned()
    }

    /// Number of state changes applied so far.
    pub fn revision(&self) -> u64 {
        self.cell.read().revision
    }

    /// Receiver that wakes whenever the state changes; the value is the new revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Last write wins. Signing in again with an equal identity leaves the revision alone.
    pub fn sign_in(&self, identity: Identity) {
        let next = SessionState::Authenticated(identity);
        self.replace(next, "sign_in");
    }

    pub fn sign_out(&self) {
        self.replace(SessionState::Anonymous, "sign_out");
    }

    fn replace(&self, next: SessionState, op: &'static str) {
        let who = next.identity().map(|id| (id.id().to_string(), id.role()));
        let rev = {
            let mut cell = self.cell.write();
            if cell.state == next {
                debug!(target: "mealy::session", "{}: state unchanged rev={}", op, cell.revision);
                return;
            }
            cell.state = next;
            cell.revision += 1;
            // publish under the lock so subscribers never see revisions out of order
            self.changes.send_replace(cell.revision);
            cell.revision
        };
        match who {
            Some((user, role)) => debug!(target: "mealy::session", "{}: user={} role={} rev={}", op, user, role, rev),
            None => debug!(target: "mealy::session", "{}: anonymous rev={}", op, rev),
        }
    }
}
