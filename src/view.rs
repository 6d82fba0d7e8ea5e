//! Root dispatch: which of the four screens is visible for a given session and login intent,
//! and the renderer seam that draws it.

use std::io::Write;

use tracing::debug;

use crate::identity::{Identity, Role, SessionState, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewIdentity {
    Landing,
    Login,
    CustomerDashboard,
    AdminDashboard,
}

impl ViewIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewIdentity::Landing => "landing",
            ViewIdentity::Login => "login",
            ViewIdentity::CustomerDashboard => "customer_dashboard",
            ViewIdentity::AdminDashboard => "admin_dashboard",
        }
    }
}

/// Pure and total over every session state and intent. Role decides for signed-in users;
/// the login intent only matters while anonymous.
pub fn select_view(session: &SessionState, wants_login_form: bool) -> ViewIdentity {
    match session {
        SessionState::Authenticated(user) => match user.role() {
            Role::Admin => ViewIdentity::AdminDashboard,
            Role::Customer => ViewIdentity::CustomerDashboard,
        },
        SessionState::Anonymous if wants_login_form => ViewIdentity::Login,
        SessionState::Anonymous => ViewIdentity::Landing,
    }
}

/// What the rendering layer receives: the screen, plus the user when someone is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub identity: ViewIdentity,
    pub user: Option<Identity>,
}

pub trait Renderer {
    fn render(&mut self, view: &View) -> std::io::Result<()>;
}

/// Holds the transient "show me the login form" intent next to an injected session store.
/// The intent is presentation state only; it never decides who the user is.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: SessionStore,
    wants_login_form: bool,
}

impl Dispatcher {
    pub fn new(store: SessionStore) -> Self {
        Self { store, wants_login_form: false }
    }

    pub fn store(&self) -> &SessionStore { &self.store }

    pub fn wants_login_form(&self) -> bool { self.wants_login_form }

    pub fn show_login(&mut self) {
        self.wants_login_form = true;
    }

    pub fn dismiss_login(&mut self) {
        self.wants_login_form = false;
    }

    /// Sign out and drop the login intent so the next screen is the landing page.
    pub fn sign_out(&mut self) {
        self.store.sign_out();
        self.wants_login_form = false;
    }

    pub fn view(&self) -> View {
        let session = self.store.current();
        let identity = select_view(&session, self.wants_login_form);
        debug!(target: "mealy::view", "select: {} (wants_login_form={})", identity.as_str(), self.wants_login_form);
        View { identity, user: session.identity().cloned() }
    }
}

/// Plain text screens, one per view, written to any sink.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self { Self { out } }

    pub fn into_inner(self) -> W { self.out }
}

fn greeting_name(user: Option<&Identity>) -> &str {
    user.map(|u| u.display_name().unwrap_or_else(|| u.id())).unwrap_or("guest")
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, view: &View) -> std::io::Result<()> {
        let out = &mut self.out;
        match view.identity {
            ViewIdentity::Landing => {
                writeln!(out, "=== Mealy ===")?;
                writeln!(out, "Delicious Food, Delivered to You")?;
                writeln!(out, "Admins manage menus, customers order with ease.")?;
                writeln!(out, "Type `login` or `signup` to get started.")?;
            }
            ViewIdentity::Login => {
                writeln!(out, "=== Sign in to Mealy ===")?;
                writeln!(out, "submit <email> <password>   sign in")?;
                writeln!(out, "register <email> <password> <name> [admin|customer]   create an account")?;
                writeln!(out, "back                         return to the landing page")?;
            }
            ViewIdentity::CustomerDashboard => {
                writeln!(out, "=== Customer Dashboard ===")?;
                writeln!(out, "Welcome, {}.", greeting_name(view.user.as_ref()))?;
                writeln!(out, "Browse today's menu and track your orders. Type `logout` to sign out.")?;
            }
            ViewIdentity::AdminDashboard => {
                writeln!(out, "=== Admin Dashboard ===")?;
                writeln!(out, "Signed in as {} (admin).", greeting_name(view.user.as_ref()))?;
                writeln!(out, "Manage meals, daily menus and orders. Type `logout` to sign out.")?;
            }
        }
        out.flush()
    }
}
