use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::command::{Command, HELP};
use crate::config::ShellConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{
    Credentials, Identity, LocalAuthenticator, LoginForm, PendingLogin, Role, SessionStore, SubmitError, UserDirectory,
};
use crate::view::{Dispatcher, Renderer, View, ViewIdentity};

pub const DEMO_ADMIN: (&str, &str) = ("admin@mealy.com", "admin123");
pub const DEMO_CUSTOMER: (&str, &str) = ("customer@mealy.com", "customer123");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Message(String),
    Quit,
}

struct Attempt {
    task: PendingLogin,
    registered: bool,
}

/// The interactive shell: dispatcher, login form and account directory wired to one
/// session store, redrawing through the renderer whenever the selected screen changes.
///
/// `submit` and `register` start the login in the background and return at once; the
/// outcome is collected with [`Shell::settle_login`]. Until then the screen stays on the
/// login form, and `back` or `logout` supersede the attempt.
pub struct Shell<R: Renderer> {
    dispatcher: Dispatcher,
    form: Arc<LoginForm>,
    auth: LocalAuthenticator,
    users_file: Option<PathBuf>,
    renderer: R,
    drawn: Option<View>,
    pending: Option<Attempt>,
}

fn seed_demo(dir: &mut UserDirectory) -> AppResult<()> {
    dir.register(DEMO_ADMIN.0, DEMO_ADMIN.1, "Mealy Admin", Role::Admin)?;
    dir.register(DEMO_CUSTOMER.0, DEMO_CUSTOMER.1, "Mealy Customer", Role::Customer)?;
    info!(target: "mealy::auth", "seeded demo accounts {} and {}", DEMO_ADMIN.0, DEMO_CUSTOMER.0);
    Ok(())
}

impl<R: Renderer> Shell<R> {
    pub fn from_config(cfg: &ShellConfig, store: SessionStore, renderer: R) -> AppResult<Self> {
        let mut dir = match &cfg.users_file {
            Some(path) => UserDirectory::load(path)?,
            None => UserDirectory::new(),
        };
        if cfg.users_file.is_none() && cfg.seed_demo_users {
            seed_demo(&mut dir)?;
        }
        let auth = LocalAuthenticator::new(dir);
        let form = LoginForm::new(store.clone(), Arc::new(auth.clone())).with_timeout(cfg.auth_timeout);
        Ok(Self {
            dispatcher: Dispatcher::new(store),
            form: Arc::new(form),
            auth,
            users_file: cfg.users_file.clone(),
            renderer,
            drawn: None,
            pending: None,
        })
    }

    pub fn view(&self) -> View { self.dispatcher.view() }

    pub fn renderer(&self) -> &R { &self.renderer }

    pub fn is_login_pending(&self) -> bool { self.pending.is_some() }

    /// Draw the current screen if it differs from the last one drawn.
    pub fn redraw(&mut self) -> AppResult<()> {
        let view = self.dispatcher.view();
        if self.drawn.as_ref() == Some(&view) {
            return Ok(());
        }
        self.renderer.render(&view)?;
        self.drawn = Some(view);
        Ok(())
    }

    pub async fn execute(&mut self, cmd: Command) -> AppResult<Reply> {
        debug!(target: "mealy::shell", "execute {:?}", cmd_name(&cmd));
        let reply = match cmd {
            Command::ShowLogin => {
                self.dispatcher.show_login();
                Reply::Nothing
            }
            Command::Back => {
                self.supersede_pending();
                self.dispatcher.dismiss_login();
                Reply::Nothing
            }
            Command::Submit { email, password } => {
                self.require_login_view()?;
                let msg = format!("Signing in as {}...", email.trim());
                self.start_login(Credentials::new(email, password), false)?;
                Reply::Message(msg)
            }
            Command::Register { email, password, name, role } => {
                self.require_login_view()?;
                // no account is created for a login that could not start
                if self.form.is_pending() {
                    return Err(SubmitError::AlreadyInProgress.into());
                }
                let rec = self
                    .auth
                    .register(email.clone(), password.clone(), name, role, self.users_file.clone())
                    .await?;
                self.start_login(Credentials::new(email, password), true)?;
                Reply::Message(format!("Account created for {}. Signing in...", rec.email))
            }
            Command::Logout => {
                self.supersede_pending();
                if !self.dispatcher.store().current().is_authenticated() {
                    return Err(AppError::user("not_signed_in", "nobody is signed in"));
                }
                self.dispatcher.sign_out();
                Reply::Message("Signed out.".to_string())
            }
            Command::Status => Reply::Message(self.status_line()),
            Command::Help => Reply::Message(HELP.to_string()),
            Command::Quit => {
                self.supersede_pending();
                Reply::Quit
            }
        };
        self.redraw()?;
        Ok(reply)
    }

    /// Wait for the background login, if any, and report how it ended. `None` when
    /// nothing is pending. Safe to drop before it completes; the attempt stays pending.
    pub async fn settle_login(&mut self) -> Option<AppResult<Reply>> {
        let attempt = self.pending.as_mut()?;
        let joined = (&mut attempt.task).await;
        let registered = attempt.registered;
        self.pending = None;

        let reply = match joined {
            Ok(Ok(who)) if registered => Ok(Reply::Message(format!("Registration successful. {}", signed_in_message(&who)))),
            Ok(Ok(who)) => Ok(Reply::Message(signed_in_message(&who))),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(AppError::internal("login_task_failed".to_string(), e.to_string())),
        };
        if let Err(e) = self.redraw() {
            return Some(Err(e));
        }
        Some(reply)
    }

    fn start_login(&mut self, credentials: Credentials, registered: bool) -> AppResult<()> {
        let task = self.form.begin(credentials)?;
        self.pending = Some(Attempt { task, registered });
        Ok(())
    }

    fn supersede_pending(&self) {
        if self.pending.is_some() {
            debug!(target: "mealy::shell", "superseding pending login");
            self.form.cancel();
        }
    }

    fn require_login_view(&self) -> AppResult<()> {
        match self.dispatcher.view().identity {
            ViewIdentity::Login => Ok(()),
            ViewIdentity::Landing => Err(AppError::user("login_form_closed", "open the login form first with `login`")),
            ViewIdentity::CustomerDashboard | ViewIdentity::AdminDashboard => {
                Err(AppError::user("already_signed_in", "already signed in, `logout` first"))
            }
        }
    }

    fn status_line(&self) -> String {
        let view = self.dispatcher.view();
        let pending = if self.pending.is_some() { ", login pending" } else { "" };
        match &view.user {
            Some(u) => format!("signed in as {} ({}), view={}{}", u.id(), u.role(), view.identity.as_str(), pending),
            None => format!("anonymous, view={}{}", view.identity.as_str(), pending),
        }
    }
}

fn signed_in_message(who: &Identity) -> String {
    format!("Welcome, {}.", who.display_name().unwrap_or(who.id()))
}

fn cmd_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::ShowLogin => "login",
        Command::Back => "back",
        Command::Submit { .. } => "submit",
        Command::Register { .. } => "register",
        Command::Logout => "logout",
        Command::Status => "status",
        Command::Help => "help",
        Command::Quit => "quit",
    }
}
