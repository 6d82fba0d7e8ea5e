//! Who is signed in, and how they get there.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod directory;
mod submission;

pub use principal::{Credentials, Identity, Role};
pub use session::{SessionState, SessionStore};
pub use provider::{AuthError, Authenticator, LocalAuthenticator};
pub use directory::{UserDirectory, UserRecord};
pub use submission::{LoginForm, PendingLogin, SubmissionResult, SubmitError};
