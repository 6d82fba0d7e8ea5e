//! # Mealy
//!
//! Client-side shell of the Mealy food-ordering app. The session core decides which of the
//! landing page, login form, customer dashboard or admin dashboard is visible, and moves
//! between them as sign-in and sign-out happen.
//!
//! - [`identity`]: session store, credentials, authenticators and the login form.
//! - [`view`]: the pure view selector, dispatcher and renderer seam.
//! - [`cli`]: the interactive shell built on top of both.

pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod view;
