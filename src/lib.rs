//! Server-side session persistence for `tower`, referenced by encrypted cookie tickets.
//!
//! The browser cookie never carries session data. It carries a *ticket*: a public id, which is
//! the key of the session entry in a pluggable [`Store`], and a private secret from which the key
//! encrypting that entry is derived. Reading the store alone reveals nothing; a session can only
//! be decrypted by whoever holds the cookie.
//!
//! [`Manager`] implements save, load, and clear over any [`Store`] and [`CookieBuilder`].
//! [`SessionManagerLayer`] puts a request-scoped [`TicketSession`] into request extensions.
//!
//! # Security
//! The default cookie builder signs the ticket (`signed` feature); `private` encrypts it as
//! well.
//!
//! The `dangerous-plaintext` feature enables an unprotected cookie. Tickets are still
//! unguessable, but a client can swap in any other ticket it has seen. Only use it for
//! **testing and debugging**.

#[cfg(not(any(feature = "signed", feature = "private", feature = "dangerous-plaintext")))]
compile_error!("enable at least one of the `signed`, `private` or `dangerous-plaintext` features");

mod builder;
mod config;
mod error;
pub mod format;
pub mod layer;
mod manager;
mod state;
mod store;
mod ticket;

pub use tower_cookies::{Cookies, cookie::SameSite};

#[cfg(any(feature = "signed", feature = "private"))]
pub use tower_cookies::Key;

pub use crate::builder::{CookieBuilder, CookieError, Protection, SessionCookieBuilder};
pub use crate::config::{CookieSessionConfig, DEFAULT_COOKIE_NAME, Expiry};
pub use crate::error::{Error, Result};
pub use crate::layer::{SessionManagerLayer, TicketSession};
pub use crate::manager::Manager;
pub use crate::state::SessionState;
pub use crate::store::{MemoryStore, Store, StoreError};
pub use crate::ticket::Ticket;
