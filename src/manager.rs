use std::{fmt, sync::Arc};

use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::{
    builder::CookieBuilder,
    config::Expiry,
    error::{Error, Result},
    state::SessionState,
    store::Store,
    ticket::{Ticket, TicketLookup},
};

/// Coordinates tickets, the [`Store`], and the [`CookieBuilder`] for one request at a time.
///
/// Holds no session data; cloning is cheap and every clone shares the same store and builder.
pub struct Manager<S, B> {
    store: Arc<S>,
    cookie_builder: Arc<B>,
    expiry: Expiry,
}

impl<S, B> Clone for Manager<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cookie_builder: Arc::clone(&self.cookie_builder),
            expiry: self.expiry,
        }
    }
}

impl<S: fmt::Debug, B> fmt::Debug for Manager<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("store", &self.store)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl<S: Store, B: CookieBuilder> Manager<S, B> {
    pub fn new(store: S, cookie_builder: B) -> Self {
        Self {
            store: Arc::new(store),
            cookie_builder: Arc::new(cookie_builder),
            expiry: Expiry::default(),
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cookie_builder(&self) -> &B {
        &self.cookie_builder
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Check that the backing store is reachable.
    pub async fn verify_connection(&self) -> Result<()> {
        self.store.verify_connection().await.map_err(Error::from)
    }

    /// Persist `state` and point the response cookie at it.
    ///
    /// Reuses the request's ticket when it has a valid one, otherwise mints a new ticket.
    /// `created_at` is stamped on the first save only. The cookie is not written if the store
    /// write fails.
    pub async fn save(&self, cookies: &Cookies, state: &mut SessionState) -> Result<()> {
        state.stamp_created_at(OffsetDateTime::now_utc());

        let ticket = match Ticket::lookup(cookies, &*self.cookie_builder) {
            TicketLookup::Found(ticket) => ticket,
            TicketLookup::NoSession => {
                tracing::debug!("no session cookie, minting a new ticket");
                Ticket::new(&*self.cookie_builder)?
            }
            TicketLookup::Invalid(err) => {
                tracing::warn!(err = %err, "discarding invalid session ticket");
                Ticket::new(&*self.cookie_builder)?
            }
        };

        let store = &*self.store;
        ticket
            .save_session(state, &self.expiry, |key, value, ttl| async move {
                store.save(&key, &value, ttl).await
            })
            .await?;

        ticket.set_cookie(cookies, &*self.cookie_builder, state, &self.expiry)
    }

    /// Load the session the request's cookie points at.
    pub async fn load(&self, cookies: &Cookies) -> Result<SessionState> {
        let ticket = Ticket::decode_from_request(cookies, &*self.cookie_builder)?;

        let store = &*self.store;
        ticket
            .load_session(|key| async move { store.load(&key).await })
            .await
    }

    /// Remove the session cookie and its store entry.
    ///
    /// The cookie is always cleared, even when it cannot be decoded. A request without a cookie
    /// is not an error. When the cookie cannot be cleared the store entry is left alone, so a
    /// live cookie never outlives its entry.
    pub async fn clear(&self, cookies: &Cookies) -> Result<()> {
        let ticket = match Ticket::lookup(cookies, &*self.cookie_builder) {
            TicketLookup::Found(ticket) => ticket,
            TicketLookup::NoSession => {
                return Ticket::clear_cookie(cookies, &*self.cookie_builder);
            }
            TicketLookup::Invalid(err) => {
                Ticket::clear_cookie(cookies, &*self.cookie_builder)?;
                return Err(Error::ClearDecode(Box::new(err)));
            }
        };

        Ticket::clear_cookie(cookies, &*self.cookie_builder)?;

        let store = &*self.store;
        ticket
            .clear_session(|key| async move { store.clear(&key).await })
            .await
            .inspect_err(|err| tracing::error!(err = %err, "session store delete failed"))
    }
}
