use crate::{builder::CookieError, store::StoreError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`Manager`](crate::Manager) and the ticket protocol.
///
/// Messages never include the ticket secret, derived keys, or store keys.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no session cookie present")]
    NoCookie,

    #[error("invalid session ticket: {0}")]
    Decode(String),

    #[error("session not found")]
    NotFound,

    #[error("session ciphertext failed authentication")]
    Crypto,

    #[error("session store error: {0}")]
    Store(#[source] StoreError),

    #[error("session encoding failed: {0}")]
    Encode(String),

    #[error("error creating a session ticket: {0}")]
    Ticket(String),

    #[error("error setting session cookie: {0}")]
    SetCookie(#[source] CookieError),

    #[error("error clearing session cookie: {0}")]
    ClearCookie(#[source] CookieError),

    #[error("error decoding ticket to clear session: {0}")]
    ClearDecode(#[source] Box<Error>),
}

impl Error {
    /// Whether this error means the request simply has no usable session.
    ///
    /// Callers should treat all of these the same way (e.g. redirect to sign in) and must not
    /// distinguish them to clients. Everything else is a backend or configuration failure.
    pub fn is_invalid_session(&self) -> bool {
        match self {
            Self::NoCookie | Self::Decode(_) | Self::NotFound | Self::Crypto => true,
            Self::ClearDecode(inner) => inner.is_invalid_session(),
            _ => false,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}
