//! Cookie transport for session tickets.
//!
//! The [`CookieBuilder`] trait is everything the ticket protocol needs from the HTTP cookie layer.
//! [`SessionCookieBuilder`] implements it on top of `tower-cookies` jars.

use std::fmt::Debug;

use time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::config::CookieSessionConfig;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CookieError {
    /// The request carries no session cookie.
    #[error("session cookie is missing")]
    Missing,

    /// A session cookie is present but failed verification or decryption.
    #[error("session cookie failed verification")]
    Invalid,

    #[error("cookie value exceeds max_cookie_bytes ({len} > {max})")]
    TooLarge { len: usize, max: usize },

    #[error("{0}")]
    Other(String),
}

/// Reads, writes, and removes the logical session cookie value.
///
/// Implementations own signing, encryption, and cookie attributes. `decode` must report
/// [`CookieError::Missing`] only when no cookie was sent at all.
pub trait CookieBuilder: Send + Sync + 'static {
    fn cookie_name(&self) -> &str;

    fn decode(&self, cookies: &Cookies) -> Result<String, CookieError>;

    fn encode(
        &self,
        cookies: &Cookies,
        value: String,
        max_age: Duration,
    ) -> Result<(), CookieError>;

    fn clear(&self, cookies: &Cookies) -> Result<(), CookieError>;
}

/// How the cookie value is protected in the browser.
#[derive(Clone)]
#[non_exhaustive]
pub enum Protection {
    #[cfg(feature = "signed")]
    Signed(crate::Key),
    #[cfg(feature = "private")]
    Private(crate::Key),
    /// No integrity protection at all. Testing and debugging only.
    #[cfg(feature = "dangerous-plaintext")]
    DangerousPlaintext,
}

impl Debug for Protection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys stay out of logs.
        let name = match self {
            #[cfg(feature = "signed")]
            Self::Signed(_) => "Signed",
            #[cfg(feature = "private")]
            Self::Private(_) => "Private",
            #[cfg(feature = "dangerous-plaintext")]
            Self::DangerousPlaintext => "DangerousPlaintext",
        };
        f.write_str(name)
    }
}

// Signed values are prefixed with a base64 HMAC-SHA256 tag; private values are base64 of
// `nonce(12) || ciphertext || tag(16)`.
#[cfg(feature = "signed")]
const SIGNATURE_LEN: usize = 44;
#[cfg(feature = "private")]
const SEAL_OVERHEAD: usize = 12 + 16;

impl Protection {
    /// Length of the cookie value once `len` bytes have been protected.
    fn protected_len(&self, len: usize) -> usize {
        match self {
            #[cfg(feature = "signed")]
            Self::Signed(_) => SIGNATURE_LEN + len,
            #[cfg(feature = "private")]
            Self::Private(_) => (len + SEAL_OVERHEAD).div_ceil(3) * 4,
            #[cfg(feature = "dangerous-plaintext")]
            Self::DangerousPlaintext => len,
        }
    }

    fn get(&self, cookies: &Cookies, name: &str) -> Option<Cookie<'static>> {
        match self {
            #[cfg(feature = "signed")]
            Self::Signed(key) => cookies.signed(key).get(name),
            #[cfg(feature = "private")]
            Self::Private(key) => cookies.private(key).get(name),
            #[cfg(feature = "dangerous-plaintext")]
            Self::DangerousPlaintext => cookies.get(name).map(Cookie::into_owned),
        }
    }

    fn add(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        match self {
            #[cfg(feature = "signed")]
            Self::Signed(key) => cookies.signed(key).add(cookie),
            #[cfg(feature = "private")]
            Self::Private(key) => cookies.private(key).add(cookie),
            #[cfg(feature = "dangerous-plaintext")]
            Self::DangerousPlaintext => cookies.add(cookie),
        }
    }

    fn remove(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        match self {
            #[cfg(feature = "signed")]
            Self::Signed(key) => cookies.signed(key).remove(cookie),
            #[cfg(feature = "private")]
            Self::Private(key) => cookies.private(key).remove(cookie),
            #[cfg(feature = "dangerous-plaintext")]
            Self::DangerousPlaintext => cookies.remove(cookie),
        }
    }
}

/// [`CookieBuilder`] backed by `tower-cookies`.
#[derive(Debug, Clone)]
pub struct SessionCookieBuilder {
    config: CookieSessionConfig,
    protection: Protection,
}

impl SessionCookieBuilder {
    pub fn new(protection: Protection) -> Self {
        Self {
            config: CookieSessionConfig::default(),
            protection,
        }
    }

    #[cfg(feature = "signed")]
    pub fn signed(key: crate::Key) -> Self {
        Self::new(Protection::Signed(key))
    }

    #[cfg(feature = "private")]
    pub fn private(key: crate::Key) -> Self {
        Self::new(Protection::Private(key))
    }

    /// Plaintext cookies: a client can forge any ticket it likes. Never use this in production.
    #[cfg(feature = "dangerous-plaintext")]
    pub fn dangerous_plaintext() -> Self {
        Self::new(Protection::DangerousPlaintext)
    }

    #[must_use]
    pub fn with_config(mut self, config: CookieSessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CookieSessionConfig {
        &self.config
    }
}

impl CookieBuilder for SessionCookieBuilder {
    fn cookie_name(&self) -> &str {
        self.config.name()
    }

    fn decode(&self, cookies: &Cookies) -> Result<String, CookieError> {
        if cookies.get(self.config.name()).is_none() {
            return Err(CookieError::Missing);
        }

        self.protection
            .get(cookies, self.config.name())
            .map(|cookie| cookie.value().to_owned())
            .ok_or(CookieError::Invalid)
    }

    fn encode(
        &self,
        cookies: &Cookies,
        value: String,
        max_age: Duration,
    ) -> Result<(), CookieError> {
        let len = self.protection.protected_len(value.len());
        if len > self.config.max_cookie_bytes {
            return Err(CookieError::TooLarge {
                len,
                max: self.config.max_cookie_bytes,
            });
        }

        let cookie = self.config.build_cookie(value, max_age);
        self.protection.add(cookies, cookie);
        Ok(())
    }

    fn clear(&self, cookies: &Cookies) -> Result<(), CookieError> {
        self.protection.remove(cookies, self.config.removal_cookie());
        Ok(())
    }
}
