use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::SameSite;

pub const DEFAULT_COOKIE_NAME: &str = "_session_ticket";

/// How long a session stays valid. Drives both the store TTL and the cookie `Max-Age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Fixed lifetime counted from the session's `created_at`; re-saving does not extend it.
    FromCreation(Duration),
    /// Sliding lifetime, restarted by every save.
    OnInactivity(Duration),
    /// Absolute deadline.
    AtDateTime(OffsetDateTime),
}

impl Default for Expiry {
    fn default() -> Self {
        Self::FromCreation(Duration::days(7))
    }
}

impl Expiry {
    /// Validity left at `now` for a session created at `created_at`, never negative.
    pub fn remaining(&self, created_at: OffsetDateTime, now: OffsetDateTime) -> Duration {
        let remaining = match *self {
            Self::FromCreation(lifetime) => created_at.saturating_add(lifetime) - now,
            Self::OnInactivity(idle) => idle,
            Self::AtDateTime(deadline) => deadline - now,
        };
        std::cmp::max(remaining, Duration::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct CookieSessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_cookie_bytes: usize,
}

impl Default for CookieSessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            http_only: true,
            same_site: SameSite::Lax,
            secure: true,
            path: "/".into(),
            domain: None,
            max_cookie_bytes: 4096,
        }
    }
}

impl CookieSessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Upper bound on the cookie value after signing or encryption, before percent-encoding.
    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn build_cookie(&self, value: String, max_age: Duration) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone())
            .max_age(std::cmp::max(max_age, Duration::ZERO));

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    pub(crate) fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie
    }
}
