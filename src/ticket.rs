//! Session tickets: the id/secret pair carried by the cookie.
//!
//! The id is the store key and is the only ticket material ever at rest. The secret only travels
//! inside the cookie; the payload key is derived from it with HKDF-SHA256 (salted with the id)
//! and used for AES-256-GCM with the id as associated data. Neither the secret nor the derived
//! key is persisted.

use std::future::Future;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use tower_cookies::Cookies;
use zeroize::Zeroizing;

use crate::{
    builder::{CookieBuilder, CookieError},
    config::Expiry,
    error::{Error, Result},
    format,
    state::SessionState,
    store::StoreError,
};

const ID_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;
const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;
const KEY_INFO: &[u8] = b"tower-sessions-ticket-store/v1 aes-256-gcm";

/// Outcome of looking for a ticket on a request.
#[derive(Debug)]
pub(crate) enum TicketLookup {
    Found(Ticket),
    /// No session cookie was sent.
    NoSession,
    /// A cookie was sent but does not hold a usable ticket.
    Invalid(Error),
}

pub struct Ticket {
    id: String,
    secret: Zeroizing<[u8; SECRET_BYTES]>,
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Ticket {
    /// Mint a fresh ticket namespaced under the builder's cookie name.
    pub fn new<B: CookieBuilder + ?Sized>(cookie_builder: &B) -> Result<Self> {
        Self::mint(cookie_builder.cookie_name())
    }

    fn mint(cookie_name: &str) -> Result<Self> {
        let mut raw_id = [0u8; ID_BYTES];
        let mut secret = Zeroizing::new([0u8; SECRET_BYTES]);

        OsRng
            .try_fill_bytes(&mut raw_id)
            .map_err(|err| Error::Ticket(err.to_string()))?;
        OsRng
            .try_fill_bytes(&mut secret[..])
            .map_err(|err| Error::Ticket(err.to_string()))?;

        Ok(Self {
            id: format!("{cookie_name}-{}", hex::encode(raw_id)),
            secret,
        })
    }

    /// The public half of the ticket, used as the store key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read the ticket from the request cookie.
    ///
    /// Fails with [`Error::NoCookie`] when no cookie was sent and [`Error::Decode`] when the
    /// cookie is present but unusable.
    pub fn decode_from_request<B: CookieBuilder + ?Sized>(
        cookies: &Cookies,
        cookie_builder: &B,
    ) -> Result<Self> {
        match Self::lookup(cookies, cookie_builder) {
            TicketLookup::Found(ticket) => Ok(ticket),
            TicketLookup::NoSession => Err(Error::NoCookie),
            TicketLookup::Invalid(err) => Err(err),
        }
    }

    pub(crate) fn lookup<B: CookieBuilder + ?Sized>(
        cookies: &Cookies,
        cookie_builder: &B,
    ) -> TicketLookup {
        let value = match cookie_builder.decode(cookies) {
            Ok(value) => value,
            Err(CookieError::Missing) => return TicketLookup::NoSession,
            Err(err) => return TicketLookup::Invalid(Error::Decode(err.to_string())),
        };

        match Self::parse(&value, cookie_builder.cookie_name()) {
            Ok(ticket) => TicketLookup::Found(ticket),
            Err(err) => TicketLookup::Invalid(err),
        }
    }

    fn parse(value: &str, cookie_name: &str) -> Result<Self> {
        let (id, secret) = format::decode_ticket_value(value)?;
        let secret = Zeroizing::new(secret);

        let raw_id = id
            .strip_prefix(cookie_name)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(|| Error::Decode("invalid ticket id".into()))?;
        // Minted ids are lowercase, so anything else was not issued here.
        if raw_id.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(Error::Decode("invalid ticket id".into()));
        }
        hex::decode_to_slice(raw_id, &mut [0u8; ID_BYTES])
            .map_err(|_| Error::Decode("invalid ticket id".into()))?;

        if secret.len() != SECRET_BYTES {
            return Err(Error::Decode("invalid ticket secret length".into()));
        }
        let mut fixed = Zeroizing::new([0u8; SECRET_BYTES]);
        fixed.copy_from_slice(&secret);

        Ok(Self {
            id: id.to_owned(),
            secret: fixed,
        })
    }

    fn encode(&self) -> String {
        format::encode_ticket_value(&self.id, &self.secret[..])
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let hkdf = Hkdf::<Sha256>::new(Some(self.id.as_bytes()), &self.secret[..]);
        let mut key = Zeroizing::new([0u8; KEY_BYTES]);
        hkdf.expand(KEY_INFO, &mut key[..])
            .map_err(|_| Error::Encode("session key derivation failed".into()))?;

        Aes256Gcm::new_from_slice(&key[..])
            .map_err(|_| Error::Encode("session key derivation failed".into()))
    }

    /// Encrypt `plaintext` as `nonce || ciphertext || tag`.
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|err| Error::Encode(err.to_string()))?;

        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: self.id.as_bytes(),
                },
            )
            .map_err(|_| Error::Encode("session encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_BYTES {
            return Err(Error::Crypto);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_BYTES);

        self.cipher()?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.id.as_bytes(),
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| Error::Crypto)
    }

    /// Encrypt `state` and hand it to `saver` under this ticket's id.
    ///
    /// The TTL is the validity `expiry` leaves the session at the time of the call.
    pub async fn save_session<F, Fut>(
        &self,
        state: &SessionState,
        expiry: &Expiry,
        saver: F,
    ) -> Result<()>
    where
        F: FnOnce(String, Vec<u8>, Duration) -> Fut,
        Fut: Future<Output = std::result::Result<(), StoreError>>,
    {
        let sealed = {
            let plaintext = Zeroizing::new(format::encode_state(state)?);
            self.seal(&plaintext)?
        };
        let ttl = remaining(state, expiry);

        saver(self.id.clone(), sealed, ttl).await.map_err(Error::from)
    }

    /// Fetch this ticket's entry through `loader` and decrypt it.
    pub async fn load_session<F, Fut>(&self, loader: F) -> Result<SessionState>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<u8>, StoreError>>,
    {
        let sealed = loader(self.id.clone()).await?;
        let plaintext = self.open(&sealed)?;
        format::decode_state(&plaintext)
    }

    /// Delete this ticket's entry through `deleter`. A missing entry is not an error.
    pub async fn clear_session<F, Fut>(&self, deleter: F) -> Result<()>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<(), StoreError>>,
    {
        match deleter(self.id.clone()).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(Error::Store(err)),
        }
    }

    /// Write the ticket cookie, expiring when the session does.
    pub fn set_cookie<B: CookieBuilder + ?Sized>(
        &self,
        cookies: &Cookies,
        cookie_builder: &B,
        state: &SessionState,
        expiry: &Expiry,
    ) -> Result<()> {
        cookie_builder
            .encode(cookies, self.encode(), remaining(state, expiry))
            .map_err(Error::SetCookie)
    }

    /// Remove the ticket cookie. Works whether or not a cookie was ever set.
    pub fn clear_cookie<B: CookieBuilder + ?Sized>(
        cookies: &Cookies,
        cookie_builder: &B,
    ) -> Result<()> {
        cookie_builder.clear(cookies).map_err(Error::ClearCookie)
    }
}

fn remaining(state: &SessionState, expiry: &Expiry) -> Duration {
    let now = OffsetDateTime::now_utc();
    expiry.remaining(state.created_at.unwrap_or(now), now)
}
