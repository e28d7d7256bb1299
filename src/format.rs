//! Helpers for encoding/decoding the ticket cookie value and the stored session payload.
//!
//! This is primarily useful for testing and debugging.
//!
//! Note: the stored payload is versioned, but both formats are still considered implementation
//! details and may evolve.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    state::SessionState,
};

const VERSION: u8 = 1;

/// Separates the ticket id from the encoded secret. Never produced by hex or URL-safe base64.
const TICKET_SEPARATOR: char = '.';

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    state: SessionState,
}

/// Serialize a [`SessionState`] into the plaintext that gets sealed into the store.
pub fn encode_state(state: &SessionState) -> Result<Vec<u8>> {
    let envelope = Envelope {
        v: VERSION,
        state: state.clone(),
    };

    serde_json::to_vec(&envelope).map_err(|err| Error::Encode(err.to_string()))
}

/// Deserialize plaintext produced by [`encode_state`].
pub fn decode_state(bytes: &[u8]) -> Result<SessionState> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|err| Error::Decode(err.to_string()))?;

    if envelope.v != VERSION {
        return Err(Error::Decode(format!(
            "Unsupported session payload version: {}",
            envelope.v
        )));
    }

    Ok(envelope.state)
}

/// Join a ticket id and secret into the cookie value.
pub fn encode_ticket_value(id: &str, secret: &[u8]) -> String {
    format!("{id}{TICKET_SEPARATOR}{}", URL_SAFE_NO_PAD.encode(secret))
}

/// Split a cookie value into the ticket id and raw secret bytes.
///
/// Splits on the last separator since the id embeds the cookie name, which may contain dots.
pub fn decode_ticket_value(value: &str) -> Result<(&str, Vec<u8>)> {
    let (id, secret) = value
        .rsplit_once(TICKET_SEPARATOR)
        .ok_or_else(|| Error::Decode("invalid ticket format".into()))?;

    let secret = URL_SAFE_NO_PAD
        .decode(secret.as_bytes())
        .map_err(|_| Error::Decode("invalid ticket secret encoding".into()))?;

    Ok((id, secret))
}
