use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// The authenticated session payload persisted behind a ticket.
///
/// Only `created_at` has meaning to the manager: it is stamped on the first save and anchors
/// [`Expiry::FromCreation`](crate::Expiry::FromCreation). Everything in `data` belongs to the
/// caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `created_at` to `now` unless it is already set. Returns whether it was stamped.
    pub fn stamp_created_at(&mut self, now: OffsetDateTime) -> bool {
        if self.created_at.is_some() {
            return false;
        }
        self.created_at = Some(now);
        true
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| Error::Encode(err.to_string()))?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| Error::Decode(err.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
