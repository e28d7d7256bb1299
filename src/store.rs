use std::{collections::HashMap, fmt::Debug, sync::Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No live entry exists for the key. Expired entries must report this too.
    #[error("no entry for key")]
    NotFound,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Key/value backend holding encrypted session payloads.
///
/// Implementations are shared by every request and must be safe for concurrent use. Writes to the
/// same key are last-write-wins. Dropping a returned future cancels the operation.
#[async_trait]
pub trait Store: Debug + Send + Sync + 'static {
    /// Create or overwrite `key`, expiring it after `ttl`.
    async fn save(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Fetch the value for `key`, or [`StoreError::NotFound`].
    async fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn clear(&self, key: &str) -> Result<()>;

    /// Check that the backend is reachable.
    async fn verify_connection(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: OffsetDateTime,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

/// In-process [`Store`] backed by a mutex-guarded map.
///
/// Expired entries are reported as missing. Every save sweeps them out of the map, so abandoned
/// sessions do not accumulate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.entries
            .lock()
            .map(|guard| guard.values().filter(|entry| entry.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored bytes for `key`, bypassing expiry. Useful for inspecting what is at rest.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .ok()?
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Overwrite the raw bytes of an existing entry, keeping its deadline.
    pub fn replace_raw(&self, key: &str, value: Vec<u8>) -> bool {
        match self.entries.lock() {
            Ok(mut guard) => match guard.get_mut(key) {
                Some(entry) => {
                    entry.value = value;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock is poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now.saturating_add(std::cmp::max(ttl, Duration::ZERO));

        let mut guard = self.lock()?;
        guard.retain(|_, entry| entry.is_live(now));
        guard.insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock()?;

        match guard.get(key) {
            Some(entry) if entry.is_live(now) => Ok(entry.value.clone()),
            Some(_) => {
                guard.remove(key);
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
