use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::store::{OptionStore, StoreError};

/// Store-key prefix for cache records.
pub const CACHE_PREFIX: &str = "sump_cache_";

/// Default entry lifetime (1 hour).
pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt cache record")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// TTL cache over the option store.
///
/// Entries are checked lazily: an expired entry is removed the next time it
/// is read.
#[derive(Clone, TypedBuilder)]
pub struct Cache<S>
where
    S: OptionStore,
{
    #[builder(setter(into))]
    store: S,
    #[builder(default = Duration::seconds(DEFAULT_TTL_SECS))]
    default_ttl: Duration,
}

impl<S> Cache<S>
where
    S: OptionStore,
{
    pub fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let bytes = match self.store.load(&self.record_key(key))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes)?;

        if entry.expires_at <= Utc::now() {
            self.store.remove(&self.record_key(key))?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: Utc::now() + ttl,
        };

        let bytes = serde_json::to_vec(&entry)?;
        self.store.save(&self.record_key(key), &bytes)?;

        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(&self.record_key(key))?;

        Ok(())
    }

    pub fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns the cached value, computing and storing it first if absent
    /// or expired.
    pub fn remember<F>(&self, key: &str, compute: F) -> Result<Value, CacheError>
    where
        F: FnOnce() -> Value,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = compute();
        self.set(key, value.clone())?;

        Ok(value)
    }

    /// Removes every cache record, leaving other records in the store
    /// untouched.
    pub fn flush(&self) -> Result<(), CacheError> {
        for key in self.store.keys(CACHE_PREFIX)? {
            self.store.remove(&key)?;
        }

        Ok(())
    }

    fn record_key(&self, key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }
}
