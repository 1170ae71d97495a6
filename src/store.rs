use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Environment variable naming the directory a [`FileStore`] keeps its
/// records in.
pub const STATE_DIR_ENV: &str = "SUMP_STATE_DIR";

const DEFAULT_STATE_DIR: &str = ".sump";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("the shared state behind the store became poisoned")]
    PoisonedLock,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        Self::PoisonedLock
    }
}

/// Durable key-value store holding one named blob per record.
///
/// This is the persistence seam for everything in the crate: the queue blob,
/// cache entries, and settings all live behind it. An absent key is not an
/// error; `load` reports it as `None` and `remove` ignores it.
pub trait OptionStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists the keys of all records whose key starts with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// In-memory store. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let records = self.records.lock()?;

        Ok(records.get(key).cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut records = self.records.lock()?;
        records.insert(key.to_string(), value.to_vec());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock()?;
        records.remove(key);

        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock()?;

        Ok(records
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store keeping one file per record under a state directory.
///
/// Writes from clones of the same store are serialized behind a shared
/// in-process lock. Writes from other processes are not; concurrent
/// processes can lose updates, which is accepted for low-contention use.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Builds a store rooted at the directory named by `SUMP_STATE_DIR`,
    /// falling back to `.sump` in the working directory.
    pub fn from_env() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();

        let dir = env::var(STATE_DIR_ENV).unwrap_or_else(|_| DEFAULT_STATE_DIR.to_string());

        Self::new(dir)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl OptionStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock()?;

        fs::write(self.record_path(key), value)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock()?;

        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.starts_with(prefix) {
                keys.push(name);
            }
        }

        Ok(keys)
    }
}
