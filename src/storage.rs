//! Durable key-value storage and the "SDK already registered" flag kept in it.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use crate::{Error, Result};

/// Capability to persist small values across process restarts.
pub trait KeyValueStore: Send + Sync {
    /// Read a boolean. Missing keys read as `false`.
    fn get_bool(&self, key: &str) -> Result<bool>;

    /// Durably write a boolean.
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
}

/// A non-durable store. Useful for tests and for hosts that persist the flag themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryStore {
    #[allow(missing_docs)]
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Result<bool> {
        let values = self
            .values
            .read()
            .map_err(|err| Error::Storage(err.to_string()))?;
        Ok(values.get(key).copied().unwrap_or(false))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|err| Error::Storage(err.to_string()))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// A store keeping values in a single JSON document on disk.
///
/// Writes go to a sibling temporary file that is then renamed over the document, so a crash
/// mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> FileStore {
        FileStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[allow(missing_docs)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, bool>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get_bool(&self, key: &str) -> Result<bool> {
        let _guard = self
            .lock
            .lock()
            .map_err(|err| Error::Storage(err.to_string()))?;
        Ok(self.load()?.get(key).copied().unwrap_or(false))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|err| Error::Storage(err.to_string()))?;

        let mut values = self.load()?;
        values.insert(key.to_owned(), value);

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(&values)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// The persisted "SDK already registered with the backend" flag.
///
/// Goes from `false` to `true` once per install and is never reset.
#[derive(Clone)]
pub struct InitializationFlag {
    store: Arc<dyn KeyValueStore>,
}

impl InitializationFlag {
    /// Storage key of the flag.
    pub const KEY: &'static str = "GOMARKETME_SDK_INITIALIZED";

    #[allow(missing_docs)]
    pub fn new(store: Arc<dyn KeyValueStore>) -> InitializationFlag {
        InitializationFlag { store }
    }

    /// Whether registration already succeeded on this install.
    ///
    /// Storage failures read as "not registered": registering twice is harmless, skipping
    /// registration is not.
    pub fn is_set(&self) -> bool {
        self.store.get_bool(Self::KEY).unwrap_or_else(|err| {
            log::warn!(target: "gomarketme", "failed to read initialization flag: {:?}", err);
            false
        })
    }

    /// Record a successful registration.
    pub fn mark(&self) -> Result<()> {
        self.store.set_bool(Self::KEY, true)
    }
}
