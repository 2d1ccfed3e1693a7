use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Well-known key holding the last granted `GeoCoordinate` as JSON.
/// No expiry and no schema version tag; unparsable content reads as absent.
pub const USER_LOCATION_KEY: &str = "userLocation";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access device store: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// # Device Store
///
/// A small key/value store persisted as one JSON object file. Reads are
/// tolerant: a missing file, undecodable file, or undecodable value is
/// treated as "no value stored" rather than an error, so stale or corrupt
/// state can never break a read path.
pub struct DeviceStore {
    path: PathBuf,
}

impl DeviceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location under the platform's local data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dalil")
            .join("device_store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Missing or unreadable files yield an empty map; writes recreate it.
    fn load(&self) -> Map<String, Value> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Raw JSON value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.load().remove(key)
    }

    /// Decoded value stored under `key`; corrupt content reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).ok()
    }

    /// Stores `value` under `key`, overwriting any previous value.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut map = self.load();
        map.insert(key.to_string(), serde_json::to_value(value)?);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;
        Ok(())
    }
}
