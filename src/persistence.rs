//! Small key-value persistence for view state that should survive restarts.
//!
//! Only the split position is stored today. Values are strings; callers
//! serialize with `serde_json` so any serde type fits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{clamp_split, ConfigError};

/// Storage key of the waterfall/graph split position.
pub const SPLIT_FRACTION_KEY: &str = "spectrum.split_fraction";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError>;
}

/// Read and decode a JSON value; missing or malformed entries yield `None`.
pub fn load_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, %err, "ignoring malformed stored value");
            None
        }
    }
}

pub fn save_value<T: Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), ConfigError> {
    store.set(key, serde_json::to_string(value)?)
}

pub fn load_split_fraction(store: &dyn KeyValueStore) -> Option<f32> {
    load_value::<f32>(store, SPLIT_FRACTION_KEY).map(clamp_split)
}

pub fn save_split_fraction(store: &mut dyn KeyValueStore, value: f32) -> Result<(), ConfigError> {
    save_value(store, SPLIT_FRACTION_KEY, &clamp_split(value))
}

/// In-memory store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value);
        self.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_round_trips_and_clamps() {
        let mut store = MemoryStore::default();
        assert_eq!(load_split_fraction(&store), None);
        save_split_fraction(&mut store, 0.25).unwrap();
        assert_eq!(load_split_fraction(&store), Some(0.25));
        save_split_fraction(&mut store, 7.0).unwrap();
        assert_eq!(load_split_fraction(&store), Some(1.0));
    }

    #[test]
    fn malformed_value_is_ignored() {
        let mut store = MemoryStore::default();
        store.set(SPLIT_FRACTION_KEY, "not json".into()).unwrap();
        assert_eq!(load_split_fraction(&store), None);
    }
}
