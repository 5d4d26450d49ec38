//! Persistence for user state (watchlist, lead submissions).
//!
//! [`KeyValueStore`] is the small get/set/remove interface every caller goes
//! through. [`FileStore`] keeps one JSON document per key on disk and
//! [`MemoryStore`] keeps them in process.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// String values addressed by key. Writes are last-write-wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Reads and decodes the JSON document at `key`.
///
/// Missing keys, read failures and malformed documents all yield
/// `T::default()`; the latter two are logged.
pub fn load_json<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored value, using empty default");
            return T::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(key, error = %e, "Stored value is not valid JSON, using empty default");
        T::default()
    })
}

/// Encodes `value` as JSON and writes it at `key`.
pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    store.set(key, &serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_json_defaults_on_missing_key() {
        let store = MemoryStore::new();
        let value: Vec<String> = load_json(&store, "absent");
        assert!(value.is_empty());
    }

    #[test]
    fn test_load_json_defaults_on_malformed_value() {
        let store = MemoryStore::new();
        store.set("broken", "{not json").unwrap();

        let value: Vec<String> = load_json(&store, "broken");
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save_json(&store, "names", &vec!["a", "b"]).unwrap();

        let value: Vec<String> = load_json(&store, "names");
        assert_eq!(value, vec!["a".to_string(), "b".to_string()]);
    }
}
