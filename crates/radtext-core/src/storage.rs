use crate::config::{ensure_config_dir, get_db_file_path};
use crate::error::{RadtextError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// String blobs keyed by name: the persistence surface of an editor session
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, blob: &str) -> Result<()>;
}

/// Read `key` and decode it as JSON
pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key)? {
        Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and write it under `key`
pub fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let blob = serde_json::to_string(value)?;
    store.set(key, &blob)
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: &str) -> Result<()> {
        self.entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/// Store backed by one JSON object file, rewritten on every `set`
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the database in the radtext configuration directory, creating it if needed
    pub fn open_default() -> Result<Self> {
        ensure_config_dir()?;
        Self::open(get_db_file_path())
    }

    /// Open the database at `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    RadtextError::Other(format!(
                        "Database {} is not a JSON object of strings: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: &str) -> Result<()> {
        let previous = self.entries.insert(key.to_string(), blob.to_string());
        if let Err(e) = self.save() {
            // keep memory and disk in step
            match previous {
                Some(previous) => self.entries.insert(key.to_string(), previous),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        tracing::trace!("Saved '{}' to {}", key, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "[1]").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("[1]".to_string()));
    }

    #[test]
    fn test_json_helpers() {
        let mut store = MemoryStore::new();
        save_json(&mut store, "ids", &vec!["x", "y"]).unwrap();
        let ids: Option<Vec<String>> = load_json(&store, "ids").unwrap();
        assert_eq!(ids, Some(vec!["x".to_string(), "y".to_string()]));

        store.set("broken", "{not json").unwrap();
        assert!(load_json::<_, Vec<String>>(&store, "broken").is_err());
        assert!(load_json::<_, Vec<String>>(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("radtext.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("autoTextoTriggers").unwrap(), None);
        store.set("autoTextoTriggers", "[]").unwrap();
        store.set("measurements", "[]").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("autoTextoTriggers").unwrap(), Some("[]".to_string()));
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("radtext.json");
        fs::write(&path, "  \n").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("radtext.json");
        fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(RadtextError::Other(_))));
    }
}
