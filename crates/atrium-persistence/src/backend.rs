//! Durable storage for datastores (§4.7).
//!
//! There's no external database in this stack, so durability is a JSON file
//! per `(blueprint, store)` under a data directory -- good enough for the
//! best-effort load / periodic-flush contract the spec describes, and it
//! keeps the crate dependency-free beyond what the rest of the workspace
//! already uses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::PersistenceError;
use crate::key::StoreKey;

pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path_for(&self, blueprint_id: &str, store: &str) -> PathBuf {
        self.data_dir.join(blueprint_id).join(format!("{store}.json"))
    }

    /// Best-effort load: a missing file is an empty store, not an error.
    pub async fn load_store(&self, blueprint_id: &str, store: &str) -> Result<HashMap<String, Value>, PersistenceError> {
        let path = self.path_for(blueprint_id, store);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Serialization {
                store: store.to_owned(),
                key: String::new(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(PersistenceError::Backend(format!("reading {}: {e}", path.display()))),
        }
    }

    /// Apply a coalesced batch of upserts/removes (`None` = remove), grouped
    /// by `(blueprint, store)`, merging each group against what's already on
    /// disk before writing back.
    pub async fn flush(&self, writes: Vec<(StoreKey, Option<Value>)>) -> Result<(), PersistenceError> {
        let mut groups: HashMap<(String, String), Vec<(String, Option<Value>)>> = HashMap::new();
        for (key, value) in writes {
            groups
                .entry((key.blueprint_id, key.store))
                .or_default()
                .push((key.key, value));
        }

        for ((blueprint_id, store), edits) in groups {
            let mut current = self.load_store(&blueprint_id, &store).await?;
            for (key, value) in edits {
                match value {
                    Some(v) => {
                        current.insert(key, v);
                    }
                    None => {
                        current.remove(&key);
                    }
                }
            }
            self.write_store(&blueprint_id, &store, &current).await?;
        }
        Ok(())
    }

    async fn write_store(&self, blueprint_id: &str, store: &str, values: &HashMap<String, Value>) -> Result<(), PersistenceError> {
        let path = self.path_for(blueprint_id, store);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::Backend(format!("creating {}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec(values).map_err(|e| PersistenceError::Serialization {
            store: store.to_owned(),
            key: String::new(),
            source: e,
        })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PersistenceError::Backend(format!("writing {}: {e}", path.display())))
    }
}

#[allow(dead_code)]
fn _assert_path_type(_: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("atrium-persistence-test-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn missing_store_loads_empty() {
        let backend = FileBackend::new(temp_dir("missing"));
        let values = backend.load_store("blueprint-1", "Inventory").await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn flush_then_load_round_trips() {
        let dir = temp_dir("roundtrip");
        let backend = FileBackend::new(&dir);
        backend
            .flush(vec![(
                StoreKey::new("blueprint-1", "Inventory", "gold"),
                Some(serde_json::json!(100)),
            )])
            .await
            .unwrap();

        let values = backend.load_store("blueprint-1", "Inventory").await.unwrap();
        assert_eq!(values.get("gold"), Some(&serde_json::json!(100)));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn remove_deletes_key_from_store() {
        let dir = temp_dir("remove");
        let backend = FileBackend::new(&dir);
        backend
            .flush(vec![(
                StoreKey::new("blueprint-1", "Inventory", "gold"),
                Some(serde_json::json!(100)),
            )])
            .await
            .unwrap();
        backend
            .flush(vec![(StoreKey::new("blueprint-1", "Inventory", "gold"), None)])
            .await
            .unwrap();

        let values = backend.load_store("blueprint-1", "Inventory").await.unwrap();
        assert!(values.get("gold").is_none());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
