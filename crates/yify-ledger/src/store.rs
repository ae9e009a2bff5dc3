//! Snapshot storage
//!
//! Key/value snapshots of ledger state. Values are JSON documents keyed by
//! the storage names below.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;
use yify_common::{Result, YifyError};

pub const WALLET_KEY: &str = "wallet-storage";
pub const TRANSACTION_KEY: &str = "transaction-storage";
pub const NFT_KEY: &str = "nft-storage";
pub const POSITION_KEY: &str = "position-storage";
pub const LENDER_KEY: &str = "lender-storage";

/// Every key the simulator writes
pub const ALL_KEYS: [&str; 5] = [WALLET_KEY, TRANSACTION_KEY, NFT_KEY, POSITION_KEY, LENDER_KEY];

/// Trait for snapshot storage backends
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load a snapshot, `None` if never saved
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store a snapshot, replacing any previous one
    async fn save(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a snapshot; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize and save a value under `key`
pub async fn save_typed<T: Serialize + ?Sized>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<()> {
    store.save(key, serde_json::to_value(value)?).await
}

/// Load and deserialize the value under `key`
pub async fn load_typed<T: DeserializeOwned>(store: &dyn SnapshotStore, key: &str) -> Result<Option<T>> {
    match store.load(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Remove every simulator key
pub async fn reset_all(store: &dyn SnapshotStore) -> Result<()> {
    for key in ALL_KEYS {
        store.remove(key).await?;
    }
    debug!("Snapshot store reset");
    Ok(())
}

/// In-memory storage implementation
#[derive(Default)]
pub struct InMemorySnapshotStore {
    entries: DashMap<String, Value>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store rooted at `dir`, creating it if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(YifyError::Storage(format!("Invalid snapshot key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec_pretty(&value)?;

        // Write then rename
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "Snapshot saved");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use yify_common::Wallet;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = InMemorySnapshotStore::new();
        let wallet = Wallet::new("Rabby", "0xabc", dec!(42));

        save_typed(&store, WALLET_KEY, &wallet).await.unwrap();
        let loaded: Option<Wallet> = load_typed(&store, WALLET_KEY).await.unwrap();
        assert_eq!(loaded, Some(wallet));

        let missing: Option<Wallet> = load_typed(&store, NFT_KEY).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reset_all() {
        let store = InMemorySnapshotStore::new();
        for key in ALL_KEYS {
            store.save(key, Value::Bool(true)).await.unwrap();
        }
        store.save("unrelated", Value::Null).await.unwrap();

        reset_all(&store).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();

        store.save(POSITION_KEY, serde_json::json!([1, 2, 3])).await.unwrap();
        assert!(dir.path().join("position-storage.json").exists());
        assert_eq!(
            store.load(POSITION_KEY).await.unwrap(),
            Some(serde_json::json!([1, 2, 3]))
        );

        store.remove(POSITION_KEY).await.unwrap();
        store.remove(POSITION_KEY).await.unwrap();
        assert!(store.load(POSITION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.load("../escape").await,
            Err(YifyError::Storage(_))
        ));
    }
}
