use crate::store::{KvIter, KvStore, Keyspace, StoreError, StoreResult, WriteBatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SledConfig {
    pub path: PathBuf,
    pub cache_capacity_bytes: u64,
    /// Deletes the database directory on drop.
    pub temporary: bool,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("./data"), cache_capacity_bytes: 32 * 1024 * 1024, temporary: false }
    }
}

/// sled-backed store; each keyspace is a sled tree.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_config(&SledConfig { path: path.as_ref().to_path_buf(), ..SledConfig::default() })
    }

    pub fn with_config(config: &SledConfig) -> StoreResult<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity_bytes)
            .temporary(config.temporary)
            .open()?;
        tracing::debug!(path = %config.path.display(), temporary = config.temporary, "opened sled store");
        Ok(Self { db })
    }

    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

#[derive(Clone)]
pub struct SledKeyspace {
    name: String,
    tree: sled::Tree,
}

#[async_trait]
impl KvStore for SledStore {
    type Keyspace = SledKeyspace;

    async fn open_keyspace(&self, name: &str) -> StoreResult<SledKeyspace> {
        let tree = self.db.open_tree(name)?;
        Ok(SledKeyspace { name: name.to_string(), tree })
    }

    async fn flush(&self) -> StoreResult<()> {
        let bytes = self.db.flush_async().await?;
        tracing::debug!(bytes, "flushed sled store");
        Ok(())
    }
}

#[async_trait]
impl Keyspace for SledKeyspace {
    fn name(&self) -> &str { &self.name }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    async fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.into_puts() {
            sled_batch.insert(key, value);
        }
        self.tree.apply_batch(sled_batch)?;
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.tree.clear()?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvIter {
        Box::new(
            self.tree
                .scan_prefix(prefix)
                .map(|item| item.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(StoreError::from)),
        )
    }
}
