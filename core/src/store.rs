//! The key-value store contract the engine is written against.
//!
//! A store hands out named keyspaces (sled trees, LevelDB sublevels, ...). Every keyspace is an
//! independent ordered map from byte keys to byte values.

use async_trait::async_trait;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type KvPair = (Vec<u8>, Vec<u8>);
/// Lazy, ordered, finite sequence of key/value pairs.
pub type KvIter = Box<dyn Iterator<Item = StoreResult<KvPair>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A group of puts applied atomically.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    puts: Vec<KvPair>,
}

impl WriteBatch {
    pub fn new() -> Self { Self::default() }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.puts.push((key.into(), value));
    }

    pub fn len(&self) -> usize { self.puts.len() }

    pub fn is_empty(&self) -> bool { self.puts.is_empty() }

    pub fn into_puts(self) -> Vec<KvPair> { self.puts }
}

#[async_trait]
pub trait Keyspace: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    async fn put(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()>;

    /// Applies every put in `batch` or none of them.
    async fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;

    /// Iterates keys starting with `prefix` in ascending byte order. Each call starts over.
    fn scan_prefix(&self, prefix: &[u8]) -> KvIter;
}

#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    type Keyspace: Keyspace;

    /// Opens a keyspace, creating it if it does not exist yet.
    async fn open_keyspace(&self, name: &str) -> StoreResult<Self::Keyspace>;

    /// Persists buffered writes. Called between bulk-load attempts after handles are dropped.
    async fn flush(&self) -> StoreResult<()>;
}
