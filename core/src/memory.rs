//! In-process store used by tests and small embedded deployments.
//!
//! Besides the plain map semantics it can inject failures: a number of upcoming writes can be
//! made to fail, and reads can be switched off entirely, which is how bulk-load retries and
//! query-time store outages are exercised without a real backend.

use crate::store::{KvIter, KvStore, Keyspace, StoreError, StoreResult, WriteBatch};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type Space = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

#[derive(Default)]
struct Inner {
    spaces: Mutex<HashMap<String, Space>>,
    failing_writes: AtomicUsize,
    failing_reads: AtomicBool,
    opens: AtomicUsize,
    batches: AtomicUsize,
}

impl Inner {
    fn check_write(&self) -> StoreResult<()> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Makes the next `count` puts or batch writes fail with `StoreError::Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.inner.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Number of `open_keyspace` calls so far.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Number of batches applied successfully so far, across all keyspaces.
    pub fn batch_count(&self) -> usize {
        self.inner.batches.load(Ordering::SeqCst)
    }

    /// Copy of every keyspace's contents, keyed by keyspace name.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>> {
        self.inner
            .spaces
            .lock()
            .iter()
            .map(|(name, space)| (name.clone(), space.read().clone()))
            .collect()
    }

    /// Removes a single key behind the engine's back.
    pub fn remove(&self, keyspace: &str, key: &[u8]) -> Option<Vec<u8>> {
        let space = self.inner.spaces.lock().get(keyspace).cloned()?;
        let removed = space.write().remove(key);
        removed
    }
}

#[derive(Clone)]
pub struct MemoryKeyspace {
    name: String,
    data: Space,
    inner: Arc<Inner>,
}

#[async_trait]
impl KvStore for MemoryStore {
    type Keyspace = MemoryKeyspace;

    async fn open_keyspace(&self, name: &str) -> StoreResult<MemoryKeyspace> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let data = self.inner.spaces.lock().entry(name.to_string()).or_default().clone();
        Ok(MemoryKeyspace { name: name.to_string(), data, inner: self.inner.clone() })
    }

    async fn flush(&self) -> StoreResult<()> { Ok(()) }
}

#[async_trait]
impl Keyspace for MemoryKeyspace {
    fn name(&self) -> &str { &self.name }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.check_read()?;
        Ok(self.data.read().get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.inner.check_write()?;
        self.data.write().insert(key.to_vec(), value);
        Ok(())
    }

    async fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.check_write()?;
        let mut data = self.data.write();
        for (key, value) in batch.into_puts() {
            data.insert(key, value);
        }
        self.inner.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.data.write().clear();
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvIter {
        if let Err(err) = self.inner.check_read() {
            return Box::new(std::iter::once(Err(err)));
        }
        // Snapshot of the matching range; fine for the sizes this store is meant for.
        let rows: Vec<StoreResult<(Vec<u8>, Vec<u8>)>> = self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Box::new(rows.into_iter())
    }
}
