//! Bulk loading: clear every keyspace, stream the corpus through the document store and the
//! four field builders chunk by chunk, and retry the whole run on failure.
//!
//! ```text
//! Idle -> Initializing(n) -> Seeding(n) -> Ready
//!                 |               |
//!                 +---> Failed(n) +--> Initializing(n + 1)   (n < max_attempts)
//! ```

use crate::config::{EngineConfig, IndexConfig, LoaderConfig};
use crate::corpus::Corpus;
use crate::document::{DocId, Document, DocumentStore};
use crate::error::{Result, SearchError};
use crate::index::{BuildStats, Field, IndexBuilder};
use crate::persist::{save_meta, MetaFile};
use crate::store::{KvStore, Keyspace};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

pub const DOCUMENTS_KEYSPACE: &str = "documents";
pub const META_KEYSPACE: &str = "meta";

/// Waits between bulk-load attempts. Injected so retry policy can be tested without sleeping.
#[async_trait]
pub trait Delay: Send + Sync + 'static {
    async fn wait(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoaderState {
    Idle,
    Initializing { attempt: u32 },
    Seeding { attempt: u32 },
    Ready,
    Failed { attempt: u32 },
}

/// Every keyspace the engine uses, opened together.
#[derive(Clone)]
pub struct Namespaces<K> {
    pub documents: K,
    pub meta: K,
    fields: [K; 4],
}

impl<K: Keyspace> Namespaces<K> {
    pub async fn open<S: KvStore<Keyspace = K>>(store: &S) -> Result<Self> {
        let open = |name: &'static str| async move {
            store.open_keyspace(name).await.map_err(SearchError::store("open keyspace"))
        };
        Ok(Self {
            documents: open(DOCUMENTS_KEYSPACE).await?,
            meta: open(META_KEYSPACE).await?,
            fields: [
                open(Field::Title.keyspace_name()).await?,
                open(Field::Content.keyspace_name()).await?,
                open(Field::Author.keyspace_name()).await?,
                open(Field::Searchable.keyspace_name()).await?,
            ],
        })
    }

    /// Keyspace holding `field`'s posting lists.
    pub fn field(&self, field: Field) -> &K {
        let slot = match field {
            Field::Title => 0,
            Field::Content => 1,
            Field::Author => 2,
            Field::Searchable => 3,
        };
        &self.fields[slot]
    }

    pub async fn clear_all(&self) -> Result<()> {
        // Meta first: a crash past this point leaves the store visibly unseeded.
        for space in [&self.meta, &self.documents].into_iter().chain(&self.fields) {
            if let Err(source) = space.clear().await {
                tracing::warn!(keyspace = space.name(), error = %source, "clear failed");
                return Err(SearchError::Store { op: "clear keyspace", source });
            }
            tracing::debug!(keyspace = space.name(), "keyspace cleared");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub documents: u64,
    pub rejected: u64,
    pub chunks: u64,
    pub attempts: u32,
    pub fields: Vec<BuildStats>,
}

pub struct BulkLoader<D = TokioDelay> {
    loader: LoaderConfig,
    index: IndexConfig,
    delay: D,
    state: LoaderState,
    history: Vec<LoaderState>,
}

impl BulkLoader<TokioDelay> {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_delay(config, TokioDelay)
    }
}

impl<D: Delay> BulkLoader<D> {
    pub fn with_delay(config: &EngineConfig, delay: D) -> Self {
        Self {
            loader: config.loader.clone(),
            index: config.index.clone(),
            delay,
            state: LoaderState::Idle,
            history: vec![LoaderState::Idle],
        }
    }

    pub fn state(&self) -> LoaderState { self.state }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[LoaderState] { &self.history }

    fn enter(&mut self, state: LoaderState) {
        tracing::debug!(?state, "bulk loader transition");
        self.state = state;
        self.history.push(state);
    }

    /// Runs initialization until it succeeds or the attempt ceiling is hit. On success the
    /// returned namespaces hold a fully seeded store.
    pub async fn run<S, C>(&mut self, store: &S, corpus: &C) -> Result<(Namespaces<S::Keyspace>, LoadReport)>
    where
        S: KvStore,
        C: Corpus + ?Sized,
    {
        let max_attempts = self.loader.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(store, corpus, attempt).await {
                Ok((namespaces, mut report)) => {
                    report.attempts = attempt;
                    self.enter(LoaderState::Ready);
                    tracing::info!(
                        documents = report.documents,
                        rejected = report.rejected,
                        attempts = attempt,
                        "bulk load complete"
                    );
                    return Ok((namespaces, report));
                }
                Err(err) => {
                    self.enter(LoaderState::Failed { attempt });
                    tracing::warn!(attempt, max_attempts, error = %err, "bulk load attempt failed");
                    // The attempt's handles are gone by now; let the store settle before reopening.
                    if let Err(flush_err) = store.flush().await {
                        tracing::warn!(error = %flush_err, "store flush after failed attempt");
                    }
                    if attempt >= max_attempts {
                        return Err(SearchError::InitializationFailed { attempts: attempt, source: Box::new(err) });
                    }
                    let wait = self.loader.retry_delay(attempt);
                    tracing::info!(wait_ms = wait.as_millis() as u64, next_attempt = attempt + 1, "retrying bulk load");
                    self.delay.wait(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt<S, C>(&mut self, store: &S, corpus: &C, attempt: u32) -> Result<(Namespaces<S::Keyspace>, LoadReport)>
    where
        S: KvStore,
        C: Corpus + ?Sized,
    {
        self.enter(LoaderState::Initializing { attempt });
        let namespaces = Namespaces::open(store).await?;

        self.enter(LoaderState::Seeding { attempt });
        namespaces.clear_all().await?;

        let documents = DocumentStore::new(namespaces.documents.clone());
        let mut builders = Field::ALL.map(|field| IndexBuilder::new(field, namespaces.field(field).clone(), self.index.clone()));
        let mut report = LoadReport::default();
        let chunk_size = self.loader.chunk_size.max(1);
        let mut chunk: Vec<Document> = Vec::with_capacity(chunk_size);
        let mut seen: HashSet<DocId> = HashSet::new();

        tracing::info!(attempt, expected = ?corpus.size_hint(), chunk_size, "seeding");
        for item in corpus.documents() {
            let article = item?;
            match Document::try_from(article) {
                Ok(doc) if !seen.insert(doc.id()) => {
                    report.rejected += 1;
                    tracing::warn!(id = doc.id(), "rejecting duplicate document id");
                }
                Ok(doc) => chunk.push(doc),
                Err(err) => {
                    report.rejected += 1;
                    tracing::warn!(error = %err, "rejecting malformed document");
                }
            }
            if chunk.len() >= chunk_size {
                self.load_chunk(&documents, &mut builders, &chunk, &mut report).await?;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            self.load_chunk(&documents, &mut builders, &chunk, &mut report).await?;
        }

        let [title, content, author, searchable] = &mut builders;
        let stats = tokio::try_join!(title.finish(), content.finish(), author.finish(), searchable.finish())?;
        report.fields = vec![stats.0, stats.1, stats.2, stats.3];

        save_meta(&namespaces.meta, &MetaFile::new(report.documents, report.rejected)).await?;
        Ok((namespaces, report))
    }

    /// Writes the raw documents, then feeds the chunk to every field builder. The builders own
    /// disjoint keyspaces, so they run concurrently.
    async fn load_chunk<K: Keyspace>(
        &self,
        documents: &DocumentStore<K>,
        builders: &mut [IndexBuilder<K>; 4],
        chunk: &[Document],
        report: &mut LoadReport,
    ) -> Result<()> {
        documents.put_batch(chunk).await?;
        let [title, content, author, searchable] = builders;
        tokio::try_join!(
            title.add_batch(chunk),
            content.add_batch(chunk),
            author.add_batch(chunk),
            searchable.add_batch(chunk)
        )?;

        let before = report.documents;
        report.documents += chunk.len() as u64;
        report.chunks += 1;
        tracing::debug!(chunk = report.chunks, size = chunk.len(), "chunk loaded");
        let interval = self.loader.progress_interval;
        if interval > 0 && before / interval != report.documents / interval {
            tracing::info!(documents = report.documents, "bulk load progress");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Article;
    use crate::memory::MemoryStore;
    use crate::persist::load_meta;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct RecordingDelay(Arc<Mutex<Vec<Duration>>>);

    #[async_trait]
    impl Delay for RecordingDelay {
        async fn wait(&self, duration: Duration) {
            self.0.lock().push(duration);
        }
    }

    fn corpus(n: u64) -> Vec<Article> {
        (1..=n).map(|i| Article::new(i.to_string(), format!("title number{i}"), "some content here", "An Author")).collect()
    }

    fn config(chunk_size: usize, max_attempts: u32) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.loader.chunk_size = chunk_size;
        config.loader.max_attempts = max_attempts;
        config.loader.retry_base_delay_ms = 100;
        config
    }

    #[tokio::test]
    async fn happy_path_reaches_ready() {
        let store = MemoryStore::new();
        let mut loader = BulkLoader::with_delay(&config(4, 3), RecordingDelay::default());
        let (ns, report) = loader.run(&store, &corpus(10)).await.unwrap();

        assert_eq!(report.documents, 10);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.fields.len(), 4);
        assert_eq!(
            loader.history(),
            &[
                LoaderState::Idle,
                LoaderState::Initializing { attempt: 1 },
                LoaderState::Seeding { attempt: 1 },
                LoaderState::Ready
            ]
        );
        let meta = load_meta(&ns.meta).await.unwrap().unwrap();
        assert_eq!(meta.num_docs, 10);
    }

    #[tokio::test]
    async fn retries_with_linear_backoff_then_succeeds() {
        let store = MemoryStore::new();
        let delay = RecordingDelay::default();
        let mut loader = BulkLoader::with_delay(&config(4, 3), delay.clone());
        store.fail_next_writes(2);

        let (_, report) = loader.run(&store, &corpus(5)).await.unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(*delay.0.lock(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert!(loader.history().contains(&LoaderState::Failed { attempt: 2 }));
        assert_eq!(loader.state(), LoaderState::Ready);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_fatal() {
        let store = MemoryStore::new();
        let delay = RecordingDelay::default();
        let mut loader = BulkLoader::with_delay(&config(4, 2), delay.clone());
        store.fail_next_writes(usize::MAX);

        let err = loader.run(&store, &corpus(3)).await.err().unwrap();
        assert!(matches!(err, SearchError::InitializationFailed { attempts: 2, .. }));
        assert_eq!(loader.state(), LoaderState::Failed { attempt: 2 });
        assert_eq!(delay.0.lock().len(), 1);
        // Keyspaces are reopened on every attempt.
        assert_eq!(store.open_count(), 12);
    }

    #[tokio::test]
    async fn malformed_documents_are_rejected_not_fatal() {
        let store = MemoryStore::new();
        let mut docs = corpus(3);
        docs.push(Article::new("not-a-number", "bad", "", ""));
        let mut loader = BulkLoader::with_delay(&config(2, 1), RecordingDelay::default());
        let (_, report) = loader.run(&store, &docs).await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.rejected, 1);
    }

    #[tokio::test]
    async fn namespaces_open_named_keyspaces() {
        let store = MemoryStore::new();
        let ns = Namespaces::open(&store).await.unwrap();
        assert_eq!(ns.documents.name(), DOCUMENTS_KEYSPACE);
        assert_eq!(ns.meta.name(), META_KEYSPACE);
        for field in Field::ALL {
            assert_eq!(ns.field(field).name(), field.keyspace_name());
        }
        ns.documents.put(b"article:1", vec![1]).await.unwrap();
        ns.clear_all().await.unwrap();
        assert!(store.snapshot().values().all(|space| space.is_empty()));
    }

    #[tokio::test]
    async fn colliding_ids_keep_the_first_record() {
        let store = MemoryStore::new();
        let docs = vec![
            Article::new("7", "Redis internals", "c", "a"),
            Article::new("+7", "Postgres internals", "c", "a"),
            Article::new("007", "Kafka internals", "c", "a"),
            Article::new("7", "Another redis", "c", "a"),
        ];
        let mut loader = BulkLoader::with_delay(&config(2, 1), RecordingDelay::default());
        let (ns, report) = loader.run(&store, &docs).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.rejected, 3);

        let stored = DocumentStore::new(ns.documents.clone());
        let all: Vec<_> = stored.iter().map(|r| r.unwrap()).collect();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].0, all[0].1.title.as_str()), (7, "Redis internals"));
        assert_eq!(load_meta(&ns.meta).await.unwrap().unwrap().num_docs, 1);
    }

    #[tokio::test]
    async fn reseeding_replaces_previous_state() {
        let store = MemoryStore::new();
        let mut loader = BulkLoader::with_delay(&config(4, 1), RecordingDelay::default());
        loader.run(&store, &corpus(8)).await.unwrap();
        let (ns, _) = loader.run(&store, &corpus(2)).await.unwrap();
        let docs = DocumentStore::new(ns.documents.clone());
        assert_eq!(docs.iter().count(), 2);
    }
}
