use crate::config::EngineConfig;
use crate::corpus::Corpus;
use crate::document::DocId;
use crate::error::{Result, SearchError};
use crate::index::{Field, FieldIndex};
use crate::listing::{all_records, RecordPage};
use crate::loader::{BulkLoader, Delay, LoadReport, LoaderState, Namespaces, TokioDelay};
use crate::persist::{load_meta, MetaFile};
use crate::query::{QueryEngine, SearchResults};
use crate::store::KvStore;

/// The search component: owns the store, runs bulk loads, and serves queries once ready.
///
/// Construct one at startup and share it (behind an `Arc`) only after `initialize` or `attach`
/// returned, so no reader ever overlaps a bulk load.
pub struct SearchEngine<S: KvStore, D = TokioDelay> {
    store: S,
    config: EngineConfig,
    loader: BulkLoader<D>,
    serving: Option<Serving<S::Keyspace>>,
    report: Option<LoadReport>,
}

struct Serving<K> {
    namespaces: Namespaces<K>,
    query: QueryEngine<K>,
}

impl<S: KvStore> SearchEngine<S, TokioDelay> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        Self::with_delay(store, config, TokioDelay)
    }
}

impl<S: KvStore, D: Delay> SearchEngine<S, D> {
    pub fn with_delay(store: S, config: EngineConfig, delay: D) -> Result<Self> {
        config.validate()?;
        let loader = BulkLoader::with_delay(&config, delay);
        Ok(Self { store, config, loader, serving: None, report: None })
    }

    /// Clears all prior state and bulk-loads `corpus`. May be called again to re-seed.
    pub async fn initialize<C: Corpus + ?Sized>(&mut self, corpus: &C) -> Result<&LoadReport> {
        self.serving = None;
        self.report = None;
        let (namespaces, report) = self.loader.run(&self.store, corpus).await?;
        self.serve(namespaces);
        Ok(self.report.insert(report))
    }

    /// Serves a store seeded by an earlier run without re-seeding it. Fails with
    /// `NotInitialized` when that run never completed.
    pub async fn attach(&mut self) -> Result<MetaFile> {
        let namespaces = Namespaces::open(&self.store).await?;
        let meta = load_meta(&namespaces.meta).await?.ok_or(SearchError::NotInitialized)?;
        tracing::info!(documents = meta.num_docs, created_at = %meta.created_at, "attached to seeded store");
        self.serve(namespaces);
        Ok(meta)
    }

    fn serve(&mut self, namespaces: Namespaces<S::Keyspace>) {
        let query = QueryEngine::new(&namespaces, self.config.weights, self.config.query.clone());
        self.serving = Some(Serving { namespaces, query });
    }

    fn serving(&self) -> Result<&Serving<S::Keyspace>> {
        self.serving.as_ref().ok_or(SearchError::NotInitialized)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        self.serving()?.query.search(query, limit).await
    }

    pub async fn all_records(&self, limit: usize, offset: usize) -> Result<RecordPage> {
        all_records(self.serving()?.query.documents(), limit, offset).await
    }

    /// Raw posting list of one term in one field.
    pub async fn postings(&self, field: Field, term: &str) -> Result<Vec<DocId>> {
        let serving = self.serving()?;
        FieldIndex::new(field, serving.namespaces.field(field).clone()).postings(term).await
    }

    pub fn is_ready(&self) -> bool { self.serving.is_some() }

    /// Loader state of the last `initialize`; `Ready` after a successful `attach` too.
    pub fn state(&self) -> LoaderState {
        if self.serving.is_some() { LoaderState::Ready } else { self.loader.state() }
    }

    pub fn loader_history(&self) -> &[LoaderState] { self.loader.history() }

    pub fn report(&self) -> Option<&LoadReport> { self.report.as_ref() }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn store(&self) -> &S { &self.store }
}
