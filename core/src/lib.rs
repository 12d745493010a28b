//! Full-text search over a primitive ordered key-value store.
//!
//! The crate builds one inverted index per searchable field on top of a store that only
//! offers get / put / batch / clear / ordered iteration, bulk-loads a corpus into it under a
//! bounded memory budget, and answers multi-field ranked queries.

pub mod config;
pub mod corpus;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod listing;
pub mod loader;
pub mod memory;
pub mod persist;
pub mod query;
pub mod sled_store;
pub mod store;
pub mod tokenizer;

pub use config::{EngineConfig, FieldWeights, IndexConfig, LoaderConfig, MatchMode, QueryConfig};
pub use corpus::{Corpus, SyntheticCorpus};
pub use document::{Article, DocId, Document, DocumentStore};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use index::{BuildStats, Field, FieldIndex, IndexBuilder};
pub use listing::RecordPage;
pub use loader::{BulkLoader, Delay, LoadReport, LoaderState, TokioDelay};
pub use memory::MemoryStore;
pub use persist::MetaFile;
pub use query::{QueryEngine, SearchResults};
pub use sled_store::{SledConfig, SledStore};
pub use store::{KvStore, Keyspace, StoreError, WriteBatch};
