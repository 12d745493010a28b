use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors surfaced by the search engine.
///
/// Soft misses (absent posting lists, documents referenced by an index but gone from the
/// document store) never show up here; they are handled by omission.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A query or listing was attempted before a bulk load reached `Ready`.
    #[error("search engine is not initialized")]
    NotInitialized,

    #[error("{op} failed: {source}")]
    Store {
        /// The operation that hit the store.
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("encoding failed: {0}")]
    Codec(String),

    #[error("corrupt record at {key}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corpus error: {0}")]
    Corpus(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("initialization failed after {attempts} attempts: {source}")]
    InitializationFailed {
        attempts: u32,
        #[source]
        source: Box<SearchError>,
    },
}

impl SearchError {
    /// Adapter for `map_err` that tags a store failure with the operation it broke.
    pub(crate) fn store(op: &'static str) -> impl FnOnce(StoreError) -> SearchError {
        move |source| SearchError::Store { op, source }
    }
}
