use crate::error::{Result, SearchError};
use crate::index::Field;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the whole engine. Every field has a default, so a config file only needs to
/// name what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub index: IndexConfig,
    pub loader: LoaderConfig,
    pub query: QueryConfig,
    pub weights: FieldWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Distinct pending terms that force a flush of the in-memory accumulation map.
    pub flush_threshold: usize,
    pub max_postings: usize,
    /// Puts per atomic batch during a flush.
    pub write_batch_size: usize,
    pub checkpoint_pause_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { flush_threshold: 25_000, max_postings: 500, write_batch_size: 50, checkpoint_pause_ms: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub chunk_size: usize,
    pub progress_interval: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, progress_interval: 5000, max_attempts: 3, retry_base_delay_ms: 1000 }
    }
}

impl LoaderConfig {
    /// Linear backoff: the wait after failed attempt `n` (1-based) is `n × base`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Any candidate with a non-zero score is a hit.
    Any,
    /// Candidates must also contain the normalized query phrase.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_query_terms: usize,
    pub match_mode: MatchMode,
    /// Document fetches in flight per window.
    pub fetch_concurrency: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_query_terms: 10, match_mode: MatchMode::Contains, fetch_concurrency: 64 }
    }
}

/// Per-field score multipliers. Must satisfy title > author > searchable > content > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: u32,
    pub author: u32,
    pub searchable: u32,
    pub content: u32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 8, author: 4, searchable: 2, content: 1 }
    }
}

impl FieldWeights {
    pub fn get(&self, field: Field) -> u32 {
        match field {
            Field::Title => self.title,
            Field::Content => self.content,
            Field::Author => self.author,
            Field::Searchable => self.searchable,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SearchError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| SearchError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        if !(w.title > w.author && w.author > w.searchable && w.searchable > w.content && w.content > 0) {
            return Err(SearchError::InvalidConfig(format!(
                "field weights must satisfy title > author > searchable > content > 0, got {w:?}"
            )));
        }
        let positive = [
            ("index.flush_threshold", self.index.flush_threshold),
            ("index.max_postings", self.index.max_postings),
            ("index.write_batch_size", self.index.write_batch_size),
            ("loader.chunk_size", self.loader.chunk_size),
            ("query.max_query_terms", self.query.max_query_terms),
            ("query.fetch_concurrency", self.query.fetch_concurrency),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(SearchError::InvalidConfig(format!("{name} must be greater than zero")));
        }
        if self.loader.max_attempts == 0 {
            return Err(SearchError::InvalidConfig("loader.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
