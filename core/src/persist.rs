//! Key layout and value encodings inside the store.
//!
//! Documents are JSON under `article:<zero-padded id>` so that the store's byte order is the
//! ascending id order. Posting lists are bincode `Vec<u64>` under `token:<term>`. A single JSON
//! meta record marks a completed seeding run.

use crate::document::{Article, DocId};
use crate::error::{Result, SearchError};
use crate::store::Keyspace;
use serde::{Deserialize, Serialize};

pub const ARTICLE_PREFIX: &str = "article:";
pub const TOKEN_PREFIX: &str = "token:";
pub const SEED_META_KEY: &str = "seed";
pub const META_VERSION: u32 = 1;

const ID_WIDTH: usize = 20;

pub fn article_key(id: DocId) -> Vec<u8> {
    format!("{ARTICLE_PREFIX}{id:0width$}", width = ID_WIDTH).into_bytes()
}

/// Inverse of [`article_key`].
pub fn parse_article_key(key: &[u8]) -> Option<DocId> {
    let digits = key.strip_prefix(ARTICLE_PREFIX.as_bytes())?;
    std::str::from_utf8(digits).ok()?.parse().ok()
}

pub fn token_key(term: &str) -> Vec<u8> {
    format!("{TOKEN_PREFIX}{term}").into_bytes()
}

pub fn encode_postings(ids: &[DocId]) -> Result<Vec<u8>> {
    bincode::serialize(ids).map_err(|e| SearchError::Codec(e.to_string()))
}

pub fn decode_postings(key: &[u8], bytes: &[u8]) -> Result<Vec<DocId>> {
    bincode::deserialize(bytes).map_err(|e| corrupt(key, e))
}

pub fn encode_article(article: &Article) -> Result<Vec<u8>> {
    serde_json::to_vec(article).map_err(|e| SearchError::Codec(e.to_string()))
}

pub fn decode_article(key: &[u8], bytes: &[u8]) -> Result<Article> {
    serde_json::from_slice(bytes).map_err(|e| corrupt(key, e))
}

fn corrupt(key: &[u8], err: impl std::fmt::Display) -> SearchError {
    SearchError::Corrupt { key: String::from_utf8_lossy(key).into_owned(), detail: err.to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    #[serde(default)]
    pub rejected: u64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn new(num_docs: u64, rejected: u64) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs, rejected, created_at, version: META_VERSION }
    }
}

pub async fn save_meta<K: Keyspace>(meta_space: &K, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_vec_pretty(meta).map_err(|e| SearchError::Codec(e.to_string()))?;
    meta_space
        .put(SEED_META_KEY.as_bytes(), json)
        .await
        .map_err(SearchError::store("save meta"))
}

/// `None` when no seeding run has completed since the last clear.
pub async fn load_meta<K: Keyspace>(meta_space: &K) -> Result<Option<MetaFile>> {
    let key = SEED_META_KEY.as_bytes();
    let bytes = meta_space.get(key).await.map_err(SearchError::store("load meta"))?;
    match bytes {
        Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| corrupt(key, e)),
        None => Ok(None),
    }
}
