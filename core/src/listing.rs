use crate::document::{Article, DocumentStore};
use crate::error::Result;
use crate::persist::decode_article;
use crate::store::Keyspace;
use serde::Serialize;

const YIELD_EVERY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPage {
    pub results: Vec<Article>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One ordered pass over every stored document: counts all of them and decodes only the
/// `[offset, offset + limit)` page.
pub async fn all_records<K: Keyspace>(documents: &DocumentStore<K>, limit: usize, offset: usize) -> Result<RecordPage> {
    let mut results = Vec::with_capacity(limit.min(1024));
    let mut total = 0usize;
    for item in documents.raw_iter() {
        let (key, value) = item?;
        if total >= offset && results.len() < limit {
            results.push(decode_article(&key, &value)?);
        }
        total += 1;
        if total % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
    Ok(RecordPage { results, total, offset, limit })
}
