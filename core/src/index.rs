//! Per-field inverted indexes stored as `token:<term> -> [DocId]` in their own keyspace.
//!
//! [`IndexBuilder`] accumulates `term -> ids` in memory across chunks and merges it into the
//! store whenever the number of distinct pending terms crosses a threshold, so peak memory
//! depends on the threshold and not on the corpus. [`FieldIndex`] is the read side.

use crate::config::IndexConfig;
use crate::document::{prefix_chars, Article, DocId, Document};
use crate::error::{Result, SearchError};
use crate::persist::{decode_postings, encode_postings, token_key};
use crate::store::{Keyspace, WriteBatch};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

const CONTENT_PREFIX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Content,
    Author,
    Searchable,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Content, Field::Author, Field::Searchable];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Content => "content",
            Field::Author => "author",
            Field::Searchable => "searchable",
        }
    }

    pub fn keyspace_name(self) -> &'static str {
        match self {
            Field::Title => "title-index",
            Field::Content => "content-index",
            Field::Author => "author-index",
            Field::Searchable => "searchable-index",
        }
    }

    /// The text of `article` this field indexes.
    pub fn extract(self, article: &Article) -> String {
        match self {
            Field::Title => article.title.clone(),
            Field::Content => prefix_chars(&article.content, CONTENT_PREFIX_CHARS).to_string(),
            Field::Author => article.author.clone(),
            Field::Searchable => article.searchable_text(),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Existing members first, then new ids not already present, truncated to `cap`.
/// Returns the merged list and how many ids the cap dropped.
pub fn merge_postings(existing: Vec<DocId>, new_ids: &BTreeSet<DocId>, cap: usize) -> (Vec<DocId>, usize) {
    let seen: HashSet<DocId> = existing.iter().copied().collect();
    let mut merged = existing;
    merged.extend(new_ids.iter().copied().filter(|id| !seen.contains(id)));
    let dropped = merged.len().saturating_sub(cap);
    merged.truncate(cap);
    (merged, dropped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub field: Field,
    pub documents: u64,
    pub flushes: u64,
    pub terms_written: u64,
    /// Ids dropped because a posting list hit the cap.
    pub truncated: u64,
}

pub struct IndexBuilder<K> {
    field: Field,
    keyspace: K,
    config: IndexConfig,
    pending: HashMap<String, BTreeSet<DocId>>,
    stats: BuildStats,
}

impl<K: Keyspace> IndexBuilder<K> {
    pub fn new(field: Field, keyspace: K, config: IndexConfig) -> Self {
        Self {
            field,
            keyspace,
            config,
            pending: HashMap::new(),
            stats: BuildStats { field, documents: 0, flushes: 0, terms_written: 0, truncated: 0 },
        }
    }

    pub fn field(&self) -> Field { self.field }

    pub fn pending_terms(&self) -> usize { self.pending.len() }

    pub fn stats(&self) -> BuildStats { self.stats }

    /// Accumulates the field's terms for `docs`, flushing whenever the pending map grows past
    /// the threshold.
    pub async fn add_batch(&mut self, docs: &[Document]) -> Result<()> {
        for doc in docs {
            for term in tokenize(&self.field.extract(doc.article())) {
                self.pending.entry(term).or_default().insert(doc.id());
            }
            self.stats.documents += 1;
            if self.pending.len() > self.config.flush_threshold {
                tracing::debug!(field = %self.field, terms = self.pending.len(), "pending terms over threshold");
                self.flush().await?;
            }
        }
        Ok(())
    }

    /// Merges every pending term into its stored posting list, then releases the map.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut terms: Vec<(String, BTreeSet<DocId>)> = std::mem::take(&mut self.pending).into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut batch = WriteBatch::new();
        for (term, ids) in terms {
            let key = token_key(&term);
            let existing = self.read_for_merge(&key).await?;
            let (merged, dropped) = merge_postings(existing, &ids, self.config.max_postings);
            self.stats.truncated += dropped as u64;
            batch.put(key, encode_postings(&merged)?);
            self.stats.terms_written += 1;
            if batch.len() >= self.config.write_batch_size {
                self.write(std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_empty() {
            self.write(batch).await?;
        }
        self.stats.flushes += 1;
        self.checkpoint().await;
        Ok(())
    }

    /// Flushes what is left and reports.
    pub async fn finish(&mut self) -> Result<BuildStats> {
        self.flush().await?;
        tracing::debug!(field = %self.field, terms = self.stats.terms_written, flushes = self.stats.flushes, "field index built");
        Ok(self.stats)
    }

    async fn read_for_merge(&self, key: &[u8]) -> Result<Vec<DocId>> {
        let bytes = self.keyspace.get(key).await.map_err(SearchError::store("index flush read"))?;
        let Some(bytes) = bytes else { return Ok(Vec::new()) };
        match decode_postings(key, &bytes) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                tracing::warn!(field = %self.field, error = %err, "replacing undecodable posting list");
                Ok(Vec::new())
            }
        }
    }

    async fn write(&self, batch: WriteBatch) -> Result<()> {
        self.keyspace.apply_batch(batch).await.map_err(SearchError::store("index flush write"))
    }

    /// Runs after the flushed terms are dropped: lets other tasks in before the next batch.
    async fn checkpoint(&self) {
        tokio::task::yield_now().await;
        if self.config.checkpoint_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.checkpoint_pause_ms)).await;
        }
    }
}

/// Read handle on one field's posting lists.
#[derive(Clone)]
pub struct FieldIndex<K> {
    field: Field,
    keyspace: K,
}

impl<K: Keyspace> FieldIndex<K> {
    pub fn new(field: Field, keyspace: K) -> Self { Self { field, keyspace } }

    pub fn field(&self) -> Field { self.field }

    /// Posting list for `term`; empty when the term was never indexed.
    pub async fn postings(&self, term: &str) -> Result<Vec<DocId>> {
        let key = token_key(term);
        let bytes = self.keyspace.get(&key).await.map_err(SearchError::store("posting lookup"))?;
        let Some(bytes) = bytes else { return Ok(Vec::new()) };
        match decode_postings(&key, &bytes) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                tracing::warn!(field = %self.field, error = %err, "ignoring undecodable posting list");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::KvStore;

    fn doc(id: u64, title: &str) -> Document {
        Document::try_from(Article::new(id.to_string(), title, "", "")).unwrap()
    }

    #[test]
    fn merge_keeps_existing_first_and_caps() {
        let new_ids: BTreeSet<DocId> = [3, 1, 9].into_iter().collect();
        let (merged, dropped) = merge_postings(vec![5, 1], &new_ids, 3);
        assert_eq!(merged, vec![5, 1, 3]);
        assert_eq!(dropped, 1);

        let (merged, dropped) = merge_postings(Vec::new(), &new_ids, 10);
        assert_eq!(merged, vec![1, 3, 9]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn fields_extract_bounded_text() {
        let article = Article::new("1", "Title", "c".repeat(500), "Ann Author");
        assert_eq!(Field::Content.extract(&article).len(), 200);
        assert_eq!(Field::Author.extract(&article), "Ann Author");
        assert_eq!(Field::Title.to_string(), "title");
    }

    #[tokio::test]
    async fn small_threshold_flushes_repeatedly_with_same_result() {
        let store = MemoryStore::new();
        let eager_ks = store.open_keyspace("eager").await.unwrap();
        let lazy_ks = store.open_keyspace("lazy").await.unwrap();
        let docs: Vec<Document> = (1..=20).map(|i| doc(i, &format!("common word{i} other{}", i % 3))).collect();

        let eager_cfg = IndexConfig { flush_threshold: 2, write_batch_size: 3, ..IndexConfig::default() };
        let mut eager = IndexBuilder::new(Field::Title, eager_ks.clone(), eager_cfg);
        eager.add_batch(&docs).await.unwrap();
        let eager_stats = eager.finish().await.unwrap();
        assert!(eager_stats.flushes > 1);
        assert_eq!(eager.pending_terms(), 0);

        let mut lazy = IndexBuilder::new(Field::Title, lazy_ks.clone(), IndexConfig::default());
        lazy.add_batch(&docs).await.unwrap();
        assert_eq!(lazy.finish().await.unwrap().flushes, 1);

        let snap = store.snapshot();
        assert_eq!(snap["eager"], snap["lazy"]);

        let common = FieldIndex::new(Field::Title, eager_ks).postings("common").await.unwrap();
        assert_eq!(common, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn flush_writes_in_bounded_batches() {
        let store = MemoryStore::new();
        let ks = store.open_keyspace("t").await.unwrap();
        let cfg = IndexConfig { write_batch_size: 3, ..IndexConfig::default() };
        let mut builder = IndexBuilder::new(Field::Title, ks.clone(), cfg);
        let title = (0..10).map(|i| format!("term{i}")).collect::<Vec<_>>().join(" ");
        builder.add_batch(&[doc(1, &title)]).await.unwrap();
        assert_eq!(builder.pending_terms(), 10);

        let stats = builder.finish().await.unwrap();
        assert_eq!((stats.flushes, stats.terms_written), (1, 10));
        // 3 + 3 + 3 + 1
        assert_eq!(store.batch_count(), 4);
        assert_eq!(ks.scan_prefix(b"token:").count(), 10);
    }

    #[tokio::test]
    async fn posting_lists_respect_the_cap_across_flushes() {
        let store = MemoryStore::new();
        let ks = store.open_keyspace("t").await.unwrap();
        let cfg = IndexConfig { max_postings: 4, flush_threshold: 1, ..IndexConfig::default() };
        let mut builder = IndexBuilder::new(Field::Title, ks.clone(), cfg);
        for chunk in (1..=10).map(|i| doc(i, "shared term")).collect::<Vec<_>>().chunks(3) {
            builder.add_batch(chunk).await.unwrap();
        }
        let stats = builder.finish().await.unwrap();
        let index = FieldIndex::new(Field::Title, ks);
        assert_eq!(index.postings("shared").await.unwrap(), vec![1, 2, 3, 4]);
        assert!(stats.truncated > 0);
    }

    #[tokio::test]
    async fn missing_and_corrupt_lists_read_as_empty() {
        let store = MemoryStore::new();
        let ks = store.open_keyspace("t").await.unwrap();
        ks.put(&token_key("broken"), vec![0xff]).await.unwrap();
        let index = FieldIndex::new(Field::Author, ks);
        assert!(index.postings("absent").await.unwrap().is_empty());
        assert!(index.postings("broken").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_failures_name_the_operation() {
        let store = MemoryStore::new();
        let index = FieldIndex::new(Field::Title, store.open_keyspace("t").await.unwrap());
        store.set_reads_failing(true);
        let err = index.postings("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::Store { op: "posting lookup", .. }));
    }
}
