use crate::config::{FieldWeights, MatchMode, QueryConfig};
use crate::document::{Article, DocId, DocumentStore};
use crate::error::{Result, SearchError};
use crate::index::{Field, FieldIndex};
use crate::loader::Namespaces;
use crate::store::Keyspace;
use crate::tokenizer::{normalize_phrase, tokenize};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::task::JoinSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub results: Vec<Article>,
    /// Matching documents overall, regardless of the requested limit.
    pub total: usize,
}

/// Ranks by descending score, ties by ascending id.
pub fn rank(scores: HashMap<DocId, u32>) -> Vec<(DocId, u32)> {
    let mut ranked: Vec<(DocId, u32)> = scores.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

pub struct QueryEngine<K> {
    documents: DocumentStore<K>,
    fields: Vec<FieldIndex<K>>,
    weights: FieldWeights,
    config: QueryConfig,
}

impl<K: Keyspace> QueryEngine<K> {
    pub fn new(namespaces: &Namespaces<K>, weights: FieldWeights, config: QueryConfig) -> Self {
        Self {
            documents: DocumentStore::new(namespaces.documents.clone()),
            fields: Field::ALL.iter().map(|&f| FieldIndex::new(f, namespaces.field(f).clone())).collect(),
            weights,
            config,
        }
    }

    pub fn documents(&self) -> &DocumentStore<K> { &self.documents }

    /// Distinct query terms in order of first appearance, capped.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .take(self.config.max_query_terms)
            .collect()
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            return Ok(SearchResults::default());
        }
        let ranked = self.candidates(&terms).await?;

        let (results, total) = match self.config.match_mode {
            MatchMode::Any => {
                let (results, _) = self.collect(&ranked, limit, false, |_| true).await?;
                (results, ranked.len())
            }
            MatchMode::Contains => {
                let needle = normalize_phrase(query);
                self.collect(&ranked, limit, true, |doc| normalize_phrase(&doc.match_text()).contains(&needle)).await?
            }
        };
        tracing::debug!(query, terms = terms.len(), candidates = ranked.len(), total, returned = results.len(), "search");
        Ok(SearchResults { results, total })
    }

    /// Scored and ranked candidate ids for already-tokenized terms.
    pub async fn candidates(&self, terms: &[String]) -> Result<Vec<(DocId, u32)>> {
        let mut scores: HashMap<DocId, u32> = HashMap::new();
        for (field, ids) in self.lookup_all(terms).await? {
            let weight = self.weights.get(field);
            for id in ids {
                *scores.entry(id).or_insert(0) += weight;
            }
        }
        Ok(rank(scores))
    }

    /// One posting lookup per (field, term), all in flight before any is awaited.
    async fn lookup_all(&self, terms: &[String]) -> Result<Vec<(Field, Vec<DocId>)>> {
        let mut tasks = JoinSet::new();
        for index in &self.fields {
            for term in terms {
                let index = index.clone();
                let term = term.clone();
                tasks.spawn(async move {
                    let ids = index.postings(&term).await?;
                    Ok::<_, SearchError>((index.field(), ids))
                });
            }
        }
        let mut hits = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            hits.push(joined.map_err(|e| SearchError::Task(e.to_string()))??);
        }
        Ok(hits)
    }

    /// Walks `ranked` in fetch windows and keeps documents accepted by `keep`. Returns the first
    /// `limit` kept documents and the number kept; with `count_all` unset it stops once `limit`
    /// documents are in hand, so the count is then only a lower bound.
    async fn collect<F>(&self, ranked: &[(DocId, u32)], limit: usize, count_all: bool, keep: F) -> Result<(Vec<Article>, usize)>
    where
        F: Fn(&Article) -> bool,
    {
        let mut results = Vec::with_capacity(limit.min(ranked.len()));
        let mut kept = 0;
        for window in ranked.chunks(self.config.fetch_concurrency.max(1)) {
            if !count_all && results.len() >= limit {
                break;
            }
            let ids: Vec<DocId> = window.iter().map(|(id, _)| *id).collect();
            for doc in self.fetch_window(&ids).await?.into_iter().flatten() {
                if keep(&doc) {
                    kept += 1;
                    if results.len() < limit {
                        results.push(doc);
                    }
                }
            }
        }
        Ok((results, kept))
    }

    /// Fetches `ids` concurrently, preserving order. Missing documents come back as `None`.
    async fn fetch_window(&self, ids: &[DocId]) -> Result<Vec<Option<Article>>> {
        let mut tasks = JoinSet::new();
        for (slot, &id) in ids.iter().enumerate() {
            let documents = self.documents.clone();
            tasks.spawn(async move { documents.get(id).await.map(|doc| (slot, id, doc)) });
        }
        let mut window = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            let (slot, id, doc) = joined.map_err(|e| SearchError::Task(e.to_string()))??;
            if doc.is_none() {
                tracing::debug!(id, "posting references a missing document");
            }
            window[slot] = doc;
        }
        Ok(window)
    }
}
