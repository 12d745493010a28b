use crate::error::{Result, SearchError};
use crate::persist::{article_key, decode_article, encode_article, parse_article_key, ARTICLE_PREFIX};
use crate::store::{Keyspace, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type DocId = u64;

const SEARCHABLE_CONTENT_CHARS: usize = 100;
const SEARCHABLE_MAX_CHARS: usize = 300;

/// An article as it travels over the wire and sits in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

impl Article {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            author: author.into(),
            tags: BTreeSet::new(),
            difficulty: None,
            kind: None,
            read_time: None,
            publish_date: None,
            views: None,
            rating: None,
        }
    }

    /// Title, the head of the content and the author, truncated.
    pub fn searchable_text(&self) -> String {
        let joined = format!("{} {} {}", self.title, prefix_chars(&self.content, SEARCHABLE_CONTENT_CHARS), self.author);
        prefix_chars(&joined, SEARCHABLE_MAX_CHARS).to_string()
    }

    /// Text the query-time containment check runs against.
    pub fn match_text(&self) -> String {
        format!("{} {} {}", self.title, self.content, self.author)
    }
}

/// First `n` characters of `s`, on a char boundary.
pub fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// An article that passed validation and carries its numeric id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocId,
    article: Article,
}

impl Document {
    pub fn id(&self) -> DocId { self.id }

    pub fn article(&self) -> &Article { &self.article }

    pub fn into_article(self) -> Article { self.article }
}

impl TryFrom<Article> for Document {
    type Error = SearchError;

    fn try_from(mut article: Article) -> Result<Self> {
        let trimmed = article.id.trim();
        let id: DocId = trimmed
            .parse()
            .map_err(|_| SearchError::InvalidDocument(format!("id {:?} is not an unsigned integer", article.id)))?;
        // "+7" and "007" would share the key of "7".
        if id.to_string() != trimmed {
            return Err(SearchError::InvalidDocument(format!("id {:?} is not in canonical form {id}", article.id)));
        }
        if [&article.title, &article.content, &article.author].iter().all(|s| s.trim().is_empty()) {
            return Err(SearchError::InvalidDocument(format!("document {id} has no searchable text")));
        }
        if trimmed.len() != article.id.len() {
            article.id = trimmed.to_string();
        }
        Ok(Self { id, article })
    }
}

/// Maps document ids to full records inside one keyspace.
#[derive(Clone)]
pub struct DocumentStore<K> {
    keyspace: K,
}

impl<K: Keyspace> DocumentStore<K> {
    pub fn new(keyspace: K) -> Self { Self { keyspace } }

    pub async fn put(&self, doc: &Document) -> Result<()> {
        let value = encode_article(doc.article())?;
        self.keyspace.put(&article_key(doc.id()), value).await.map_err(SearchError::store("document put"))
    }

    /// Writes every document in one atomic batch.
    pub async fn put_batch(&self, docs: &[Document]) -> Result<()> {
        let mut batch = WriteBatch::new();
        for doc in docs {
            batch.put(article_key(doc.id()), encode_article(doc.article())?);
        }
        self.keyspace.apply_batch(batch).await.map_err(SearchError::store("document batch"))
    }

    /// `Ok(None)` when the id is unknown.
    pub async fn get(&self, id: DocId) -> Result<Option<Article>> {
        let key = article_key(id);
        match self.keyspace.get(&key).await.map_err(SearchError::store("document get"))? {
            Some(bytes) => decode_article(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Every stored document in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Result<(DocId, Article)>> {
        self.raw_iter().map(|item| {
            let (key, value) = item?;
            let id = parse_article_key(&key).ok_or_else(|| SearchError::Corrupt {
                key: String::from_utf8_lossy(&key).into_owned(),
                detail: "malformed document key".into(),
            })?;
            Ok((id, decode_article(&key, &value)?))
        })
    }

    /// Undecoded `(key, value)` pairs, for scans that only decode what they keep.
    pub(crate) fn raw_iter(&self) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {
        self.keyspace
            .scan_prefix(ARTICLE_PREFIX.as_bytes())
            .map(|item| item.map_err(SearchError::store("document scan")))
    }

    pub async fn clear(&self) -> Result<()> {
        self.keyspace.clear().await.map_err(SearchError::store("document clear"))
    }
}
