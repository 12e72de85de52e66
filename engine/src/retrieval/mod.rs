//! Retrieval Engine
//!
//! Ranks a small, immutable document corpus against a query. Two strategies
//! sit behind the `Retriever` trait:
//!
//! - `LexicalRetriever`: deterministic term-count scoring, no external calls
//! - `EmbeddingRetriever`: delegates ranking to an `EmbeddingBackend` and
//!   re-runs the lexical ranking whenever the backend fails
//!
//! Both guarantee that `search` never fails, returns at most `k` results, and
//! orders them by descending score with ties in corpus order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod corpus;
pub mod embedding;
pub mod lexical;

pub use embedding::{EmbeddingBackend, EmbeddingRetriever};
pub use lexical::LexicalRetriever;

/// A corpus entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A ranked hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub document: Document,
    pub score: f64,
}

/// Retrieval strategy
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Strategy name for status reporting ("lexical", "embedding")
    fn name(&self) -> &str;

    /// Build the searchable representation. Replaces any previous index.
    async fn index(&mut self, documents: Vec<Document>);

    /// Rank the corpus against `query`, returning at most `k` hits.
    ///
    /// Never fails: no match (or `k == 0`) yields an empty vector.
    async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult>;

    /// Number of indexed documents
    fn document_count(&self) -> usize;
}

/// Sort hits by descending score, keeping corpus order for ties, and cap at `k`.
pub(crate) fn rank_hits(mut hits: Vec<RetrievalResult>, k: usize) -> Vec<RetrievalResult> {
    // sort_by is stable, so equal scores keep their insertion order
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}
