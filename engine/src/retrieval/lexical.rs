//! Lexical fallback retrieval
//!
//! Scoring: the query is lowercased and split on whitespace; a document's
//! score is the sum, over query terms, of the non-overlapping occurrences of
//! the term in the lowercased content. Zero-score documents are dropped.
//! Repeated terms in the query count once per repetition.

use async_trait::async_trait;
use tracing::debug;

use super::{rank_hits, Document, RetrievalResult, Retriever};

/// Deterministic term-count retriever
#[derive(Debug, Clone, Default)]
pub struct LexicalRetriever {
    documents: Vec<Document>,

    /// Lowercased content, parallel to `documents`
    lowered: Vec<String>,
}

impl LexicalRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut retriever = Self::new();
        retriever.load(documents);
        retriever
    }

    fn load(&mut self, documents: Vec<Document>) {
        self.lowered = documents.iter().map(|d| d.content.to_lowercase()).collect();
        self.documents = documents;
    }

    /// Synchronous ranking used by both strategies
    pub fn rank(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        if k == 0 {
            return Vec::new();
        }

        let terms = normalize_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let hits = self
            .documents
            .iter()
            .zip(&self.lowered)
            .filter_map(|(doc, content)| {
                let score = score_content(content, &terms);
                (score > 0).then(|| RetrievalResult {
                    document: doc.clone(),
                    score: score as f64,
                })
            })
            .collect();

        let ranked = rank_hits(hits, k);
        debug!(
            "Lexical search for {} terms returned {} documents",
            terms.len(),
            ranked.len()
        );
        ranked
    }
}

/// Lowercase and split a query into whitespace-delimited terms
pub fn normalize_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn score_content(content: &str, terms: &[String]) -> usize {
    terms
        .iter()
        .map(|term| content.matches(term.as_str()).count())
        .sum()
}

#[async_trait]
impl Retriever for LexicalRetriever {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn index(&mut self, documents: Vec<Document>) {
        self.load(documents);
    }

    async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        self.rank(query, k)
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}
