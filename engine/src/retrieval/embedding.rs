//! Embedding-backed retrieval with lexical fallback
//!
//! Nearest-neighbour ranking is delegated to an external `EmbeddingBackend`
//! (a hosted embedding model plus vector index). The engine does not compute
//! similarities itself. Any backend failure, including a timeout, is logged
//! and answered by the lexical ranking for that call.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::lexical::LexicalRetriever;
use super::{rank_hits, Document, RetrievalResult, Retriever};
use crate::llm::LLMError;

/// External embedding / vector-index capability
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Embed and index the corpus. Positions in `documents` are the ids
    /// returned by `nearest`.
    async fn index(&mut self, documents: &[Document]) -> Result<(), LLMError>;

    /// Return `(corpus position, similarity)` pairs for the closest documents.
    async fn nearest(&self, query: &str, k: usize) -> Result<Vec<(usize, f64)>, LLMError>;
}

/// Retriever that prefers the embedding backend
pub struct EmbeddingRetriever {
    backend: Box<dyn EmbeddingBackend>,
    fallback: LexicalRetriever,
    documents: Vec<Document>,
    backend_ready: bool,
    timeout: Duration,
}

impl EmbeddingRetriever {
    pub fn new(backend: Box<dyn EmbeddingBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            fallback: LexicalRetriever::new(),
            documents: Vec::new(),
            backend_ready: false,
            timeout,
        }
    }

    /// Whether the last `index` call reached the backend successfully
    pub fn backend_ready(&self) -> bool {
        self.backend_ready
    }

    async fn backend_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>, LLMError> {
        let hits = tokio::time::timeout(self.timeout, self.backend.nearest(query, k))
            .await
            .map_err(|_| LLMError::Timeout)??;

        let results = hits
            .into_iter()
            .filter_map(|(position, score)| {
                let document = self.documents.get(position)?;
                Some(RetrievalResult {
                    document: document.clone(),
                    score,
                })
            })
            .collect();

        Ok(rank_hits(results, k))
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn index(&mut self, documents: Vec<Document>) {
        self.fallback = LexicalRetriever::from_documents(documents.clone());

        let indexed = tokio::time::timeout(self.timeout, self.backend.index(&documents)).await;
        self.backend_ready = match indexed {
            Ok(Ok(())) => {
                info!(
                    "Embedding backend {} indexed {} documents",
                    self.backend.name(),
                    documents.len()
                );
                true
            }
            Ok(Err(e)) => {
                warn!(
                    "Embedding backend {} failed to index, using lexical ranking: {}",
                    self.backend.name(),
                    e
                );
                false
            }
            Err(_) => {
                warn!(
                    "Embedding backend {} timed out while indexing, using lexical ranking",
                    self.backend.name()
                );
                false
            }
        };
        self.documents = documents;
    }

    async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        if k == 0 {
            return Vec::new();
        }
        if !self.backend_ready {
            return self.fallback.rank(query, k);
        }

        match self.backend_search(query, k).await {
            Ok(results) => {
                debug!("Embedding search returned {} documents", results.len());
                results
            }
            Err(e) => {
                warn!(
                    "Embedding backend {} failed, re-running lexical ranking: {}",
                    self.backend.name(),
                    e
                );
                self.fallback.rank(query, k)
            }
        }
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Backend returning a scripted ranking, or failing on demand
    struct ScriptedBackend {
        ranking: Vec<(usize, f64)>,
        fail_index: bool,
        fail_search: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EmbeddingBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn index(&mut self, _documents: &[Document]) -> Result<(), LLMError> {
            if self.fail_index {
                Err(LLMError::AuthenticationFailed("bad key".to_string()))
            } else {
                Ok(())
            }
        }

        async fn nearest(&self, _query: &str, _k: usize) -> Result<Vec<(usize, f64)>, LLMError> {
            if self.fail_search.load(Ordering::SeqCst) {
                Err(LLMError::NetworkError("connection reset".to_string()))
            } else {
                Ok(self.ranking.clone())
            }
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("envio", "Envío gratuito en pedidos grandes."),
            Document::new("garantia", "La garantía cubre defectos de fábrica. Garantía extendida."),
            Document::new("soporte", "Soporte 24/7 por chat."),
        ]
    }

    async fn retriever(fail_index: bool, fail_search: Arc<AtomicBool>) -> EmbeddingRetriever {
        let backend = ScriptedBackend {
            ranking: vec![(2, 0.4), (0, 0.9), (7, 0.99)],
            fail_index,
            fail_search,
        };
        let mut retriever = EmbeddingRetriever::new(Box::new(backend), Duration::from_secs(1));
        retriever.index(corpus()).await;
        retriever
    }

    #[tokio::test]
    async fn test_backend_ranking_used_when_healthy() {
        let retriever = retriever(false, Arc::new(AtomicBool::new(false))).await;
        assert!(retriever.backend_ready());

        let results = retriever.search("anything", 5).await;
        let ids: Vec<_> = results.iter().map(|r| r.document.source_id.as_str()).collect();
        // out-of-range position 7 is ignored
        assert_eq!(ids, vec!["envio", "soporte"]);
    }

    #[tokio::test]
    async fn test_search_failure_falls_back_to_lexical() {
        let fail = Arc::new(AtomicBool::new(false));
        let retriever = retriever(false, Arc::clone(&fail)).await;
        fail.store(true, Ordering::SeqCst);

        let results = retriever.search("garantía", 5).await;
        let lexical = LexicalRetriever::from_documents(corpus()).rank("garantía", 5);
        assert_eq!(results, lexical);
        assert_eq!(results[0].document.source_id, "garantia");
    }

    #[tokio::test]
    async fn test_index_failure_uses_lexical() {
        let retriever = retriever(true, Arc::new(AtomicBool::new(false))).await;
        assert!(!retriever.backend_ready());
        assert_eq!(retriever.document_count(), 3);

        let results = retriever.search("soporte", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.source_id, "soporte");
    }

    #[tokio::test]
    async fn test_backend_respects_k() {
        let retriever = retriever(false, Arc::new(AtomicBool::new(false))).await;
        assert_eq!(retriever.search("x", 1).await.len(), 1);
        assert!(retriever.search("x", 0).await.is_empty());
    }
}
