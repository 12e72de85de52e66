//! Answer Synthesizer
//!
//! Turns a query plus retrieved documents into the final knowledge answer.
//! `LiveSynthesizer` grounds a completion prompt on the top documents;
//! `RuleBasedSynthesizer` returns a canned answer chosen by keyword. The live
//! variant degrades to the rule-based one on any backend failure, so
//! `synthesize` always yields non-empty text.

use async_trait::async_trait;
use sdk::{AgentErrorExt, EngineError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::llm::{complete_with_timeout, CompletionProvider};
use crate::retrieval::RetrievalResult;

/// Answer synthesis strategy
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a non-empty answer. Never fails.
    async fn synthesize(&self, query: &str, documents: &[RetrievalResult]) -> String;
}

/// Query category used by the rule-based synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerCategory {
    Returns,
    Policy,
    Support,
    General,
}

/// Keyword table in priority order; the first category with a matching
/// keyword wins.
const CATEGORY_KEYWORDS: &[(AnswerCategory, &[&str])] = &[
    (
        AnswerCategory::Returns,
        &["devolución", "devolucion", "devolver", "return"],
    ),
    (AnswerCategory::Policy, &["política", "politica", "policy"]),
    (
        AnswerCategory::Support,
        &["soporte", "ayuda", "support", "help"],
    ),
];

impl AnswerCategory {
    /// Classify by substring containment on the lowercased query
    pub fn classify(query: &str) -> Self {
        let lowered = query.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(AnswerCategory::General)
    }

    pub fn canned_answer(self) -> &'static str {
        match self {
            AnswerCategory::Returns => {
                "Para procesar una devolución, necesito verificar la elegibilidad del producto \
                 y generar una etiqueta de devolución."
            }
            AnswerCategory::Policy => {
                "Las políticas de devolución varían según la categoría del producto. \
                 Los electrónicos tienen 30 días, computadoras 15 días, audio 14 días y tablets 7 días."
            }
            AnswerCategory::Support => {
                "Puedo ayudarte con consultas sobre devoluciones, información de productos \
                 y políticas de la empresa."
            }
            AnswerCategory::General => {
                "Soy EcoAgent, tu asistente para devoluciones. Puedo verificar la elegibilidad \
                 de un producto, generar etiquetas de devolución y consultar políticas. \
                 ¿En qué puedo ayudarte?"
            }
        }
    }
}

/// Keyword-driven canned answers
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSynthesizer;

#[async_trait]
impl Synthesizer for RuleBasedSynthesizer {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn synthesize(&self, query: &str, documents: &[RetrievalResult]) -> String {
        let category = AnswerCategory::classify(query);
        debug!(
            "Rule-based synthesis: category {:?}, {} documents",
            category,
            documents.len()
        );
        category.canned_answer().to_string()
    }
}

/// Completion-backed synthesizer
pub struct LiveSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    fallback: RuleBasedSynthesizer,
    timeout: Duration,
    max_documents: usize,
}

impl LiveSynthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration, max_documents: usize) -> Self {
        Self {
            provider,
            fallback: RuleBasedSynthesizer,
            timeout,
            max_documents,
        }
    }

    /// Build the grounding prompt from the top-ranked documents
    pub fn grounding_prompt(&self, query: &str, documents: &[RetrievalResult]) -> String {
        let context = documents
            .iter()
            .take(self.max_documents)
            .map(|hit| format!("[{}]\n{}", hit.document.source_id, hit.document.content.trim()))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        format!(
            "Use the following pieces of context to answer the question at the end. \
             If you don't know the answer, say that you don't know; do not make one up. \
             Answer in the same language as the question.\n\n\
             {}\n\nQuestion: {}\nHelpful Answer:",
            if context.is_empty() {
                "(no context available)".to_string()
            } else {
                context
            },
            query
        )
    }
}

#[async_trait]
impl Synthesizer for LiveSynthesizer {
    fn name(&self) -> &str {
        "live"
    }

    async fn synthesize(&self, query: &str, documents: &[RetrievalResult]) -> String {
        let prompt = self.grounding_prompt(query, documents);

        match complete_with_timeout(self.provider.as_ref(), &prompt, self.timeout).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Provider {} returned an empty answer", self.provider.name());
                self.fallback.synthesize(query, documents).await
            }
            Err(e) => {
                let err = EngineError::from(e);
                warn!(
                    "Provider {} failed during synthesis, using rule-based answer: {} ({})",
                    self.provider.name(),
                    err,
                    err.user_hint()
                );
                self.fallback.synthesize(query, documents).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;
    use crate::retrieval::Document;
    use std::sync::Mutex;

    struct RecordingProvider {
        reply: std::result::Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> crate::llm::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .map_err(|_| LLMError::AuthenticationFailed("invalid key".to_string()))
        }
    }

    fn hits() -> Vec<RetrievalResult> {
        vec![
            RetrievalResult {
                document: Document::new("kb/a", "Electrónicos: 30 días"),
                score: 2.0,
            },
            RetrievalResult {
                document: Document::new("kb/b", "Audio: 14 días"),
                score: 1.0,
            },
        ]
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(
            AnswerCategory::classify("¿Cuáles son las políticas de DEVOLUCIÓN?"),
            AnswerCategory::Returns
        );
        assert_eq!(
            AnswerCategory::classify("Explícame la política de garantía"),
            AnswerCategory::Policy
        );
        assert_eq!(AnswerCategory::classify("Necesito ayuda"), AnswerCategory::Support);
        assert_eq!(AnswerCategory::classify("Hola"), AnswerCategory::General);
    }

    #[tokio::test]
    async fn test_rule_based_never_empty() {
        for query in ["", "devolver", "política", "soporte", "???"] {
            let answer = RuleBasedSynthesizer.synthesize(query, &[]).await;
            assert!(!answer.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_live_uses_top_documents_in_prompt() {
        let provider = Arc::new(RecordingProvider::ok("  Tiene 30 días.  "));
        let synth = LiveSynthesizer::new(provider.clone(), Duration::from_secs(1), 1);

        let answer = synth.synthesize("¿plazo?", &hits()).await;
        assert_eq!(answer, "Tiene 30 días.");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[kb/a]"));
        assert!(!prompts[0].contains("[kb/b]"));
        assert!(prompts[0].contains("Question: ¿plazo?"));
    }

    #[tokio::test]
    async fn test_live_failure_degrades_to_rules() {
        let synth = LiveSynthesizer::new(
            Arc::new(RecordingProvider::failing()),
            Duration::from_secs(1),
            4,
        );
        let answer = synth.synthesize("quiero devolver algo", &hits()).await;
        assert_eq!(answer, AnswerCategory::Returns.canned_answer());
    }

    #[tokio::test]
    async fn test_live_empty_reply_degrades_to_rules() {
        let synth = LiveSynthesizer::new(
            Arc::new(RecordingProvider::ok("   ")),
            Duration::from_secs(1),
            4,
        );
        let answer = synth.synthesize("hola", &[]).await;
        assert_eq!(answer, AnswerCategory::General.canned_answer());
    }
}
