//! Knowledge query: retrieval plus synthesis exposed as a capability.

use async_trait::async_trait;
use sdk::{Capability, CapabilityArgs, CapabilityError};
use std::sync::Arc;
use tracing::debug;

use super::CapabilityId;
use crate::retrieval::Retriever;
use crate::synthesis::Synthesizer;

pub struct KnowledgeQuery {
    retriever: Arc<dyn Retriever>,
    synthesizer: Arc<dyn Synthesizer>,
    top_k: usize,
}

impl KnowledgeQuery {
    pub fn new(retriever: Arc<dyn Retriever>, synthesizer: Arc<dyn Synthesizer>, top_k: usize) -> Self {
        Self {
            retriever,
            synthesizer,
            top_k,
        }
    }
}

#[async_trait]
impl Capability for KnowledgeQuery {
    fn name(&self) -> &str {
        CapabilityId::KnowledgeQuery.as_str()
    }

    fn description(&self) -> &str {
        "Consulta información general sobre políticas, procedimientos y datos de la empresa."
    }

    fn params(&self) -> &[&'static str] {
        &["query"]
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError> {
        let query = args.required(0, "query")?;

        let hits = self.retriever.search(query, self.top_k).await;
        debug!(
            "Knowledge query via {} matched {} documents",
            self.retriever.name(),
            hits.len()
        );

        Ok(self.synthesizer.synthesize(query, &hits).await)
    }
}
