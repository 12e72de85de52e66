pub mod knowledge;
pub mod returns;

pub use knowledge::KnowledgeQuery;
pub use returns::{Catalog, EligibilityCheck, LabelGenerator, PolicyLookup, ReturnCode};

use sdk::{Capability, CapabilityArgs, EngineError};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::retrieval::Retriever;
use crate::synthesis::Synthesizer;

/// Identifiers of the capabilities the orchestrator can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityId {
    CheckEligibility,
    GenerateLabel,
    PolicyLookup,
    KnowledgeQuery,
}

impl CapabilityId {
    pub const ALL: [CapabilityId; 4] = [
        CapabilityId::CheckEligibility,
        CapabilityId::GenerateLabel,
        CapabilityId::PolicyLookup,
        CapabilityId::KnowledgeQuery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityId::CheckEligibility => "check_eligibility",
            CapabilityId::GenerateLabel => "generate_return_label",
            CapabilityId::PolicyLookup => "lookup_return_policy",
            CapabilityId::KnowledgeQuery => "knowledge_query",
        }
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| EngineError::CapabilityNotFound(s.to_string()))
    }
}

/// Fixed mapping from capability id to implementation.
///
/// Built once at startup; dispatch never type-branches on the capability.
pub struct CapabilityRegistry {
    capabilities: BTreeMap<CapabilityId, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    /// The four standard capabilities over the given catalog and knowledge stack
    pub fn standard(
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        retriever: Arc<dyn Retriever>,
        synthesizer: Arc<dyn Synthesizer>,
        top_k: usize,
    ) -> Self {
        Self::empty()
            .with(
                CapabilityId::CheckEligibility,
                Box::new(EligibilityCheck::new(Arc::clone(&catalog), Arc::clone(&clock))),
            )
            .with(
                CapabilityId::GenerateLabel,
                Box::new(LabelGenerator::new(catalog, clock)),
            )
            .with(CapabilityId::PolicyLookup, Box::new(PolicyLookup))
            .with(
                CapabilityId::KnowledgeQuery,
                Box::new(KnowledgeQuery::new(retriever, synthesizer, top_k)),
            )
    }

    /// Register (or replace) a capability
    pub fn with(mut self, id: CapabilityId, capability: Box<dyn Capability>) -> Self {
        self.capabilities.insert(id, capability);
        self
    }

    pub fn get(&self, id: CapabilityId) -> Option<&dyn Capability> {
        self.capabilities.get(&id).map(|c| c.as_ref())
    }

    /// Resolve a name produced by the reasoning step
    pub fn resolve(&self, name: &str) -> Result<CapabilityId, EngineError> {
        let id = name.parse::<CapabilityId>()?;
        if self.capabilities.contains_key(&id) {
            Ok(id)
        } else {
            Err(EngineError::CapabilityNotFound(name.to_string()))
        }
    }

    /// Invoke a capability by name.
    ///
    /// Capability validation failures come back as `InvalidArgument` carrying
    /// the capability's own message.
    pub async fn dispatch(&self, name: &str, args: &CapabilityArgs) -> Result<String, EngineError> {
        let id = self.resolve(name).map_err(|e| {
            warn!("Unknown capability requested: {}", name);
            e
        })?;
        let capability = self
            .get(id)
            .ok_or_else(|| EngineError::CapabilityNotFound(name.to_string()))?;

        debug!("Dispatching {} with {} args", id, args.len());
        capability
            .invoke(args)
            .await
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.capabilities.keys().map(|id| id.as_str()).collect()
    }

    /// Positional parameter names keyed by capability name
    pub fn param_table(&self) -> BTreeMap<String, Vec<&'static str>> {
        self.capabilities
            .iter()
            .map(|(id, capability)| (id.as_str().to_string(), capability.params().to_vec()))
            .collect()
    }

    /// Capability listing for the reasoning prompt
    pub fn describe(&self) -> String {
        self.capabilities
            .iter()
            .map(|(id, capability)| {
                let params = capability
                    .params()
                    .iter()
                    .map(|p| format!("\"{}\"", p))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "## {}\n{}\nArguments: [{}]",
                    id,
                    capability.description(),
                    params
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
