//! Reasoning step
//!
//! One call to `Reasoner::decide` picks the next move: invoke a capability,
//! answer directly, or report that the model's output could not be parsed.
//! The orchestrator only ever sees a `Decision`.

use async_trait::async_trait;
use regex::Regex;
use sdk::{AgentErrorExt, CapabilityArgs, EngineError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::context::QueryContext;
use crate::llm::{complete_with_timeout, parse_response, CompletionProvider, LLMResponse};
use crate::tools::CapabilityId;

/// Structured outcome of one reasoning step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Invoke {
        capability: String,
        args: CapabilityArgs,
        rationale: String,
    },
    Final {
        text: String,
        rationale: String,
    },
    ParseError {
        raw: String,
    },
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, ctx: &QueryContext) -> Decision;
}

// ---------------------------------------------------------------------------
// Rule-based
// ---------------------------------------------------------------------------

const LABEL_KEYWORDS: &[&str] = &["etiqueta", "label"];
const POLICY_KEYWORDS: &[&str] = &["polític", "politic", "policy", "policies"];

const CATEGORY_SYNONYMS: &[(&str, &[&str])] = &[
    ("Tablets", &["tablet"]),
    (
        "Computadoras",
        &["computador", "laptop", "portátil", "portatil", "desktop"],
    ),
    ("Audio", &["audio", "auricular", "altavoz", "altavoces"]),
    (
        "Electrónicos",
        &["electrónic", "electronic", "smartphone", "celular", "teléfono", "telefono"],
    ),
];

struct QueryPatterns {
    product: Regex,
    customer: Regex,
    date: Regex,
}

static QUERY_PATTERNS: OnceLock<QueryPatterns> = OnceLock::new();

fn patterns() -> &'static QueryPatterns {
    QUERY_PATTERNS.get_or_init(|| QueryPatterns {
        product: Regex::new(r"(?i)\bPROD\d+\b").expect("Invalid product pattern"),
        customer: Regex::new(r"(?i)\bCLI\d+\b").expect("Invalid customer pattern"),
        date: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("Invalid date pattern"),
    })
}

/// Keyword and pattern classifier used when no model is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    pub fn new() -> Self {
        Self
    }

    fn find_upper(re: &Regex, text: &str) -> Option<String> {
        re.find(text).map(|m| m.as_str().to_uppercase())
    }

    /// Map category synonyms in the query to a catalog category
    pub fn detect_category(query: &str) -> Option<&'static str> {
        let lowered = query.to_lowercase();
        CATEGORY_SYNONYMS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
            .map(|(category, _)| *category)
    }

    /// Choose a capability for a fresh query
    pub fn classify(&self, query: &str) -> Decision {
        let lowered = query.to_lowercase();
        let patterns = patterns();
        let product = Self::find_upper(&patterns.product, query);
        let customer = Self::find_upper(&patterns.customer, query);

        if LABEL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            if let (Some(product), Some(customer)) = (&product, &customer) {
                return invoke(
                    CapabilityId::GenerateLabel,
                    vec![product.clone(), customer.clone()],
                    "La consulta pide una etiqueta con producto y cliente",
                );
            }
        }

        if let Some(product) = product {
            let mut args = vec![product];
            if let Some(date) = patterns.date.find(query) {
                args.push(date.as_str().to_string());
            }
            return invoke(
                CapabilityId::CheckEligibility,
                args,
                "La consulta menciona un producto",
            );
        }

        if POLICY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            let args = Self::detect_category(query)
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            return invoke(
                CapabilityId::PolicyLookup,
                args,
                "La consulta pregunta por políticas",
            );
        }

        invoke(
            CapabilityId::KnowledgeQuery,
            vec![query.to_string()],
            "Consulta general sobre la base de conocimiento",
        )
    }
}

fn invoke(id: CapabilityId, args: Vec<String>, rationale: &str) -> Decision {
    Decision::Invoke {
        capability: id.as_str().to_string(),
        args: CapabilityArgs::from(args),
        rationale: rationale.to_string(),
    }
}

#[async_trait]
impl Reasoner for RuleBasedReasoner {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn decide(&self, ctx: &QueryContext) -> Decision {
        if let Some(result) = ctx.last_result() {
            return Decision::Final {
                text: result.text.clone(),
                rationale: format!("Resultado de {}", result.capability),
            };
        }
        self.classify(&ctx.raw_query)
    }
}

// ---------------------------------------------------------------------------
// Live
// ---------------------------------------------------------------------------

/// Model-backed reasoner. A failed or timed-out call degrades that step to
/// the rule-based reasoner.
pub struct LiveReasoner {
    provider: Arc<dyn CompletionProvider>,
    fallback: RuleBasedReasoner,
    timeout: Duration,

    /// Positional parameter names per capability, for object-style arguments
    params: BTreeMap<String, Vec<&'static str>>,
}

impl LiveReasoner {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        timeout: Duration,
        params: BTreeMap<String, Vec<&'static str>>,
    ) -> Self {
        Self {
            provider,
            fallback: RuleBasedReasoner::new(),
            timeout,
            params,
        }
    }

    /// Convert model-supplied arguments to positional form
    pub fn positional_args(&self, capability: &str, arguments: &Value) -> CapabilityArgs {
        let params = self
            .params
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let args = match arguments {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().map(value_text).collect(),
            Value::Object(map) if !params.is_empty() => params
                .iter()
                .map(|p| map.get(*p).map(value_text).unwrap_or_default())
                .collect(),
            Value::Object(map) => map.values().map(value_text).collect(),
            Value::String(s) if params.len() > 1 => {
                s.split_whitespace().map(str::to_string).collect()
            }
            other => vec![value_text(other)],
        };
        CapabilityArgs::from(args)
    }

    fn interpret(&self, raw: &str) -> Decision {
        match parse_response(raw) {
            Some(LLMResponse::ToolCall(call)) => Decision::Invoke {
                args: self.positional_args(&call.name, &call.arguments),
                capability: call.name,
                rationale: format!("Modelo: llamada {}", call.id),
            },
            Some(LLMResponse::FinalAnswer(answer)) => Decision::Final {
                text: answer.content,
                rationale: "Respuesta final del modelo".to_string(),
            },
            None => Decision::ParseError {
                raw: raw.to_string(),
            },
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Reasoner for LiveReasoner {
    fn name(&self) -> &str {
        "live"
    }

    async fn decide(&self, ctx: &QueryContext) -> Decision {
        let prompt = ctx.render_prompt();

        match complete_with_timeout(self.provider.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let decision = self.interpret(&raw);
                debug!("Model decision: {:?}", decision);
                decision
            }
            Err(e) => {
                let err = EngineError::from(e);
                warn!(
                    "Provider {} failed, using rule-based reasoning for this step: {} ({})",
                    self.provider.name(),
                    err,
                    err.user_hint()
                );
                self.fallback.decide(ctx).await
            }
        }
    }
}
