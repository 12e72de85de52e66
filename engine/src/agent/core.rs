//! Orchestrator
//!
//! Runs one query through a bounded reason-act-observe loop:
//!
//! 1. Build a `QueryContext` with the system framing and the raw query
//! 2. Ask the reasoner for a `Decision`
//! 3. `Invoke`: dispatch through the registry, log an Action event, fold the
//!    result back into the context and loop
//! 4. `Final`: stop with the reasoner's answer
//! 5. `ParseError`: retry reasoning within the same budget, then give up
//!
//! The loop ends in `Finished`, `MaxIterationsReached` or `ParseFailure`.
//! Every query appends exactly one Finish event and bumps exactly one of
//! `successes` / `errors`. Nothing in here returns an error to the caller.

use chrono::{DateTime, Utc};
use sdk::{CapabilityArgs, EngineError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::llm::openai::OpenAIProvider;
use crate::llm::CompletionProvider;
use crate::retrieval::corpus::load_corpus;
use crate::retrieval::{LexicalRetriever, Retriever};
use crate::synthesis::{LiveSynthesizer, RuleBasedSynthesizer, Synthesizer};
use crate::tools::{Catalog, CapabilityRegistry};

use super::context::{Observation, ObservationKind, QueryContext};
use super::reasoner::{Decision, LiveReasoner, Reasoner, RuleBasedReasoner};
use super::recorder::{Event, EventLog, InteractionRecorder, ModelType, Stats, StatsReport};

/// Answer used when a query ends without any capability result
const NO_ANSWER: &str = "Lo siento, no pude completar tu consulta. Intenta reformularla \
                         o incluye el ID del producto y la fecha de compra.";

/// How the reasoning loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Finished,
    MaxIterationsReached,
    ParseFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

/// Result of `Orchestrator::process`
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub status: QueryStatus,
    pub tools_available: usize,
    pub stats: Stats,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub iterations: usize,
    pub terminal: TerminalState,
    pub trace: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// Fixed strategy choice and inventory
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub model_type: ModelType,
    pub reasoner: String,
    pub retriever: String,
    pub documents: usize,
    pub capabilities: Vec<&'static str>,
    pub max_iterations: usize,
    pub log_file: Option<PathBuf>,
}

/// Everything the orchestrator owns, assembled by the caller
pub struct AgentParts {
    pub reasoner: Box<dyn Reasoner>,
    pub registry: CapabilityRegistry,
    pub retriever: Arc<dyn Retriever>,
    pub recorder: InteractionRecorder,
    pub model_type: ModelType,
    pub max_iterations: usize,
    pub parse_retries: usize,
}

pub struct Orchestrator {
    reasoner: Box<dyn Reasoner>,
    registry: CapabilityRegistry,
    retriever: Arc<dyn Retriever>,
    recorder: InteractionRecorder,
    model_type: ModelType,
    max_iterations: usize,
    parse_retries: usize,
    framing: String,
}

/// Outcome of the loop before it is turned into a response
struct LoopOutcome {
    terminal: TerminalState,
    final_text: Option<String>,
    rationale: String,
}

impl Orchestrator {
    pub fn new(parts: AgentParts) -> Self {
        let framing = system_framing(&parts.registry);
        Self {
            reasoner: parts.reasoner,
            registry: parts.registry,
            retriever: parts.retriever,
            recorder: parts.recorder,
            model_type: parts.model_type,
            max_iterations: parts.max_iterations.max(1),
            parse_retries: parts.parse_retries,
            framing,
        }
    }

    /// Build the standard engine. The live strategies are selected when the
    /// configured API key variable is set; the choice never changes afterwards.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        let documents = load_corpus(&config.core.data_dir);
        let retriever: Arc<dyn Retriever> = Arc::new(LexicalRetriever::from_documents(documents));

        let provider: Option<Arc<dyn CompletionProvider>> = config.llm.api_key().map(|key| {
            Arc::new(OpenAIProvider::new(&config.llm, key)) as Arc<dyn CompletionProvider>
        });

        let timeout = config.llm.timeout();
        let top_k = config.agent.top_k;

        let synthesizer: Arc<dyn Synthesizer> = match &provider {
            Some(provider) => Arc::new(LiveSynthesizer::new(Arc::clone(provider), timeout, top_k)),
            None => Arc::new(RuleBasedSynthesizer),
        };

        let registry = CapabilityRegistry::standard(
            Arc::new(Catalog::default()),
            clock,
            Arc::clone(&retriever),
            synthesizer,
            top_k,
        );

        let (reasoner, model_type): (Box<dyn Reasoner>, ModelType) = match provider {
            Some(provider) => (
                Box::new(LiveReasoner::new(provider, timeout, registry.param_table())),
                ModelType::OpenAI,
            ),
            None => {
                info!(
                    "{} not set; using rule-based reasoning and synthesis",
                    config.llm.api_key_env
                );
                (Box::new(RuleBasedReasoner::new()), ModelType::Simulated)
            }
        };

        let recorder = InteractionRecorder::new(Some(EventLog::open(&config.core.log_file)?));

        Ok(Self::new(AgentParts {
            reasoner,
            registry,
            retriever,
            recorder,
            model_type,
            max_iterations: config.agent.max_iterations,
            parse_retries: config.agent.parse_retries,
        }))
    }

    /// Resolve one query. Never fails; problems come back as `status = error`.
    pub async fn process(&mut self, query: &str) -> QueryResponse {
        let query_id = Uuid::new_v4();
        let started = Instant::now();
        info!("Processing query {}: {}", query_id, query);

        let mut ctx = QueryContext::new(query, self.framing.clone());
        let outcome = self.run_loop(&mut ctx).await;

        let (response, status, error) = resolve_answer(&ctx, &outcome, self.max_iterations);

        self.recorder.record(
            &mut ctx.trace,
            Event::Finish {
                output: response.clone(),
                rationale: outcome.rationale.clone(),
            },
        );
        self.recorder
            .stats_mut()
            .record_outcome(status == QueryStatus::Success);

        info!(
            "Query {} ended {:?} ({:?}) after {} iterations in {}ms",
            query_id,
            outcome.terminal,
            status,
            ctx.iteration_count,
            started.elapsed().as_millis()
        );

        QueryResponse {
            response,
            status,
            tools_available: self.registry.len(),
            stats: self.recorder.stats().clone(),
            timestamp: Utc::now(),
            user_input: query.to_string(),
            iterations: ctx.iteration_count,
            terminal: outcome.terminal,
            trace: ctx.trace,
            error,
        }
    }

    async fn run_loop(&mut self, ctx: &mut QueryContext) -> LoopOutcome {
        let mut parse_failures = 0;

        while ctx.iteration_count < self.max_iterations {
            ctx.iteration_count += 1;
            debug!(
                "Reasoning step {}/{} via {}",
                ctx.iteration_count,
                self.max_iterations,
                self.reasoner.name()
            );

            let decision = self.reasoner.decide(ctx).await;
            match decision {
                Decision::Final { text, rationale } => {
                    return LoopOutcome {
                        terminal: TerminalState::Finished,
                        final_text: Some(text),
                        rationale,
                    };
                }
                Decision::Invoke {
                    capability,
                    args,
                    rationale,
                } => {
                    ctx.push_decision(
                        serde_json::json!({ "function": &capability, "arguments": &args }).to_string(),
                    );
                    self.recorder.record(
                        &mut ctx.trace,
                        Event::Action {
                            capability_name: capability.clone(),
                            args: args.clone(),
                            rationale,
                        },
                    );

                    let observation = self.dispatch(&capability, &args).await;
                    ctx.observe(observation);
                }
                Decision::ParseError { raw } => {
                    parse_failures += 1;
                    warn!(
                        "Unparseable reasoning output ({}/{}): {}",
                        parse_failures,
                        self.parse_retries + 1,
                        raw
                    );
                    if parse_failures > self.parse_retries {
                        return LoopOutcome {
                            terminal: TerminalState::ParseFailure,
                            final_text: None,
                            rationale: "La salida del razonamiento no pudo interpretarse".to_string(),
                        };
                    }
                    ctx.note_parse_error(&raw);
                }
            }
        }

        warn!("Iteration limit of {} reached", self.max_iterations);
        LoopOutcome {
            terminal: TerminalState::MaxIterationsReached,
            final_text: None,
            rationale: format!("Se alcanzó el límite de {} iteraciones", self.max_iterations),
        }
    }

    async fn dispatch(&mut self, capability: &str, args: &CapabilityArgs) -> Observation {
        let outcome = self.registry.dispatch(capability, args).await;

        if !matches!(outcome, Err(EngineError::CapabilityNotFound(_))) {
            self.recorder.stats_mut().record_use(capability);
        }

        let (text, kind) = match outcome {
            Ok(text) => (text, ObservationKind::Result),
            Err(EngineError::CapabilityNotFound(name)) => (
                format!(
                    "Error: la capacidad '{}' no existe. Capacidades disponibles: {}",
                    name,
                    self.registry.names().join(", ")
                ),
                ObservationKind::UnknownCapability,
            ),
            Err(EngineError::InvalidArgument(message)) => (message, ObservationKind::CapabilityError),
            Err(other) => (other.to_string(), ObservationKind::CapabilityError),
        };

        Observation {
            capability: capability.to_string(),
            text,
            kind,
        }
    }

    /// Cumulative statistics summary
    pub fn get_stats(&self) -> StatsReport {
        let stats = self.recorder.stats();
        StatsReport {
            total_interactions: stats.total,
            successful_interactions: stats.successes,
            error_rate: stats.error_rate(),
            tools_available: self.registry.len(),
            retrieval_available: self.retriever.document_count() > 0,
            model_type: self.model_type,
        }
    }

    pub fn stats(&self) -> &Stats {
        self.recorder.stats()
    }

    pub fn reset_stats(&mut self) {
        info!("Resetting interaction statistics");
        self.recorder.reset_stats();
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            model_type: self.model_type,
            reasoner: self.reasoner.name().to_string(),
            retriever: self.retriever.name().to_string(),
            documents: self.retriever.document_count(),
            capabilities: self.registry.names(),
            max_iterations: self.max_iterations,
            log_file: self.recorder.log_path().map(|p| p.to_path_buf()),
        }
    }
}

/// Pick the caller-visible answer, status and error text
fn resolve_answer(
    ctx: &QueryContext,
    outcome: &LoopOutcome,
    max_iterations: usize,
) -> (String, QueryStatus, Option<String>) {
    let last = ctx.last_result();

    if let Some(text) = outcome.final_text.as_deref().map(str::trim) {
        if !text.is_empty() {
            return match last {
                Some(obs) if obs.is_error() => (text.to_string(), QueryStatus::Error, Some(obs.text.clone())),
                _ => (text.to_string(), QueryStatus::Success, None),
            };
        }
    }

    match last {
        Some(obs) if obs.is_error() => (obs.text.clone(), QueryStatus::Error, Some(obs.text.clone())),
        Some(obs) => (obs.text.clone(), QueryStatus::Success, None),
        None => {
            let reason = match outcome.terminal {
                TerminalState::Finished => "El razonamiento terminó sin respuesta".to_string(),
                TerminalState::MaxIterationsReached => format!(
                    "Se alcanzó el límite de {} iteraciones sin resultado",
                    max_iterations
                ),
                TerminalState::ParseFailure => {
                    "La salida del razonamiento no pudo interpretarse".to_string()
                }
            };
            (NO_ANSWER.to_string(), QueryStatus::Error, Some(reason))
        }
    }
}

/// Role, capability listing and reply protocol given to the reasoning step
fn system_framing(registry: &CapabilityRegistry) -> String {
    format!(
        "Eres EcoAgent, el asistente de devoluciones de EcoTech. Ayudas a los clientes a \
         verificar si un producto puede devolverse, generar etiquetas de devolución y \
         consultar políticas y procedimientos de la empresa.\n\
         \n\
         REGLAS:\n\
         1. Para usar una capacidad, responde SOLO con el objeto JSON, sin texto adicional:\n\
         {{\"function\": \"nombre_capacidad\", \"arguments\": [\"arg1\", \"arg2\"]}}\n\
         2. Cuando tengas la respuesta, responde SOLO con:\n\
         {{\"final_answer\": \"tu respuesta\"}}\n\
         3. Nunca inventes el resultado de una capacidad; espera la observación.\n\
         4. Las fechas van en formato YYYY-MM-DD.\n\
         \n\
         Capacidades disponibles:\n\
         \n\
         {}",
        registry.describe()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::corpus::knowledge_base;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed list of decisions, repeating the last one
    struct Scripted {
        decisions: Mutex<Vec<Decision>>,
    }

    impl Scripted {
        fn new(decisions: Vec<Decision>) -> Box<Self> {
            Box::new(Self {
                decisions: Mutex::new(decisions),
            })
        }
    }

    #[async_trait]
    impl Reasoner for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn decide(&self, _ctx: &QueryContext) -> Decision {
            let mut decisions = self.decisions.lock().unwrap();
            if decisions.len() > 1 {
                decisions.remove(0)
            } else {
                decisions[0].clone()
            }
        }
    }

    fn orchestrator(reasoner: Box<dyn Reasoner>) -> Orchestrator {
        let retriever: Arc<dyn Retriever> = Arc::new(LexicalRetriever::from_documents(knowledge_base()));
        let registry = CapabilityRegistry::standard(
            Arc::new(Catalog::default()),
            Arc::new(SystemClock),
            Arc::clone(&retriever),
            Arc::new(RuleBasedSynthesizer),
            4,
        );
        Orchestrator::new(AgentParts {
            reasoner,
            registry,
            retriever,
            recorder: InteractionRecorder::in_memory(),
            model_type: ModelType::Simulated,
            max_iterations: 5,
            parse_retries: 1,
        })
    }

    fn invoke(name: &str, args: &[&str]) -> Decision {
        Decision::Invoke {
            capability: name.to_string(),
            args: CapabilityArgs::new(args.iter().copied()),
            rationale: "test".to_string(),
        }
    }

    fn parse_error() -> Decision {
        Decision::ParseError {
            raw: "???".to_string(),
        }
    }

    #[tokio::test]
    async fn test_direct_final_answer() {
        let mut agent = orchestrator(Scripted::new(vec![Decision::Final {
            text: "Hola".to_string(),
            rationale: "greeting".to_string(),
        }]));

        let response = agent.process("hola").await;
        assert_eq!(response.response, "Hola");
        assert_eq!(response.status, QueryStatus::Success);
        assert_eq!(response.terminal, TerminalState::Finished);
        assert_eq!(response.iterations, 1);
        assert_eq!(response.trace.len(), 1);
        assert_eq!(response.tools_available, 4);
    }

    #[tokio::test]
    async fn test_rule_based_policy_flow() {
        let mut agent = orchestrator(Box::new(RuleBasedReasoner::new()));
        let response = agent.process("¿Qué política aplica a las laptops?").await;

        assert!(response.is_success());
        assert!(response.response.contains("💻 Computadoras"));
        assert_eq!(response.iterations, 2);
        assert!(matches!(
            &response.trace[0],
            Event::Action { capability_name, .. } if capability_name == "lookup_return_policy"
        ));
        assert!(matches!(response.trace[1], Event::Finish { .. }));
        assert_eq!(response.stats.per_capability_uses["lookup_return_policy"], 1);
    }

    #[tokio::test]
    async fn test_unknown_capability_then_recovery() {
        let mut agent = orchestrator(Scripted::new(vec![
            invoke("send_fax", &[]),
            invoke("lookup_return_policy", &["Audio"]),
            Decision::Final {
                text: "Audio: 14 días".to_string(),
                rationale: "done".to_string(),
            },
        ]));

        let response = agent.process("política de audio").await;
        assert!(response.is_success());
        assert_eq!(response.iterations, 3);
        assert_eq!(response.trace.len(), 3);
        assert!(!response.stats.per_capability_uses.contains_key("send_fax"));
    }

    #[tokio::test]
    async fn test_only_unknown_capabilities_yield_generic_failure() {
        let mut agent = orchestrator(Scripted::new(vec![invoke("send_fax", &[])]));

        let response = agent.process("fax").await;
        assert_eq!(response.terminal, TerminalState::MaxIterationsReached);
        assert_eq!(response.status, QueryStatus::Error);
        assert_eq!(response.response, NO_ANSWER);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_single_parse_error_is_retried() {
        let mut agent = orchestrator(Scripted::new(vec![
            parse_error(),
            Decision::Final {
                text: "ok".to_string(),
                rationale: "done".to_string(),
            },
        ]));

        let response = agent.process("x").await;
        assert_eq!(response.terminal, TerminalState::Finished);
        assert_eq!(response.iterations, 2);
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_repeated_parse_errors_end_query() {
        let mut agent = orchestrator(Scripted::new(vec![
            invoke("lookup_return_policy", &[]),
            parse_error(),
        ]));

        let response = agent.process("x").await;
        assert_eq!(response.terminal, TerminalState::ParseFailure);
        assert_eq!(response.iterations, 3);
        // best partial answer is the last capability result
        assert!(response.response.contains("POLÍTICAS GENERALES"));
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_capability_error_sets_status() {
        let mut agent = orchestrator(Box::new(RuleBasedReasoner::new()));
        let response = agent.process("Quiero devolver el PROD999 comprado el 2024-10-01").await;

        assert_eq!(response.status, QueryStatus::Error);
        assert!(response.response.contains("PROD999"));
        assert_eq!(response.stats.errors, 1);
        assert_eq!(response.stats.successes, 0);
    }

    #[tokio::test]
    async fn test_get_stats_and_reset() {
        let mut agent = orchestrator(Box::new(RuleBasedReasoner::new()));
        agent.process("políticas").await;
        agent.process("PROD999").await;

        let report = agent.get_stats();
        assert_eq!(report.total_interactions, 2);
        assert_eq!(report.successful_interactions, 1);
        assert!((report.error_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.tools_available, 4);
        assert!(report.retrieval_available);
        assert_eq!(report.model_type, ModelType::Simulated);

        agent.reset_stats();
        assert_eq!(agent.get_stats().total_interactions, 0);
        assert_eq!(agent.stats(), &Stats::default());
    }

    #[test]
    fn test_framing_lists_capabilities() {
        let agent = orchestrator(Box::new(RuleBasedReasoner::new()));
        assert!(agent.framing.contains("## generate_return_label"));
        assert!(agent.framing.contains("\"final_answer\""));

        let status = agent.status();
        assert_eq!(status.reasoner, "rule_based");
        assert_eq!(status.documents, 4);
        assert_eq!(status.capabilities.len(), 4);
        assert!(status.log_file.is_none());
    }
}
