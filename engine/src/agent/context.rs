//! Per-query reasoning context
//!
//! Created when a query arrives, mutated only by the orchestrator while the
//! loop runs, and dropped once the final answer is produced.

use crate::llm::{Message, MessageRole};
use crate::retrieval::lexical::normalize_terms;

use super::recorder::Event;

/// How a dispatch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    /// The capability returned a result
    Result,

    /// The capability rejected its input
    CapabilityError,

    /// The reasoning step named a capability that does not exist
    UnknownCapability,
}

/// Result of one dispatch, folded back into the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub capability: String,
    pub text: String,
    pub kind: ObservationKind,
}

impl Observation {
    pub fn is_error(&self) -> bool {
        self.kind != ObservationKind::Result
    }
}

#[derive(Debug, Clone)]
pub struct QueryContext {
    pub raw_query: String,
    pub normalized_terms: Vec<String>,
    pub iteration_count: usize,
    pub trace: Vec<Event>,

    /// System framing, then user query, then decisions and observations
    transcript: Vec<Message>,
    observations: Vec<Observation>,
}

impl QueryContext {
    pub fn new(raw_query: impl Into<String>, framing: impl Into<String>) -> Self {
        let raw_query = raw_query.into();
        let transcript = vec![Message::system(framing), Message::user(raw_query.clone())];

        Self {
            normalized_terms: normalize_terms(&raw_query),
            raw_query,
            iteration_count: 0,
            trace: Vec::new(),
            transcript,
            observations: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Latest observation of any kind
    pub fn last_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Latest observation produced by an existing capability
    pub fn last_result(&self) -> Option<&Observation> {
        self.observations
            .iter()
            .rev()
            .find(|o| o.kind != ObservationKind::UnknownCapability)
    }

    /// Record the decision text the reasoning step produced
    pub fn push_decision(&mut self, content: impl Into<String>) {
        self.transcript.push(Message::assistant(content));
    }

    pub fn observe(&mut self, observation: Observation) {
        self.transcript.push(Message::tool_result(format!(
            "[{}] {}",
            observation.capability, observation.text
        )));
        self.observations.push(observation);
    }

    /// Fold a correction back in after unparseable reasoning output
    pub fn note_parse_error(&mut self, raw: &str) {
        self.transcript.push(Message::assistant(raw));
        self.transcript.push(Message::user(
            "Tu respuesta anterior no tenía un formato válido. Responde SOLO con \
             {\"function\": \"nombre\", \"arguments\": [...]} o {\"final_answer\": \"texto\"}.",
        ));
    }

    /// Flatten the transcript into a single completion prompt
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        for message in &self.transcript {
            let label = match message.role {
                MessageRole::System => None,
                MessageRole::User => Some("Usuario"),
                MessageRole::Assistant => Some("Asistente"),
                MessageRole::Tool => Some("Observación"),
            };
            match label {
                Some(label) => prompt.push_str(&format!("{}: {}\n\n", label, message.content)),
                None => prompt.push_str(&format!("{}\n\n", message.content)),
            }
        }
        prompt.push_str("Asistente:");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(kind: ObservationKind, text: &str) -> Observation {
        Observation {
            capability: "check_eligibility".to_string(),
            text: text.to_string(),
            kind,
        }
    }

    #[test]
    fn test_new_context() {
        let ctx = QueryContext::new("¿Puedo DEVOLVER esto?", "framing");
        assert_eq!(ctx.normalized_terms, vec!["¿puedo", "devolver", "esto?"]);
        assert_eq!(ctx.iteration_count, 0);
        assert!(ctx.trace.is_empty());
        assert_eq!(ctx.transcript().len(), 2);
        assert!(ctx.last_observation().is_none());
    }

    #[test]
    fn test_last_result_skips_unknown_capability() {
        let mut ctx = QueryContext::new("q", "f");
        ctx.observe(observation(ObservationKind::Result, "ok"));
        ctx.observe(observation(ObservationKind::UnknownCapability, "no such"));

        assert_eq!(ctx.last_observation().unwrap().text, "no such");
        assert_eq!(ctx.last_result().unwrap().text, "ok");
        assert!(ctx.last_observation().unwrap().is_error());
    }

    #[test]
    fn test_render_prompt_order() {
        let mut ctx = QueryContext::new("consulta", "Eres EcoAgent.");
        ctx.push_decision(r#"{"function": "lookup_return_policy", "arguments": []}"#);
        ctx.observe(observation(ObservationKind::Result, "30 días"));

        let prompt = ctx.render_prompt();
        let framing = prompt.find("Eres EcoAgent.").unwrap();
        let user = prompt.find("Usuario: consulta").unwrap();
        let obs = prompt.find("Observación: [check_eligibility] 30 días").unwrap();
        assert!(framing < user && user < obs);
        assert!(prompt.ends_with("Asistente:"));
    }
}
