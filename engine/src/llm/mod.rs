//! LLM Provider Abstraction Layer
//!
//! The engine consumes a hosted language model as an opaque text-completion
//! capability: `prompt -> text`. The `CompletionProvider` trait defines that
//! contract so the reasoning step and the answer synthesizer can work with any
//! backend, and so tests can substitute scripted providers.
//!
//! This module also owns the reply protocol: model output is parsed into a
//! structured `LLMResponse` (tool call or final answer). Output matching
//! neither shape yields `None`, which callers treat as a parse failure.

use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => EngineError::LLMTimeout,
            LLMError::NetworkError(msg) => EngineError::Network(msg),
            other => EngineError::BackendUnavailable(other.to_string()),
        }
    }
}

/// Message in a reasoning transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a new tool observation message
    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,

    /// Tool result message
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Structured reply parsed from model output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// Model wants to call a capability
    ToolCall(ToolCall),

    /// Model has provided a final answer
    FinalAnswer(FinalAnswer),
}

/// Capability call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call
    pub id: String,

    /// Name of the capability to call
    pub name: String,

    /// Arguments as sent by the model (array, object or scalar)
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Final answer from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// The answer content
    pub content: String,
}

impl FinalAnswer {
    /// Create a new final answer
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Text-completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Complete a prompt
    ///
    /// # Returns
    /// * `Ok(String)` - The raw completion text
    /// * `Err(LLMError)` - Transport, auth or decoding failure
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Run a completion bounded by `limit`; expiry maps to `LLMError::Timeout`.
pub async fn complete_with_timeout(
    provider: &dyn CompletionProvider,
    prompt: &str,
    limit: Duration,
) -> Result<String> {
    match tokio::time::timeout(limit, provider.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "Provider {} timed out after {}ms",
                provider.name(),
                limit.as_millis()
            );
            Err(LLMError::Timeout)
        }
    }
}

/// Marker the model may use instead of JSON to give its final answer
const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Parse model output into a structured reply.
///
/// Handles these output formats:
/// 1. Raw JSON: `{"function": "...", "arguments": [...]}` or `{"final_answer": "..."}`
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. JSON embedded in prose, found by scanning for balanced objects
/// 4. A `Final Answer:` marker followed by the answer text
pub fn parse_response(content: &str) -> Option<LLMResponse> {
    let trimmed = content.trim();

    // Pattern 1: entire content is JSON
    if let Some(response) = try_parse_reply_json(trimmed) {
        return Some(response);
    }

    // Pattern 2: markdown code fence
    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(response) = try_parse_reply_json(inner.trim()) {
            return Some(response);
        }
    }

    // Pattern 3: first balanced object that parses as a reply
    for (pos, _) in trimmed.match_indices('{') {
        if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
            if let Some(response) = try_parse_reply_json(json_str) {
                return Some(response);
            }
        }
    }

    // Pattern 4: plain-text final answer marker
    if let Some(pos) = trimmed.find(FINAL_ANSWER_MARKER) {
        let answer = trimmed[pos + FINAL_ANSWER_MARKER.len()..].trim();
        if !answer.is_empty() {
            return Some(LLMResponse::FinalAnswer(FinalAnswer::new(answer)));
        }
    }

    None
}

/// Try to parse a string as a tool call or final answer object.
fn try_parse_reply_json(s: &str) -> Option<LLMResponse> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;

    if let Some(function) = json.get("function").and_then(|f| f.as_str()) {
        let arguments = json
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        return Some(LLMResponse::ToolCall(ToolCall::new(
            format!("call_{}", uuid::Uuid::new_v4()),
            function,
            arguments,
        )));
    }

    let answer = json.get("final_answer")?.as_str()?.trim();
    if answer.is_empty() {
        return None;
    }
    Some(LLMResponse::FinalAnswer(FinalAnswer::new(answer)))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
