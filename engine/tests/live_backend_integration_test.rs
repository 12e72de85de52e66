//! Integration tests for the live completion backend
//!
//! A wiremock server stands in for the chat-completions API:
//! - status code mapping in `OpenAIProvider`
//! - a full live query (tool call, then final answer)
//! - fallback to rule-based reasoning on backend errors and timeouts
//! - repeated unparseable output ending the query

use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use eco_engine::agent::{Event, ModelType, Orchestrator, QueryStatus, TerminalState};
use eco_engine::config::{Config, LLMConfig};
use eco_engine::llm::openai::OpenAIProvider;
use eco_engine::llm::{CompletionProvider, LLMError};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn llm_config(base_url: &str) -> LLMConfig {
    let mut config = Config::default().llm;
    config.base_url = base_url.to_string();
    config.timeout_secs = 5;
    config
}

/// Live config whose key variable is set to a dummy key
fn live_config(temp_dir: &TempDir, base_url: &str, key_env: &str) -> Config {
    std::env::set_var(key_env, "sk-test-key");

    let mut config = Config::default();
    config.core.data_dir = temp_dir.path().join("data");
    config.core.log_file = temp_dir.path().join("interacciones.log");
    config.llm = llm_config(base_url);
    config.llm.api_key_env = key_env.to_string();
    config
}

#[tokio::test]
async fn test_openai_provider_returns_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  hola  ")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(&llm_config(&mock_server.uri()), "sk-test-key");
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model(), "gpt-4o-mini");
    assert_eq!(provider.complete("hi").await.unwrap(), "hola");
}

#[tokio::test]
async fn test_openai_provider_status_mapping() {
    for (status, expected) in [(401u16, "auth"), (403, "auth"), (429, "rate"), (500, "invalid")] {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new(&llm_config(&mock_server.uri()), "sk-test-key");
        let err = provider.complete("hi").await.unwrap_err();
        match expected {
            "auth" => assert!(matches!(err, LLMError::AuthenticationFailed(_)), "{status}: {err:?}"),
            "rate" => assert!(matches!(err, LLMError::RateLimitExceeded), "{status}: {err:?}"),
            _ => assert!(matches!(err, LLMError::InvalidRequest(_)), "{status}: {err:?}"),
        }
    }
}

#[tokio::test]
async fn test_openai_provider_empty_choices_is_parse_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(&llm_config(&mock_server.uri()), "sk-test-key");
    assert!(matches!(
        provider.complete("hi").await,
        Err(LLMError::ParseError(_))
    ));
}

#[tokio::test]
async fn test_live_query_tool_call_then_final_answer() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    // second step: the prompt now carries the capability observation
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("[check_eligibility]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"final_answer": "Lo siento, el plazo de devolución ya venció."}"#,
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"function\": \"check_eligibility\", \"arguments\": {\"product_id\": \"PROD001\", \"purchase_date\": \"2020-01-01\"}}\n```",
        )))
        .mount(&mock_server)
        .await;

    let config = live_config(&temp_dir, &mock_server.uri(), "ECOAGENT_TEST_KEY_LIVE_FLOW");
    let mut agent = Orchestrator::from_config(&config).unwrap();
    assert_eq!(agent.status().model_type, ModelType::OpenAI);
    assert_eq!(agent.status().reasoner, "live");

    let response = agent.process("¿Puedo devolver mi PROD001 de 2020?").await;

    assert_eq!(response.status, QueryStatus::Success);
    assert_eq!(response.terminal, TerminalState::Finished);
    assert_eq!(response.response, "Lo siento, el plazo de devolución ya venció.");
    assert_eq!(response.iterations, 2);
    match &response.trace[0] {
        Event::Action {
            capability_name,
            args,
            ..
        } => {
            assert_eq!(capability_name, "check_eligibility");
            assert_eq!(args.as_slice(), ["PROD001", "2020-01-01"]);
        }
        other => panic!("expected action, got {:?}", other),
    }
}

#[tokio::test]
async fn test_backend_failure_falls_back_to_rules() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let config = live_config(&temp_dir, &mock_server.uri(), "ECOAGENT_TEST_KEY_LIVE_DOWN");
    let mut agent = Orchestrator::from_config(&config).unwrap();

    // reasoning and synthesis both degrade
    let response = agent.process("Necesito ayuda con un pedido").await;
    assert_eq!(response.status, QueryStatus::Success);
    assert!(response.response.contains("Puedo ayudarte"));

    let response = agent.process("política de audio").await;
    assert!(response.is_success());
    assert!(response.response.contains("🎧 Audio"));

    // the strategy choice itself never changes
    assert_eq!(agent.get_stats().model_type, ModelType::OpenAI);
}

#[tokio::test]
async fn test_backend_timeout_falls_back_to_rules() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"final_answer": "too late"}"#))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = live_config(&temp_dir, &mock_server.uri(), "ECOAGENT_TEST_KEY_LIVE_SLOW");
    config.llm.timeout_secs = 1;
    let mut agent = Orchestrator::from_config(&config).unwrap();

    let response = agent.process("políticas para tablets").await;
    assert!(response.is_success());
    assert!(response.response.contains("📱 Tablets"));
    assert_ne!(response.response, "too late");
}

#[tokio::test]
async fn test_repeated_unparseable_output_ends_query() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("I am not sure what to do here.")),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = live_config(&temp_dir, &mock_server.uri(), "ECOAGENT_TEST_KEY_LIVE_GARBLED");
    let mut agent = Orchestrator::from_config(&config).unwrap();

    let response = agent.process("hola").await;
    assert_eq!(response.terminal, TerminalState::ParseFailure);
    assert_eq!(response.status, QueryStatus::Error);
    assert_eq!(response.iterations, 2);
    // only the Finish event
    assert_eq!(response.trace.len(), 1);
    assert_eq!(agent.stats().errors, 1);
}
