#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with both models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use recipe_assistant::config::{LlmConfig, OllamaConfig};
use recipe_assistant::embeddings::{Embedder, OllamaClient};
use recipe_assistant::llm::ollama::OllamaGenerator;
use recipe_assistant::llm::{GenerationChunk, LanguageModel};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn ollama_config() -> OllamaConfig {
    let mut config = OllamaConfig::default();
    config.host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    config.port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    if let Ok(model) = env::var("OLLAMA_MODEL") {
        config.model = model;
    }
    config
}

fn llm_config() -> LlmConfig {
    let mut config = LlmConfig {
        timeout_seconds: 120,
        ..LlmConfig::default()
    };
    if let Ok(model) = env::var("OLLAMA_LLM_MODEL") {
        config.model = model;
    }
    config
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_embeds_recipe_text() {
    init_test_tracing();

    let client = OllamaClient::new(&ollama_config())
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60));
    client.health_check().expect("embedding model is available");

    let texts = vec![
        "eggs, butter, chives".to_string(),
        "Classic French Omelette".to_string(),
    ];
    let embeddings = client.embed_batch(&texts).expect("embeddings");
    info!("Embedded {} texts", embeddings.len());

    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0].len(), embeddings[1].len());
    assert!(embeddings[0].iter().any(|value| *value != 0.0));
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_streams_an_answer() {
    init_test_tracing();

    let generator = OllamaGenerator::new(&ollama_config(), &llm_config())
        .expect("Failed to create generation client");

    let mut text = String::new();
    for chunk in generator.stream("User: Name one herb that goes with eggs.\nAssistant:") {
        match chunk {
            GenerationChunk::Text(token) => text.push_str(&token),
            GenerationChunk::Failed(message) => panic!("stream failed: {message}"),
        }
    }
    info!("Streamed answer: {}", text);
    assert!(!text.trim().is_empty());
}
