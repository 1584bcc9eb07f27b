
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{GenerationChunk, LanguageModel, TokenStream, failed_stream, truncate_prompt};
use crate::config::{LlmConfig, OllamaConfig};
use crate::embeddings::RetryPolicy;

/// Text generation through Ollama's `/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    options: GenerateOptions,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    stop: Vec<String>,
    num_ctx: usize,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

/// One JSON object of the response, or one line of a streamed response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(ollama: &OllamaConfig, llm: &LlmConfig) -> Result<Self> {
        let base_url = ollama
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(llm.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: llm.model.clone(),
            options: GenerateOptions {
                temperature: llm.temperature,
                top_p: llm.top_p,
                repeat_penalty: llm.repeat_penalty,
                stop: llm.stop.clone(),
                num_ctx: llm.context_length,
            },
            agent,
            retry: RetryPolicy::default(),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry.attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.retry.backoff_base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn context_length(&self) -> usize {
        self.options.num_ctx
    }

    fn generate_url(&self) -> Result<Url> {
        self.base_url
            .join("/api/generate")
            .context("Failed to build generation URL")
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Result<String> {
        let prompt = truncate_prompt(prompt, self.options.num_ctx);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: &self.options,
        };
        serde_json::to_string(&request).context("Failed to serialize generation request")
    }

    /// Request a complete, non-streamed answer
    #[inline]
    pub fn try_generate(&self, prompt: &str) -> Result<String> {
        let url = self.generate_url()?;
        let body = self.request_body(prompt, false)?;
        debug!("Generating with {} ({} prompt bytes)", self.model, body.len());

        let response_text = self
            .retry
            .run(self.base_url.as_str(), || {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&body)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Generation request failed")?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generation response")?;
        if let Some(error) = response.error {
            return Err(anyhow::anyhow!("Ollama reported an error: {}", error));
        }

        Ok(response.response.trim().to_string())
    }

    /// Open a streamed generation. Only establishing the connection is retried.
    #[inline]
    pub fn try_stream(&self, prompt: &str) -> Result<TokenStream> {
        let url = self.generate_url()?;
        let body = self.request_body(prompt, true)?;
        debug!("Streaming from {} ({} prompt bytes)", self.model, body.len());

        let response = self
            .retry
            .run(self.base_url.as_str(), || {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&body)
            })
            .context("Streaming request failed")?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(NdjsonChunks::new(reader)))
    }
}

impl LanguageModel for OllamaGenerator {
    #[inline]
    fn generate(&self, prompt: &str) -> String {
        self.try_generate(prompt).unwrap_or_else(|e| {
            warn!("Generation failed: {:#}", e);
            format!("Error generating response: {:#}", e)
        })
    }

    #[inline]
    fn stream(&self, prompt: &str) -> TokenStream {
        self.try_stream(prompt).unwrap_or_else(|e| {
            warn!("Streaming generation failed: {:#}", e);
            failed_stream(format!("Error generating response: {:#}", e))
        })
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Newline-delimited JSON generation stream
struct NdjsonChunks<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: BufRead> NdjsonChunks<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    fn fail(&mut self, message: String) -> Option<GenerationChunk> {
        warn!("{}", message);
        self.finished = true;
        Some(GenerationChunk::Failed(message))
    }
}

impl<R: BufRead> Iterator for NdjsonChunks<R> {
    type Item = GenerationChunk;

    fn next(&mut self) -> Option<GenerationChunk> {
        while !self.finished {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return self.fail(format!("Generation stream broke off: {}", e)),
                None => return self.fail("Generation stream ended unexpectedly".to_string()),
            };
            if line.trim().is_empty() {
                continue;
            }

            let chunk: GenerateResponse = match serde_json::from_str(&line) {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(format!("Malformed generation chunk: {}", e)),
            };
            if let Some(error) = chunk.error {
                return self.fail(format!("Ollama reported an error: {}", error));
            }

            self.finished = chunk.done;
            if !chunk.response.is_empty() {
                return Some(GenerationChunk::Text(chunk.response));
            }
        }
        None
    }
}
