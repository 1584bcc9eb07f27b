// Language model collaborator
// Full and streamed text generation, plus the buffering applied to streamed output

pub mod buffer;
pub mod ollama;


pub use buffer::{ChunkBuffer, clean_streamed_text};
pub use ollama::OllamaGenerator;

/// Tokens kept free at the end of the context window for the answer
pub const RESPONSE_TOKEN_RESERVE: usize = 512;

/// One item of a streamed generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationChunk {
    Text(String),
    /// Generation broke off. Always the last item of a stream.
    Failed(String),
}

/// A finite, lazily produced generation
pub type TokenStream = Box<dyn Iterator<Item = GenerationChunk> + Send>;

pub trait LanguageModel: Send + Sync {
    /// Generate a complete answer. Failures come back as a diagnostic string.
    fn generate(&self, prompt: &str) -> String;

    /// Stream an answer token by token
    fn stream(&self, prompt: &str) -> TokenStream;

    fn model_name(&self) -> &str;
}

/// A stream holding one failure chunk
#[inline]
pub fn failed_stream(message: impl Into<String>) -> TokenStream {
    Box::new(std::iter::once(GenerationChunk::Failed(message.into())))
}

/// Keep only the last `context_length - RESPONSE_TOKEN_RESERVE` whitespace
/// separated tokens of `prompt`.
///
/// Prompts that already fit are returned unchanged; a truncated prompt keeps
/// the original spacing of its tail.
#[inline]
pub fn truncate_prompt(prompt: &str, context_length: usize) -> &str {
    let budget = context_length.saturating_sub(RESPONSE_TOKEN_RESERVE).max(1);

    let mut token_starts = Vec::new();
    let mut previous_is_space = true;
    for (index, c) in prompt.char_indices() {
        let is_space = c.is_whitespace();
        if !is_space && previous_is_space {
            token_starts.push(index);
        }
        previous_is_space = is_space;
    }

    if token_starts.len() <= budget {
        return prompt;
    }

    prompt
        .get(token_starts[token_starts.len() - budget]..)
        .unwrap_or(prompt)
}
