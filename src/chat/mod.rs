// Conversation orchestration
// Validates chat requests, retrieves context, builds the prompt and drives generation

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AssistantError;
use crate::config::{Config, RetrievalConfig};
use crate::embeddings::Embedder;
use crate::indexer::{self, PrepareReport};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{ChunkBuffer, GenerationChunk, LanguageModel, TokenStream};
use crate::prompt::{assemble_prompt, generate_system_prompt};
use crate::recipes::{MinimalRecipe, parse_user_ingredients};
use crate::retrieval::{RetrievalEngine, RetrievedRecipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Chat history cannot be empty")]
    EmptyHistory,
    #[error("No user message found in chat history")]
    NoUserMessage,
    #[error("top_k must be between 1 and {max}, got {value}")]
    InvalidTopK { value: i64, max: usize },
}

impl From<ChatError> for AssistantError {
    #[inline]
    fn from(error: ChatError) -> Self {
        Self::InvalidRequest(error.to_string())
    }
}

impl ChatRequest {
    #[inline]
    pub fn new(chat_history: Vec<ChatMessage>) -> Self {
        Self {
            chat_history,
            ..Self::default()
        }
    }

    /// Content of the last user turn
    #[inline]
    pub fn latest_user_message(&self) -> Result<&str, ChatError> {
        if self.chat_history.is_empty() {
            return Err(ChatError::EmptyHistory);
        }
        self.chat_history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .ok_or(ChatError::NoUserMessage)
    }

    /// Requested top_k, or the configured default when absent
    #[inline]
    pub fn resolve_top_k(&self, config: &RetrievalConfig) -> Result<usize, ChatError> {
        let Some(value) = self.top_k else {
            return Ok(config.default_top_k);
        };
        usize::try_from(value)
            .ok()
            .filter(|top_k| (1..=config.max_top_k).contains(top_k))
            .ok_or(ChatError::InvalidTopK {
                value,
                max: config.max_top_k,
            })
    }

    /// Streaming is the default
    #[inline]
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(true)
    }
}

/// Everything needed to generate an answer for one request
#[derive(Debug, Clone)]
pub struct PreparedChat {
    /// Correlates the log lines of one request across the async and blocking halves
    pub request_id: Uuid,
    pub intent: Intent,
    pub recipes: Vec<RetrievedRecipe>,
    pub prompt: String,
}

/// Non-streamed answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Intent,
    pub recipes: Vec<RetrievedRecipe>,
}

/// What the generation worker hands to the response writer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Done {
        intent: Intent,
        recipes: Vec<RetrievedRecipe>,
    },
    Error(String),
}

/// Shared application state, built once at startup
pub struct AppContext {
    config: Config,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    classifier: IntentClassifier,
    engine: RwLock<Arc<RetrievalEngine>>,
    rebuild: Mutex<()>,
}

impl AppContext {
    #[inline]
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        engine: RetrievalEngine,
    ) -> Self {
        Self {
            config,
            embedder,
            llm,
            classifier: IntentClassifier::new(),
            engine: RwLock::new(Arc::new(engine)),
            rebuild: Mutex::new(()),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine serving requests right now
    #[inline]
    pub async fn engine(&self) -> Arc<RetrievalEngine> {
        Arc::clone(&*self.engine.read().await)
    }

    /// Publish a new engine. Requests already holding the old one finish with it.
    #[inline]
    pub async fn reinitialize(&self, engine: RetrievalEngine) {
        let engine = Arc::new(engine);
        *self.engine.write().await = engine;
        info!("Retrieval engine replaced");
    }

    /// Validate, classify, embed, retrieve and assemble the prompt
    #[inline]
    pub async fn prepare(&self, request: &ChatRequest) -> Result<PreparedChat, AssistantError> {
        let latest = request.latest_user_message()?;
        let top_k = request.resolve_top_k(&self.config.retrieval)?;
        let intent = self.classifier.classify(latest);
        let request_id = Uuid::new_v4();
        info!("Chat request {} classified as {} (top_k {})", request_id, intent, top_k);

        let embedder = Arc::clone(&self.embedder);
        let text = latest.to_string();
        let query = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| AssistantError::Other(e.into()))?
            .map_err(|e| AssistantError::Embedding(format!("{:#}", e)))?;

        let engine = self.engine().await;
        let recipes = engine.search_by_intent(&query, intent, top_k)?;

        let records: Vec<MinimalRecipe> = recipes.iter().map(|hit| hit.recipe.clone()).collect();
        let mut system_prompt = generate_system_prompt(latest);
        if intent == Intent::IngredientSearch {
            let on_hand = ingredients_on_hand(latest);
            if !on_hand.is_empty() {
                debug!("Request {} lists ingredients {:?}", request_id, on_hand);
                system_prompt.push_str("\n\nIngredients the user has on hand: ");
                system_prompt.push_str(&on_hand.join(", "));
                system_prompt.push('.');
            }
        }
        let prompt = assemble_prompt(&system_prompt, &records, &request.chat_history, latest);
        debug!(
            "Request {} prepared prompt of {} bytes with {} recipes",
            request_id,
            prompt.len(),
            records.len()
        );

        Ok(PreparedChat {
            request_id,
            intent,
            recipes,
            prompt,
        })
    }

    /// Answer in one piece
    #[inline]
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse, AssistantError> {
        let prepared = self.prepare(request).await?;

        let llm = Arc::clone(&self.llm);
        let prompt = prepared.prompt;
        let response = tokio::task::spawn_blocking(move || llm.generate(&prompt))
            .await
            .map_err(|e| AssistantError::Other(e.into()))?;
        debug!("Request {} answered with {} bytes", prepared.request_id, response.len());

        Ok(ChatResponse {
            response,
            intent: prepared.intent,
            recipes: prepared.recipes,
        })
    }

    /// Answer as a stream of events.
    ///
    /// Validation and retrieval failures are returned before anything is
    /// streamed; generation failures arrive as a final `Error` event.
    #[inline]
    pub async fn stream(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, AssistantError> {
        let prepared = self.prepare(request).await?;
        let (sender, receiver) = mpsc::channel(self.config.server.stream_buffer);

        let llm = Arc::clone(&self.llm);
        tokio::task::spawn_blocking(move || {
            let tokens = llm.stream(&prepared.prompt);
            let done = StreamEvent::Done {
                intent: prepared.intent,
                recipes: prepared.recipes,
            };
            forward_tokens(tokens, &sender, done);
            debug!("Request {} stream finished", prepared.request_id);
        });

        Ok(receiver)
    }

    /// Rerun the offline pipeline and swap in the rebuilt engine.
    /// Rebuilds never overlap: a concurrent call waits for the running one to
    /// finish and then rebuilds again from the data on disk at that point.
    #[inline]
    pub async fn rebuild(&self) -> Result<PrepareReport, AssistantError> {
        let _guard = self.rebuild.lock().await;
        info!("Rebuilding recipe data and indexes");

        let data_path = self.config.recipe_data_path();
        let report =
            indexer::prepare_recipes(&self.config, &data_path, Arc::clone(&self.embedder), false)
                .await?;
        let engine =
            indexer::load_retrieval_engine(&self.config, self.embedder.model_name()).await?;
        self.reinitialize(engine).await;

        Ok(report)
    }
}

impl fmt::Debug for AppContext {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("embedding_model", &self.embedder.model_name())
            .field("llm_model", &self.llm.model_name())
            .finish_non_exhaustive()
    }
}

/// Pull tokens through a `ChunkBuffer` and send the flushed text.
///
/// The channel is checked before every pull, so a gone receiver stops
/// generation even while the buffer is holding text back. Runs on a blocking thread.
#[inline]
pub fn forward_tokens(tokens: TokenStream, sender: &mpsc::Sender<StreamEvent>, done: StreamEvent) {
    let mut tokens = tokens;
    let mut buffer = ChunkBuffer::new();

    loop {
        if sender.is_closed() {
            debug!("Client disconnected, stopping generation");
            return;
        }
        let Some(chunk) = tokens.next() else {
            break;
        };

        match chunk {
            GenerationChunk::Text(text) => {
                let Some(ready) = buffer.push(&text) else {
                    continue;
                };
                if sender.blocking_send(StreamEvent::Token(ready)).is_err() {
                    debug!("Client disconnected, stopping generation");
                    return;
                }
            }
            GenerationChunk::Failed(message) => {
                warn!("Generation failed mid-stream: {}", message);
                if let Some(rest) = buffer.finish() {
                    let _ = sender.blocking_send(StreamEvent::Token(rest));
                }
                let _ = sender.blocking_send(StreamEvent::Error(message));
                return;
            }
        }
    }

    if let Some(rest) = buffer.finish() {
        if sender.blocking_send(StreamEvent::Token(rest)).is_err() {
            debug!("Client disconnected before the end of the answer");
            return;
        }
    }
    let _ = sender.blocking_send(done);
}

const INGREDIENT_CUES: [&str; 4] = ["have", "with", "using", "ingredients"];

/// Ingredient names listed after the first cue word in a message
fn ingredients_on_hand(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    let list = INGREDIENT_CUES
        .iter()
        .filter_map(|cue| lower.find(cue).map(|at| at + cue.len()))
        .min()
        .and_then(|start| lower.get(start..))
        .unwrap_or(lower.as_str())
        .trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    parse_user_ingredients(&list.replace(" and ", ", ").replace(" & ", ", "))
}
