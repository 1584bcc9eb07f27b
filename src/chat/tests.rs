use super::*;
use crate::recipes::Recipe;
use crate::retrieval::{EmbeddedField, FlatIndex, MetadataStore, VectorIndexSet};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Eggy questions land near the omelette, everything else near the pancakes
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.to_lowercase().contains("egg") {
            Ok(vec![0.0, 1.0])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn model_name(&self) -> &str {
        "keyword-embed"
    }
}

/// Replays fixed tokens and remembers every prompt it was given
struct ScriptedLlm {
    tokens: Vec<&'static str>,
    failure: Option<&'static str>,
    prompts: StdMutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(tokens: &[&'static str]) -> Self {
        Self {
            tokens: tokens.to_vec(),
            failure: None,
            prompts: StdMutex::new(Vec::new()),
        }
    }

    fn failing(tokens: &[&'static str], message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::new(tokens)
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("prompt lock")
            .last()
            .cloned()
            .expect("a prompt was recorded")
    }
}

impl LanguageModel for ScriptedLlm {
    fn generate(&self, prompt: &str) -> String {
        self.prompts.lock().expect("prompt lock").push(prompt.to_string());
        self.tokens.concat()
    }

    fn stream(&self, prompt: &str) -> TokenStream {
        self.prompts.lock().expect("prompt lock").push(prompt.to_string());
        let mut chunks: Vec<GenerationChunk> = self
            .tokens
            .iter()
            .map(|token| GenerationChunk::Text((*token).to_string()))
            .collect();
        chunks.extend(
            self.failure
                .map(|message| GenerationChunk::Failed(message.to_string())),
        );
        Box::new(chunks.into_iter())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn recipe(name: &str, ingredients: &[&str]) -> Recipe {
    Recipe {
        name: name.to_string(),
        ingredients_cleaned: ingredients.iter().map(|i| (*i).to_string()).collect(),
        ingredients_with_quantities: ingredients.iter().map(|i| format!("1 {i}")).collect(),
        instructions: vec![format!("Cook the {}.", name.to_lowercase())],
        ..Recipe::default()
    }
}

fn engine_with(recipes: Vec<Recipe>) -> RetrievalEngine {
    let points: [[f32; 2]; 3] = [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let mut set = VectorIndexSet::new();
    for field in EmbeddedField::ALL {
        let mut index = FlatIndex::new(2);
        for (row_id, point) in points.iter().enumerate().take(recipes.len()) {
            index.add(row_id as i64, point).expect("valid vector");
        }
        set.insert(field, Box::new(index));
    }
    RetrievalEngine::new(set, MetadataStore::new(recipes))
}

fn engine() -> RetrievalEngine {
    engine_with(vec![
        recipe("Pancakes", &["flour", "milk"]),
        recipe("Omelette", &["egg", "butter"]),
        recipe("Crepes", &["flour", "egg"]),
    ])
}

fn context(llm: Arc<ScriptedLlm>) -> AppContext {
    AppContext::new(Config::default(), Arc::new(KeywordEmbedder), llm, engine())
}

fn request(messages: Vec<ChatMessage>) -> ChatRequest {
    ChatRequest::new(messages)
}

async fn drain(mut receiver: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}

#[test]
fn latest_user_message_validation() {
    assert_eq!(
        request(Vec::new()).latest_user_message(),
        Err(ChatError::EmptyHistory)
    );
    assert_eq!(
        request(vec![ChatMessage::assistant("Hello!")]).latest_user_message(),
        Err(ChatError::NoUserMessage)
    );

    let chat = request(vec![
        ChatMessage::user("first"),
        ChatMessage::assistant("reply"),
        ChatMessage::user("second"),
        ChatMessage::assistant("another reply"),
    ]);
    assert_eq!(chat.latest_user_message(), Ok("second"));
}

#[test]
fn top_k_resolution() {
    let config = RetrievalConfig::default();
    let mut chat = request(vec![ChatMessage::user("hi")]);

    assert_eq!(chat.resolve_top_k(&config), Ok(config.default_top_k));

    for bad in [0, -3, i64::try_from(config.max_top_k).expect("fits") + 1] {
        chat.top_k = Some(bad);
        assert_eq!(
            chat.resolve_top_k(&config),
            Err(ChatError::InvalidTopK {
                value: bad,
                max: config.max_top_k
            })
        );
    }

    chat.top_k = Some(5);
    assert_eq!(chat.resolve_top_k(&config), Ok(5));
}

#[test]
fn request_deserializes_with_defaults() {
    let chat: ChatRequest = serde_json::from_str(
        r#"{"chat_history":[{"role":"user","content":"Eggs?"},{"role":"assistant","content":"Yes"}]}"#,
    )
    .expect("valid request");

    assert_eq!(chat.chat_history.len(), 2);
    assert_eq!(chat.chat_history[1].role, Role::Assistant);
    assert_eq!(chat.top_k, None);
    assert!(chat.wants_stream());

    let chat: ChatRequest =
        serde_json::from_str(r#"{"chat_history":[],"top_k":2,"stream":false}"#)
            .expect("valid request");
    assert_eq!(chat.top_k, Some(2));
    assert!(!chat.wants_stream());

    let unknown_role = r#"{"chat_history":[{"role":"robot","content":"x"}]}"#;
    assert!(serde_json::from_str::<ChatRequest>(unknown_role).is_err());
}

#[test]
fn role_display_is_capitalized() {
    assert_eq!(Role::User.to_string(), "User");
    assert_eq!(Role::Assistant.to_string(), "Assistant");
    assert_eq!(
        serde_json::to_string(&Role::System).expect("serializes"),
        "\"system\""
    );
}

#[test]
fn chat_errors_are_invalid_requests() {
    let error: AssistantError = ChatError::NoUserMessage.into();
    assert!(matches!(error, AssistantError::InvalidRequest(m) if m.contains("No user message")));
}

#[tokio::test]
async fn respond_uses_intent_and_context() {
    let llm = Arc::new(ScriptedLlm::new(&["Whisk ", "the ", "eggs."]));
    let ctx = context(Arc::clone(&llm));

    let mut chat = request(vec![ChatMessage::user("Tell me about omelette with eggs")]);
    chat.top_k = Some(2);
    let response = ctx.respond(&chat).await.expect("response");

    assert_eq!(response.intent, Intent::SpecificRecipe);
    assert_eq!(response.response, "Whisk the eggs.");
    assert_eq!(response.recipes.len(), 2);
    assert_eq!(response.recipes[0].recipe.name, "Omelette");
    assert_eq!(response.recipes[0].field, EmbeddedField::Title);

    let prompt = llm.last_prompt();
    assert!(prompt.contains("Recipe 1:\nName: Omelette"));
    assert!(prompt.contains("User: Tell me about omelette with eggs"));
}

#[tokio::test]
async fn invalid_request_fails_before_generation() {
    let llm = Arc::new(ScriptedLlm::new(&["unused"]));
    let ctx = context(Arc::clone(&llm));

    let result = ctx.respond(&request(Vec::new())).await;
    assert!(matches!(result, Err(AssistantError::InvalidRequest(_))));

    let mut chat = request(vec![ChatMessage::user("hi")]);
    chat.top_k = Some(0);
    assert!(matches!(
        ctx.stream(&chat).await,
        Err(AssistantError::InvalidRequest(_))
    ));
    assert!(llm.prompts.lock().expect("prompt lock").is_empty());
}

#[tokio::test]
async fn stream_emits_tokens_then_done() {
    let llm = Arc::new(ScriptedLlm::new(&["Pre", "heat ", "the ", "[pan](", "/p)", " now"]));
    let ctx = context(llm);

    let chat = request(vec![ChatMessage::user("What should I cook tonight?")]);
    let events = drain(ctx.stream(&chat).await.expect("stream starts")).await;

    let text: String = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Token(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Preheat the [pan](/p) now");
    assert!(events.contains(&StreamEvent::Token("[pan](/p)".to_string())));

    match events.last() {
        Some(StreamEvent::Done { intent, recipes }) => {
            assert_eq!(*intent, Intent::Unclear);
            assert_eq!(recipes.len(), 3);
        }
        other => panic!("expected done event, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_failure_ends_with_error() {
    let llm = Arc::new(ScriptedLlm::failing(&["Half ", "an"], "connection reset"));
    let ctx = context(llm);

    let chat = request(vec![ChatMessage::user("pancakes")]);
    let events = drain(ctx.stream(&chat).await.expect("stream starts")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Token("Half ".to_string()),
            StreamEvent::Token("an".to_string()),
            StreamEvent::Error("connection reset".to_string()),
        ]
    );
}

#[test]
fn forwarding_stops_when_receiver_is_gone() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let tokens: TokenStream = Box::new(std::iter::repeat_with(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        GenerationChunk::Text("word ".to_string())
    }));

    let (sender, receiver) = mpsc::channel(1);
    drop(receiver);
    forward_tokens(
        tokens,
        &sender,
        StreamEvent::Done {
            intent: Intent::Unclear,
            recipes: Vec::new(),
        },
    );

    assert_eq!(pulled.load(Ordering::SeqCst), 0);
}

#[test]
fn forwarding_stops_while_a_link_is_held() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let (sender, receiver) = mpsc::channel(1);
    let mut receiver = Some(receiver);
    let tokens: TokenStream = Box::new(std::iter::repeat_with(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            GenerationChunk::Text("see [x".to_string())
        } else {
            // The client goes away while the link text is still buffered
            receiver = None;
            GenerationChunk::Text(" y".to_string())
        }
    }));

    forward_tokens(
        tokens,
        &sender,
        StreamEvent::Done {
            intent: Intent::Unclear,
            recipes: Vec::new(),
        },
    );

    assert_eq!(pulled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn ingredient_search_lists_ingredients_on_hand() {
    let llm = Arc::new(ScriptedLlm::new(&["Make an omelette."]));
    let ctx = context(Arc::clone(&llm));

    let chat = request(vec![ChatMessage::user("I have eggs, butter and chives")]);
    let response = ctx.respond(&chat).await.expect("response");

    assert_eq!(response.intent, Intent::IngredientSearch);
    assert!(
        llm.last_prompt()
            .contains("Ingredients the user has on hand: eggs, butter, chives."),
        "{}",
        llm.last_prompt()
    );
}

#[tokio::test]
async fn other_intents_do_not_list_ingredients() {
    let llm = Arc::new(ScriptedLlm::new(&["ok"]));
    let ctx = context(Arc::clone(&llm));

    ctx.respond(&request(vec![ChatMessage::user("Tell me about pancakes with milk")]))
        .await
        .expect("response");

    assert!(!llm.last_prompt().contains("on hand:"));
}

#[test]
fn ingredients_on_hand_reads_after_the_cue() {
    assert_eq!(
        ingredients_on_hand("What can I cook with Rice & beans, onion?"),
        vec!["rice", "beans", "onion"]
    );
    assert_eq!(ingredients_on_hand("eggs, milk"), vec!["eggs", "milk"]);
    assert_eq!(
        ingredients_on_hand("Ingredients: leeks, potatoes"),
        vec!["leeks", "potatoes"]
    );
    assert!(ingredients_on_hand("I have").is_empty());
}

#[tokio::test]
async fn reinitialize_swaps_the_engine() {
    let ctx = context(Arc::new(ScriptedLlm::new(&["ok"])));
    let before = ctx.engine().await;
    assert_eq!(before.metadata().len(), 3);

    ctx.reinitialize(engine_with(vec![recipe("Toast", &["bread"])]))
        .await;

    assert_eq!(ctx.engine().await.metadata().len(), 1);
    // Holders of the previous engine keep a consistent view
    assert_eq!(before.metadata().len(), 3);
}
