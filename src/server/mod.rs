// HTTP surface
// axum routes for chat, data preparation and direct recipe lookup


use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::AssistantError;
use crate::chat::{AppContext, ChatRequest, StreamEvent};

pub const WELCOME_MESSAGE: &str = "Welcome to the AI Cooking Assistant API!";

/// Error body returned with every non-2xx response
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    #[inline]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AssistantError> for ApiError {
    #[inline]
    fn from(error: AssistantError) -> Self {
        match error {
            AssistantError::InvalidRequest(message) => Self::new(StatusCode::BAD_REQUEST, message),
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct InitializeResponse {
    status: &'static str,
    message: String,
    recipes: usize,
}

/// All routes over a shared application context
#[inline]
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/chat", post(chat))
        .route("/data/initialize-recipes", post(initialize_recipes))
        .route("/recipes/{row_id}", get(recipe_by_row_id))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// Serve until Ctrl-C
#[inline]
pub async fn serve(context: Arc<AppContext>, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Cooking assistant listening on http://{}", addr);
    axum::serve(listener, router(context))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}

async fn welcome() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": WELCOME_MESSAGE }))
}

async fn chat(
    State(context): State<Arc<AppContext>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if !request.wants_stream() {
        let response = context.respond(&request).await?;
        return Ok(Json(response).into_response());
    }

    let receiver = context.stream(&request).await?;
    let events =
        ReceiverStream::new(receiver).map(|event| Ok::<_, Infallible>(sse_event(event)));
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Token(text) => Event::default().event("token").data(text),
        StreamEvent::Done { intent, recipes } => Event::default().event("done").data(
            serde_json::json!({ "intent": intent, "recipes": recipes }).to_string(),
        ),
        StreamEvent::Error(message) => Event::default().event("error").data(message),
    }
}

async fn initialize_recipes(
    State(context): State<Arc<AppContext>>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let report = context.rebuild().await?;
    Ok(Json(InitializeResponse {
        status: "success",
        message: report.summary(),
        recipes: report.recipes,
    }))
}

async fn recipe_by_row_id(
    State(context): State<Arc<AppContext>>,
    Path(row_id): Path<i64>,
) -> Result<Response, ApiError> {
    let engine = context.engine().await;
    engine
        .get_recipe_by_row_id(row_id)
        .map(|recipe| Json(recipe).into_response())
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Recipe {row_id} not found")))
}
