use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] retrieval::RetrievalError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Data preparation error: {0}")]
    Preparation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod recipes;
pub mod retrieval;
pub mod server;
