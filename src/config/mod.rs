// Configuration management module
// TOML settings for the embedding/generation endpoints, storage paths, retrieval and server

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, LlmConfig, OllamaConfig, PathsConfig, RetrievalConfig, ServerConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
