use clap::{Parser, Subcommand};
use recipe_assistant::commands::{prepare_data, search, serve, show_recipe, show_status};
use recipe_assistant::config::{get_config_dir, run_interactive_config, show_config};
use recipe_assistant::intent::Intent;
use recipe_assistant::{AssistantError, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recipe-assistant")]
#[command(about = "A retrieval-augmented cooking assistant over a recipe dataset")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the prepared artifacts
    #[arg(long, env = "RECIPE_ASSISTANT_HOME", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and model settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Clean the recipe CSV and build the metadata store and vector indexes
    Prepare {
        /// Recipe CSV to read instead of the configured path
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Start the chat API
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Retrieve recipes for a question without generating an answer
    Search {
        /// The question or keywords to search for
        query: String,
        /// Number of recipes to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Force an intent instead of classifying the query, e.g. "ingredient_search"
        #[arg(long)]
        intent: Option<Intent>,
    },
    /// Show the stored record for a row id
    Show {
        /// Row id of the recipe in the metadata store
        row_id: i64,
    },
    /// Show the status of Ollama and the prepared artifacts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| AssistantError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Prepare { data } => {
            prepare_data(&config_dir, data).await?;
        }
        Commands::Serve { bind } => {
            serve(&config_dir, bind).await?;
        }
        Commands::Search {
            query,
            top_k,
            intent,
        } => {
            search(&config_dir, &query, top_k, intent).await?;
        }
        Commands::Show { row_id } => {
            show_recipe(&config_dir, row_id).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}
