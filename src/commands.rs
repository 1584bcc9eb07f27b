use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::AppContext;
use crate::config::Config;
use crate::database::IndexStore;
use crate::database::sqlite::Database;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{ConsistencyValidator, load_retrieval_engine, prepare_recipes};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::ollama::OllamaGenerator;
use crate::server;

/// Clean the recipe dataset and rebuild the metadata store and vector indexes
#[inline]
pub async fn prepare_data(config_dir: &Path, data: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let data_path = data.unwrap_or_else(|| config.recipe_data_path());
    info!("Preparing recipe data from {}", data_path.display());

    let client = OllamaClient::new(&config.ollama)?;
    client
        .health_check()
        .context("Ollama is not ready for embedding")?;

    let report = prepare_recipes(&config, &data_path, Arc::new(client), true).await?;

    println!("✅ {}", report.summary());
    println!("   📄 Source rows: {}", report.source_rows);
    println!("   🔑 Fingerprint: {}", report.fingerprint);
    println!("   🗄️  Metadata: {}", config.database_path().display());
    println!("   🔍 Indexes: {}", config.index_dir().display());
    Ok(())
}

/// Load the prepared artifacts and serve the chat API until Ctrl-C
#[inline]
pub async fn serve(config_dir: &Path, bind: Option<String>) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let embedder = OllamaClient::new(&config.ollama)?;
    if let Err(e) = embedder.health_check() {
        warn!("Embedding model is not reachable yet: {:#}", e);
    }
    let generator = OllamaGenerator::new(&config.ollama, &config.llm)?;

    let engine = load_retrieval_engine(&config, embedder.model_name())
        .await
        .context("Failed to load retrieval artifacts, run `prepare` first")?;
    info!(
        "Loaded {} recipes across {} indexes",
        engine.metadata().len(),
        engine.indexes().len()
    );

    let context = AppContext::new(config, Arc::new(embedder), Arc::new(generator), engine);
    server::serve(Arc::new(context), &bind).await
}

/// Run one retrieval from the command line and print the hits
#[inline]
pub async fn search(
    config_dir: &Path,
    query: &str,
    top_k: Option<usize>,
    intent: Option<Intent>,
) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let client = OllamaClient::new(&config.ollama)?;
    let engine = load_retrieval_engine(&config, client.model_name()).await?;

    let intent = intent.unwrap_or_else(|| IntentClassifier::new().classify(query));
    let embedding = client.embed(query).context("Failed to embed query")?;
    let hits = engine.search_by_intent(&embedding, intent, top_k)?;

    match intent.target_field() {
        Some(field) => println!("🔍 Intent: {} (searching {})", intent, field),
        None => println!("🔍 Intent: {} (searching all indexes)", intent),
    }
    if hits.is_empty() {
        println!("   📭 No recipes found");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!();
        println!(
            "{}. {} (row {}, distance {:.4})",
            rank + 1,
            hit.recipe.name,
            hit.row_id,
            hit.distance
        );
        if let Some(total_time) = &hit.recipe.total_time {
            println!("   ⏱️  Total time: {}", total_time);
        }
        if let Some(rating) = hit.recipe.rating {
            println!("   ⭐ Rating: {:.1}", rating);
        }
        if !hit.recipe.ingredients_with_quantities.is_empty() {
            println!(
                "   🥕 Ingredients: {}",
                hit.recipe.ingredients_with_quantities.join(", ")
            );
        }
    }
    Ok(())
}

/// Print the full stored record for a row id
#[inline]
pub async fn show_recipe(config_dir: &Path, row_id: i64) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let database_path = config.database_path();
    if !database_path.exists() {
        anyhow::bail!("No recipe database found, run `prepare` first");
    }

    let database = Database::new(&database_path).await?;
    match database.get_recipe(row_id).await? {
        Some(recipe) => {
            let rendered =
                serde_json::to_string_pretty(&recipe).context("Failed to render recipe")?;
            println!("{rendered}");
        }
        None => println!("No recipe with row id {}", row_id),
    }
    Ok(())
}

/// Show the state of configuration, Ollama models and prepared artifacts
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        warn!("Falling back to default configuration: {:#}", e);
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("📊 Recipe Assistant Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    let mut ollama_ready = false;
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.list_models() {
            Ok(models) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                for (role, model) in [
                    ("Embedding", &config.ollama.model),
                    ("Generation", &config.llm.model),
                ] {
                    if models.iter().any(|m| &m.name == model) {
                        println!("   📋 {} model: {}", role, model);
                    } else {
                        println!("   ⚠️  {} model not pulled: {}", role, model);
                    }
                }
                ollama_ready = true;
            }
            Err(e) => println!("   ❌ Ollama: Failed to connect - {}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }

    println!();
    println!("🗄️  Metadata Store:");
    let database_path = config.database_path();
    let database = if database_path.exists() {
        match Database::new(&database_path).await {
            Ok(database) => {
                match database.count_recipes().await {
                    Ok(count) => println!("   ✅ SQLite: {} recipes", count),
                    Err(e) => println!("   ⚠️  SQLite: Connected but unreadable - {}", e),
                }
                Some(database)
            }
            Err(e) => {
                println!("   ❌ SQLite: Failed to open - {}", e);
                None
            }
        }
    } else {
        println!("   📭 No metadata store yet");
        None
    };

    println!();
    println!("🔍 Vector Indexes:");
    let index_dir = config.index_dir();
    let store = if index_dir.exists() {
        match IndexStore::open(&index_dir).await {
            Ok(store) => {
                match store.vector_counts().await {
                    Ok(counts) => {
                        for (field, count) in counts {
                            match count {
                                Some(count) => println!("   ✅ {}: {} vectors", field, count),
                                None => println!("   🚫 {}: missing", field),
                            }
                        }
                    }
                    Err(e) => println!("   ⚠️  LanceDB: Failed to count vectors - {}", e),
                }
                Some(store)
            }
            Err(e) => {
                println!("   ❌ LanceDB: Failed to open - {}", e);
                None
            }
        }
    } else {
        println!("   📭 No indexes yet");
        None
    };

    let mut consistent = false;
    if let (Some(database), Some(store)) = (&database, &store) {
        println!();
        println!("🧮 Artifact Consistency:");
        match ConsistencyValidator::new(database, store, &config.ollama.model)
            .validate_consistency()
            .await
        {
            Ok(report) => {
                consistent = report.is_consistent();
                if consistent {
                    println!("   ✅ {}", report.summary());
                } else {
                    println!("   ⚠️  {}", report.summary());
                    for issue in &report.issues {
                        println!("   • {}", issue);
                    }
                }
                if let Some(manifest) = &report.manifest {
                    println!(
                        "   🕒 Built {} with {}",
                        manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        manifest.embedding_model
                    );
                }
            }
            Err(e) => println!("   ❌ Failed to check consistency: {}", e),
        }
    }

    println!();
    println!("💡 Next Steps:");
    if !ollama_ready {
        println!("   • Start Ollama and pull the configured models");
    }
    if !consistent {
        println!(
            "   • Prepare the recipe data: recipe-assistant prepare --data {}",
            config.recipe_data_path().display()
        );
    }
    if ollama_ready && consistent {
        println!("   • Start the API: recipe-assistant serve");
    }
    println!("   • Adjust settings: recipe-assistant config");

    Ok(())
}
