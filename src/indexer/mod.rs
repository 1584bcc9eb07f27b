// Indexer module
// Offline pipeline from the raw recipe CSV to the metadata store and the persisted indexes,
// and loading of the retrieval engine from those artifacts

pub mod consistency;


use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::AssistantError;
use crate::config::Config;
use crate::database::IndexStore;
use crate::database::sqlite::Database;
use crate::embeddings::Embedder;
use crate::recipes::{Recipe, clean_recipes, load_recipe_table};
use crate::retrieval::{
    EmbeddedField, IndexBuilder, MetadataStore, RetrievalEngine, RetrievalError, VectorIndex,
};

pub use consistency::{ConsistencyIssue, ConsistencyReport, ConsistencyValidator};

/// Outcome of one run of the offline pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    /// Rows in the source CSV
    pub source_rows: usize,
    /// Cleaned records persisted and indexed
    pub recipes: usize,
    pub fields: Vec<EmbeddedField>,
    pub dimension: usize,
    pub fingerprint: String,
}

impl PrepareReport {
    /// Rows removed by cleaning
    #[inline]
    pub fn dropped(&self) -> usize {
        self.source_rows.saturating_sub(self.recipes)
    }

    #[inline]
    pub fn summary(&self) -> String {
        format!(
            "Prepared {} recipes ({} rows dropped) across {} indexes of dimension {}",
            self.recipes,
            self.dropped(),
            self.fields.len(),
            self.dimension
        )
    }
}

fn expected_dimension(config: &Config) -> Result<usize, AssistantError> {
    usize::try_from(config.ollama.embedding_dimension)
        .map_err(|e| AssistantError::Config(format!("Invalid embedding dimension: {}", e)))
}

/// Load and clean `data_path`, embed every recipe field, then persist the
/// metadata store and the indexes with their manifest.
///
/// Embedding happens before anything is written, so a failed run leaves the
/// previous artifacts in place.
#[inline]
pub async fn prepare_recipes(
    config: &Config,
    data_path: &Path,
    embedder: Arc<dyn Embedder>,
    show_progress: bool,
) -> Result<PrepareReport, AssistantError> {
    let path = data_path.to_path_buf();
    let (source_rows, recipes) = tokio::task::spawn_blocking(move || {
        let table = load_recipe_table(&path)?;
        let recipes = clean_recipes(&table)?;
        Ok::<_, AssistantError>((table.len(), recipes))
    })
    .await
    .map_err(|e| AssistantError::Other(e.into()))??;

    if recipes.is_empty() {
        return Err(AssistantError::Preparation(format!(
            "No usable recipes in {}",
            data_path.display()
        )));
    }
    info!("Cleaned {} of {} recipe rows", recipes.len(), source_rows);

    let batch_size = usize::try_from(config.ollama.batch_size)
        .map_err(|e| AssistantError::Config(format!("Invalid batch size: {}", e)))?;
    let dimension = expected_dimension(config)?;
    let (recipes, built) = tokio::task::spawn_blocking(move || {
        let built = IndexBuilder::new(&*embedder, batch_size)
            .with_expected_dimension(dimension)
            .with_progress(show_progress)
            .build(&recipes, &EmbeddedField::ALL);
        (recipes, built)
    })
    .await
    .map_err(|e| AssistantError::Other(e.into()))?;
    let built = built?;

    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open metadata store")?;
    let written = database
        .replace_recipes(&recipes)
        .await
        .context("Failed to persist cleaned recipes")?;
    debug!("Wrote {} recipes to the metadata store", written);
    database
        .optimize()
        .await
        .context("Failed to optimize metadata store")?;

    let store = IndexStore::open(&config.index_dir()).await?;
    store.persist(&built).await?;

    let report = PrepareReport {
        source_rows,
        recipes: recipes.len(),
        fields: built.indexes.keys().copied().collect(),
        dimension: built.manifest.dimension().unwrap_or(dimension),
        fingerprint: built.manifest.fingerprint.clone(),
    };
    info!("{}", report.summary());
    Ok(report)
}

/// Open the persisted artifacts and assemble a verified retrieval engine.
///
/// Any disagreement between the metadata store, the index tables, the
/// manifest and the configured embedding model is a configuration error.
#[inline]
pub async fn load_retrieval_engine(
    config: &Config,
    embedding_model: &str,
) -> Result<RetrievalEngine, AssistantError> {
    let recipes = load_metadata(config).await?;
    let metadata = MetadataStore::new(recipes);

    let store = IndexStore::open(&config.index_dir()).await?;
    let (indexes, manifest) = store.load(&EmbeddedField::ALL).await?;
    manifest.verify(&metadata, &indexes, embedding_model)?;

    let configured = expected_dimension(config)?;
    for field in indexes.fields() {
        let actual = indexes.get(field).map_or(configured, |index| index.dimension());
        if actual != configured {
            return Err(RetrievalError::DimensionMismatch {
                field,
                expected: configured,
                actual,
            }
            .into());
        }
    }

    info!(
        "Retrieval engine ready: {} recipes, {} indexes",
        metadata.len(),
        indexes.len()
    );
    Ok(RetrievalEngine::new(indexes, metadata).with_manifest(manifest))
}

async fn load_metadata(config: &Config) -> Result<Vec<Recipe>, AssistantError> {
    let database_path = config.database_path();
    if !database_path.exists() {
        return Err(AssistantError::Config(format!(
            "No metadata store at {}; run `prepare` first",
            database_path.display()
        )));
    }

    let database = Database::new(&database_path)
        .await
        .context("Failed to open metadata store")?;
    Ok(database
        .list_recipes()
        .await
        .context("Failed to read recipes from the metadata store")?)
}
