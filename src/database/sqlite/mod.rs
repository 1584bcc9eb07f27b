use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::queries::RecipeQueries;
use crate::recipes::Recipe;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

pub const DATABASE_FILE_NAME: &str = "recipes.db";

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join(DATABASE_FILE_NAME)).await
    }

    // Recipe operations
    #[inline]
    pub async fn replace_recipes(&self, recipes: &[Recipe]) -> Result<u64> {
        RecipeQueries::replace_all(&self.pool, recipes).await
    }

    #[inline]
    pub async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        RecipeQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn get_recipe(&self, row_id: i64) -> Result<Option<Recipe>> {
        RecipeQueries::get_by_row_id(&self.pool, row_id).await
    }

    #[inline]
    pub async fn count_recipes(&self) -> Result<i64> {
        RecipeQueries::count(&self.pool).await
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}
