
use super::models::*;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::recipes::Recipe;

const RECIPE_COLUMNS: &str = "row_id, recipe_id, name, author, description, category, keywords, \
     ingredients_raw, ingredients_cleaned, ingredients_with_quantities, instructions, calories, \
     fat, saturated_fat, cholesterol, sodium, carbohydrate, fiber, sugar, protein, cook_time, \
     prep_time, total_time, date_published, rating, review_count, servings, recipe_yield, images";

pub struct RecipeQueries;

impl RecipeQueries {
    /// Replace the whole table with `recipes`, assigning row ids by position
    #[inline]
    pub async fn replace_all(pool: &SqlitePool, recipes: &[Recipe]) -> Result<u64> {
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM recipes")
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipes")?;

        let insert = format!(
            "INSERT INTO recipes ({RECIPE_COLUMNS}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut inserted = 0u64;
        for (position, recipe) in recipes.iter().enumerate() {
            let row_id = i64::try_from(position).context("Too many recipes")?;
            let row = RecipeRow::from_recipe(row_id, recipe)?;

            inserted += sqlx::query(&insert)
                .bind(row.row_id)
                .bind(row.recipe_id)
                .bind(row.name)
                .bind(row.author)
                .bind(row.description)
                .bind(row.category)
                .bind(row.keywords)
                .bind(row.ingredients_raw)
                .bind(row.ingredients_cleaned)
                .bind(row.ingredients_with_quantities)
                .bind(row.instructions)
                .bind(row.calories)
                .bind(row.fat)
                .bind(row.saturated_fat)
                .bind(row.cholesterol)
                .bind(row.sodium)
                .bind(row.carbohydrate)
                .bind(row.fiber)
                .bind(row.sugar)
                .bind(row.protein)
                .bind(row.cook_time)
                .bind(row.prep_time)
                .bind(row.total_time)
                .bind(row.date_published)
                .bind(row.rating)
                .bind(row.review_count)
                .bind(row.servings)
                .bind(row.recipe_yield)
                .bind(row.images)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert recipe row {row_id}"))?
                .rows_affected();
        }

        tx.commit().await.context("Failed to commit recipes")?;

        info!("Stored {} recipes", inserted);
        Ok(inserted)
    }

    /// Every recipe in row order
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Recipe>> {
        let rows: Vec<RecipeRow> =
            sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY row_id"))
                .fetch_all(pool)
                .await
                .context("Failed to list recipes")?;

        // Row ids must be contiguous from zero to line up with index positions
        if let Some((position, row)) = rows
            .iter()
            .enumerate()
            .find(|(position, row)| i64::try_from(*position).ok() != Some(row.row_id))
        {
            return Err(anyhow::anyhow!(
                "Recipe table has a gap: expected row {} but found {}",
                position,
                row.row_id
            ));
        }

        debug!("Loaded {} recipe rows", rows.len());
        rows.into_iter().map(RecipeRow::into_recipe).collect()
    }

    #[inline]
    pub async fn get_by_row_id(pool: &SqlitePool, row_id: i64) -> Result<Option<Recipe>> {
        let row: Option<RecipeRow> =
            sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE row_id = ?"))
                .bind(row_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get recipe by row id")?;

        row.map(RecipeRow::into_recipe).transpose()
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(pool)
            .await
            .context("Failed to count recipes")
    }
}
