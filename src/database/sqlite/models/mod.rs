#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::recipes::{Nutrition, Recipe};

/// One row of the `recipes` table. List columns are JSON-encoded text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RecipeRow {
    pub row_id: i64,
    pub recipe_id: Option<i64>,
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub keywords: String,
    pub ingredients_raw: String,
    pub ingredients_cleaned: String,
    pub ingredients_with_quantities: String,
    pub instructions: String,
    pub calories: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub sodium: Option<f64>,
    pub carbohydrate: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub protein: Option<f64>,
    pub cook_time: Option<String>,
    pub prep_time: Option<String>,
    pub total_time: Option<String>,
    pub date_published: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub servings: Option<f64>,
    pub recipe_yield: Option<String>,
    pub images: String,
}

impl RecipeRow {
    #[inline]
    pub fn from_recipe(row_id: i64, recipe: &Recipe) -> Result<Self> {
        Ok(Self {
            row_id,
            recipe_id: recipe.recipe_id,
            name: recipe.name.clone(),
            author: recipe.author.clone(),
            description: recipe.description.clone(),
            category: recipe.category.clone(),
            keywords: encode_list(&recipe.keywords)?,
            ingredients_raw: encode_list(&recipe.ingredients_raw)?,
            ingredients_cleaned: encode_list(&recipe.ingredients_cleaned)?,
            ingredients_with_quantities: encode_list(&recipe.ingredients_with_quantities)?,
            instructions: encode_list(&recipe.instructions)?,
            calories: recipe.calories,
            fat: recipe.nutrition.fat,
            saturated_fat: recipe.nutrition.saturated_fat,
            cholesterol: recipe.nutrition.cholesterol,
            sodium: recipe.nutrition.sodium,
            carbohydrate: recipe.nutrition.carbohydrate,
            fiber: recipe.nutrition.fiber,
            sugar: recipe.nutrition.sugar,
            protein: recipe.nutrition.protein,
            cook_time: recipe.cook_time.clone(),
            prep_time: recipe.prep_time.clone(),
            total_time: recipe.total_time.clone(),
            date_published: recipe.date_published.clone(),
            rating: recipe.rating,
            review_count: recipe.review_count,
            servings: recipe.servings,
            recipe_yield: recipe.recipe_yield.clone(),
            images: encode_list(&recipe.images)?,
        })
    }

    #[inline]
    pub fn into_recipe(self) -> Result<Recipe> {
        let row_id = self.row_id;
        let decode = |column: &str, value: &str| {
            decode_list(value).with_context(|| format!("Invalid {column} in recipe row {row_id}"))
        };

        Ok(Recipe {
            recipe_id: self.recipe_id,
            keywords: decode("keywords", &self.keywords)?,
            ingredients_raw: decode("ingredients_raw", &self.ingredients_raw)?,
            ingredients_cleaned: decode("ingredients_cleaned", &self.ingredients_cleaned)?,
            ingredients_with_quantities: decode(
                "ingredients_with_quantities",
                &self.ingredients_with_quantities,
            )?,
            instructions: decode("instructions", &self.instructions)?,
            images: decode("images", &self.images)?,
            name: self.name,
            author: self.author,
            description: self.description,
            category: self.category,
            calories: self.calories,
            nutrition: Nutrition {
                fat: self.fat,
                saturated_fat: self.saturated_fat,
                cholesterol: self.cholesterol,
                sodium: self.sodium,
                carbohydrate: self.carbohydrate,
                fiber: self.fiber,
                sugar: self.sugar,
                protein: self.protein,
            },
            cook_time: self.cook_time,
            prep_time: self.prep_time,
            total_time: self.total_time,
            date_published: self.date_published,
            rating: self.rating,
            review_count: self.review_count,
            servings: self.servings,
            recipe_yield: self.recipe_yield,
        })
    }
}

fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).context("Failed to encode list column")
}

fn decode_list(value: &str) -> Result<Vec<String>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(value).context("List column is not a JSON string array")
}
