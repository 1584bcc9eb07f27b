// Recipe records
// Cleaned recipe rows and the projections served to chat and lookup callers

pub mod cleaning;


use serde::{Deserialize, Serialize};
use std::fmt;

pub use cleaning::{
    RawRecipeTable, clean_recipes, combine_ingredients_with_quantities, load_recipe_table,
    parse_iso_duration, parse_r_list_string, parse_user_ingredients, to_snake_case,
};

/// One cleaned recipe row. Its position in the metadata store is its row id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recipe {
    /// Identifier from the source dataset, if present
    pub recipe_id: Option<i64>,
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    /// Ingredient names as they appear in the dataset
    pub ingredients_raw: Vec<String>,
    /// Lowercased ingredient names with empty entries removed
    pub ingredients_cleaned: Vec<String>,
    /// "quantity ingredient" pairs, truncated to the shorter of both lists
    pub ingredients_with_quantities: Vec<String>,
    pub instructions: Vec<String>,
    pub calories: Option<f64>,
    pub nutrition: Nutrition,
    /// Durations rendered as `HH:MM`
    pub cook_time: Option<String>,
    pub prep_time: Option<String>,
    pub total_time: Option<String>,
    pub date_published: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub servings: Option<f64>,
    pub recipe_yield: Option<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Nutrition {
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub sodium: Option<f64>,
    pub carbohydrate: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub protein: Option<f64>,
}

/// The fixed field set shown in chat answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalRecipe {
    pub name: String,
    pub ingredients_with_quantities: Vec<String>,
    pub instructions: Vec<String>,
    pub category: Option<String>,
    pub calories: Option<f64>,
    pub total_time: Option<String>,
    pub rating: Option<f64>,
    pub images: Vec<String>,
}

/// Which projection of a record to return from the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Minimal,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecipeView {
    Minimal(MinimalRecipe),
    Full(Box<Recipe>),
}

impl Recipe {
    #[inline]
    pub fn minimal(&self) -> MinimalRecipe {
        MinimalRecipe {
            name: self.name.clone(),
            ingredients_with_quantities: self.ingredients_with_quantities.clone(),
            instructions: self.instructions.clone(),
            category: self.category.clone(),
            calories: self.calories,
            total_time: self.total_time.clone(),
            rating: self.rating,
            images: self.images.clone(),
        }
    }

    #[inline]
    pub fn view(&self, view: View) -> RecipeView {
        match view {
            View::Minimal => RecipeView::Minimal(self.minimal()),
            View::Full => RecipeView::Full(Box::new(self.clone())),
        }
    }
}

impl fmt::Display for MinimalRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        if let Some(category) = &self.category {
            writeln!(f, "Category: {category}")?;
        }
        if let Some(calories) = self.calories {
            writeln!(f, "Calories: {calories:.1}")?;
        }
        if let Some(total_time) = &self.total_time {
            writeln!(f, "Total time: {total_time}")?;
        }
        if let Some(rating) = self.rating {
            writeln!(f, "Rating: {rating:.1}")?;
        }
        writeln!(f, "Ingredients:")?;
        for ingredient in &self.ingredients_with_quantities {
            writeln!(f, "- {ingredient}")?;
        }
        writeln!(f, "Instructions:")?;
        for (step, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{}. {instruction}", step + 1)?;
        }
        if let Some(image) = self.images.first() {
            writeln!(f, "Image: {image}")?;
        }
        Ok(())
    }
}
