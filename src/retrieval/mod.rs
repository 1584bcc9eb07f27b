// Retrieval subsystem
// Multi-field vector indexes, intent-conditioned search and the metadata join

pub mod builder;
pub mod engine;
pub mod errors;
pub mod index;
pub mod manifest;
pub mod metadata;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::recipes::Recipe;

pub use builder::{BuiltIndexes, DEFAULT_BATCH_SIZE, IndexBuilder};
pub use engine::{DistanceNormalizer, IdentityNormalizer, RetrievalEngine, RetrievedRecipe};
pub use errors::RetrievalError;
pub use index::{FlatIndex, IndexHit, NOT_FOUND_ROW_ID, VectorIndex, VectorIndexSet};
pub use manifest::{FieldManifest, IndexManifest, fingerprint_recipes};
pub use metadata::MetadataStore;

/// A recipe text field that gets its own vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddedField {
    IngredientsCleaned,
    IngredientsWithQuantities,
    Title,
}

impl EmbeddedField {
    pub const ALL: [Self; 3] = [
        Self::IngredientsCleaned,
        Self::IngredientsWithQuantities,
        Self::Title,
    ];

    /// Name of the recipe column this field is embedded from
    #[inline]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::IngredientsCleaned => "ingredients_cleaned",
            Self::IngredientsWithQuantities => "ingredients_with_quantities",
            Self::Title => "name",
        }
    }

    /// Name of the persisted index table for this field
    #[inline]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::IngredientsCleaned => "ingredients_embedding",
            Self::IngredientsWithQuantities => "ingredients_with_quantities_embedding",
            Self::Title => "title_embedding",
        }
    }

    /// The text that gets embedded for `recipe`. List fields are joined with ", ".
    #[inline]
    pub fn text(self, recipe: &Recipe) -> String {
        match self {
            Self::IngredientsCleaned => recipe.ingredients_cleaned.join(", "),
            Self::IngredientsWithQuantities => recipe.ingredients_with_quantities.join(", "),
            Self::Title => recipe.name.clone(),
        }
    }
}

impl fmt::Display for EmbeddedField {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}
