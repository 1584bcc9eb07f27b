// In-memory metadata store
// Row-addressed recipe records joined onto vector hits


use crate::recipes::{Recipe, RecipeView, View};

/// Recipe records addressed by row id, which is their position in the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    recipes: Vec<Recipe>,
}

impl MetadataStore {
    #[inline]
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    #[inline]
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    #[inline]
    pub fn recipe(&self, row_id: i64) -> Option<&Recipe> {
        usize::try_from(row_id)
            .ok()
            .and_then(|index| self.recipes.get(index))
    }

    /// Project the record at `row_id`. Negative or out-of-range ids yield `None`.
    #[inline]
    pub fn get(&self, row_id: i64, view: View) -> Option<RecipeView> {
        self.recipe(row_id).map(|recipe| recipe.view(view))
    }
}

impl From<Vec<Recipe>> for MetadataStore {
    #[inline]
    fn from(recipes: Vec<Recipe>) -> Self {
        Self::new(recipes)
    }
}
