// Intent classification
// Maps a raw user utterance onto a coarse intent label with an ordered rule list

#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

use crate::retrieval::EmbeddedField;

static SPECIFIC_RECIPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(recipe for|how to make|tell me about)\s+[a-z ]+").expect("valid regex")
});

const INGREDIENT_KEYWORDS: [&str; 4] = ["have", "with", "using", "ingredients"];
const RECIPE_KEYWORDS: [&str; 5] = ["recipe", "make", "cook", "prepare", "how to"];
const STEP_KEYWORDS: [&str; 4] = ["next step", "what's next", "then", "after that"];
const DIET_KEYWORDS: [&str; 6] = ["vegan", "vegetarian", "gluten", "keto", "halal", "diet"];
const NUTRITION_KEYWORDS: [&str; 4] = ["calories", "nutrition", "protein", "carbs"];
const TIME_KEYWORDS: [&str; 5] = ["quick", "under", "minutes", "fast", "less than"];
const RATING_KEYWORDS: [&str; 4] = ["top", "best", "highest rated", "popular"];

/// Coarse label for what the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    IngredientSearch,
    SpecificRecipe,
    RecipeGeneration,
    StepNavigation,
    DietFilter,
    NutritionInfo,
    TimeFilter,
    RatingFilter,
    Unclear,
}

impl Intent {
    pub const ALL: [Self; 9] = [
        Self::IngredientSearch,
        Self::SpecificRecipe,
        Self::RecipeGeneration,
        Self::StepNavigation,
        Self::DietFilter,
        Self::NutritionInfo,
        Self::TimeFilter,
        Self::RatingFilter,
        Self::Unclear,
    ];

    /// The single index an intent searches, or `None` for a fused search across all of them
    #[inline]
    pub const fn target_field(self) -> Option<EmbeddedField> {
        match self {
            Self::IngredientSearch => Some(EmbeddedField::IngredientsCleaned),
            Self::SpecificRecipe => Some(EmbeddedField::Title),
            Self::RecipeGeneration => Some(EmbeddedField::IngredientsWithQuantities),
            Self::StepNavigation
            | Self::DietFilter
            | Self::NutritionInfo
            | Self::TimeFilter
            | Self::RatingFilter
            | Self::Unclear => None,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IngredientSearch => "ingredient_search",
            Self::SpecificRecipe => "specific_recipe",
            Self::RecipeGeneration => "recipe_generation",
            Self::StepNavigation => "step_navigation",
            Self::DietFilter => "diet_filter",
            Self::NutritionInfo => "nutrition_info",
            Self::TimeFilter => "time_filter",
            Self::RatingFilter => "rating_filter",
            Self::Unclear => "unclear",
        }
    }
}

impl fmt::Display for Intent {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    #[inline]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown intent '{value}'. Expected one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                )
            })
    }
}

/// Rule-based classifier. Rules are checked in order and the first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    #[inline]
    pub fn classify(&self, message: &str) -> Intent {
        let text = message.to_lowercase();
        let intent = Self::apply_rules(&text);
        debug!("Classified message as {}", intent);
        intent
    }

    fn apply_rules(text: &str) -> Intent {
        let contains_any = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

        if SPECIFIC_RECIPE_REGEX.is_match(text).unwrap_or(false) {
            Intent::SpecificRecipe
        } else if contains_any(&INGREDIENT_KEYWORDS) && text.contains(',') {
            Intent::IngredientSearch
        } else if contains_any(&RECIPE_KEYWORDS) && text.contains("recipe") {
            Intent::RecipeGeneration
        } else if contains_any(&STEP_KEYWORDS) {
            Intent::StepNavigation
        } else if contains_any(&DIET_KEYWORDS) {
            Intent::DietFilter
        } else if contains_any(&NUTRITION_KEYWORDS) {
            Intent::NutritionInfo
        } else if contains_any(&TIME_KEYWORDS) {
            Intent::TimeFilter
        } else if contains_any(&RATING_KEYWORDS) {
            Intent::RatingFilter
        } else {
            Intent::Unclear
        }
    }
}
