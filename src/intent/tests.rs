use super::*;

fn classify(message: &str) -> Intent {
    IntentClassifier::new().classify(message)
}

#[test]
fn specific_recipe_phrases() {
    assert_eq!(classify("Give me the recipe for lasagna"), Intent::SpecificRecipe);
    assert_eq!(classify("How to make pancakes?"), Intent::SpecificRecipe);
    assert_eq!(classify("tell me about banana bread"), Intent::SpecificRecipe);
}

#[test]
fn ingredient_search_needs_keyword_and_comma() {
    assert_eq!(
        classify("I have eggs, milk and flour"),
        Intent::IngredientSearch
    );
    assert_eq!(
        classify("Something using chicken, rice"),
        Intent::IngredientSearch
    );
    assert_ne!(classify("I have eggs"), Intent::IngredientSearch);
}

#[test]
fn recipe_generation_requires_the_word_recipe() {
    assert_eq!(
        classify("Can you create a new recipe?"),
        Intent::RecipeGeneration
    );
    assert_ne!(classify("cook something"), Intent::RecipeGeneration);
}

#[test]
fn remaining_rules_in_order() {
    assert_eq!(classify("What's next?"), Intent::StepNavigation);
    assert_eq!(classify("and after that"), Intent::StepNavigation);
    assert_eq!(classify("Something vegan please"), Intent::DietFilter);
    assert_eq!(classify("How many calories?"), Intent::NutritionInfo);
    assert_eq!(classify("A quick dinner idea"), Intent::TimeFilter);
    assert_eq!(classify("Show me popular dishes"), Intent::RatingFilter);
    assert_eq!(classify("hello there"), Intent::Unclear);
    assert_eq!(classify(""), Intent::Unclear);
}

#[test]
fn earlier_rules_take_precedence() {
    // "diet" and "quick" both match; diet comes first
    assert_eq!(classify("quick keto snack"), Intent::DietFilter);
    // contains "with" and a comma before the generation rule is tried
    assert_eq!(
        classify("a recipe with tomatoes, basil"),
        Intent::IngredientSearch
    );
}

#[test]
fn classification_ignores_case() {
    assert_eq!(classify("VEGAN"), Intent::DietFilter);
    assert_eq!(classify("HOW TO MAKE SOUP"), Intent::SpecificRecipe);
}

#[test]
fn mapped_intents_target_one_field() {
    assert_eq!(
        Intent::IngredientSearch.target_field(),
        Some(EmbeddedField::IngredientsCleaned)
    );
    assert_eq!(
        Intent::SpecificRecipe.target_field(),
        Some(EmbeddedField::Title)
    );
    assert_eq!(
        Intent::RecipeGeneration.target_field(),
        Some(EmbeddedField::IngredientsWithQuantities)
    );

    let unmapped = Intent::ALL
        .into_iter()
        .filter(|intent| intent.target_field().is_none())
        .count();
    assert_eq!(unmapped, 6);
}

#[test]
fn labels_round_trip_through_strings() {
    for intent in Intent::ALL {
        let parsed: Intent = intent.to_string().parse().expect("label parses");
        assert_eq!(parsed, intent);

        let json = serde_json::to_string(&intent).expect("serializes");
        assert_eq!(json, format!("\"{}\"", intent.as_str()));
    }

    assert_eq!(
        "Diet-Filter".parse::<Intent>().expect("parses"),
        Intent::DietFilter
    );
    assert!("dessert".parse::<Intent>().is_err());
}
