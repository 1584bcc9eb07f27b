use super::*;

#[test]
fn field_names() {
    assert_eq!(EmbeddedField::IngredientsCleaned.column_name(), "ingredients_cleaned");
    assert_eq!(EmbeddedField::Title.column_name(), "name");
    assert_eq!(EmbeddedField::Title.table_name(), "title_embedding");
    assert_eq!(
        EmbeddedField::IngredientsWithQuantities.table_name(),
        "ingredients_with_quantities_embedding"
    );
    assert_eq!(EmbeddedField::IngredientsCleaned.to_string(), "ingredients_cleaned");
}

#[test]
fn field_text_joins_lists() {
    let recipe = Recipe {
        name: "Omelette".to_string(),
        ingredients_cleaned: vec!["eggs".to_string(), "butter".to_string()],
        ingredients_with_quantities: vec!["2 eggs".to_string()],
        ..Recipe::default()
    };

    assert_eq!(EmbeddedField::IngredientsCleaned.text(&recipe), "eggs, butter");
    assert_eq!(EmbeddedField::IngredientsWithQuantities.text(&recipe), "2 eggs");
    assert_eq!(EmbeddedField::Title.text(&recipe), "Omelette");
    assert_eq!(
        EmbeddedField::IngredientsCleaned.text(&Recipe::default()),
        ""
    );
}

#[test]
fn only_embedding_failures_are_transient() {
    assert!(
        RetrievalError::MissingIndex {
            field: EmbeddedField::Title
        }
        .is_configuration_error()
    );
    assert!(RetrievalError::manifest_mismatch("row count").is_configuration_error());
    assert!(
        !RetrievalError::Embedding {
            message: "timeout".to_string()
        }
        .is_configuration_error()
    );
}
