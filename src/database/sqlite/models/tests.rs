use super::*;

fn sample_recipe() -> Recipe {
    Recipe {
        recipe_id: Some(99),
        name: "Shakshuka".to_string(),
        category: Some("Breakfast".to_string()),
        keywords: vec!["Eggs".to_string(), "< 30 Mins".to_string()],
        ingredients_raw: vec!["Eggs".to_string(), "Tomatoes".to_string()],
        ingredients_cleaned: vec!["eggs".to_string(), "tomatoes".to_string()],
        ingredients_with_quantities: vec!["4 Eggs".to_string(), "2 Tomatoes".to_string()],
        instructions: vec!["Simmer \"sauce\".".to_string(), "Crack eggs.".to_string()],
        calories: Some(320.5),
        nutrition: Nutrition {
            protein: Some(18.0),
            ..Nutrition::default()
        },
        total_time: Some("00:30".to_string()),
        rating: Some(4.0),
        review_count: 3,
        ..Recipe::default()
    }
}

#[test]
fn row_round_trip_keeps_every_field() {
    let recipe = sample_recipe();
    let row = RecipeRow::from_recipe(4, &recipe).expect("encodes");

    assert_eq!(row.row_id, 4);
    assert_eq!(row.ingredients_cleaned, r#"["eggs","tomatoes"]"#);
    assert_eq!(row.protein, Some(18.0));

    let restored = row.into_recipe().expect("decodes");
    assert_eq!(restored, recipe);
}

#[test]
fn empty_list_columns_decode_to_empty() {
    let mut row = RecipeRow::from_recipe(0, &sample_recipe()).expect("encodes");
    row.images = String::new();
    row.keywords = "[]".to_string();

    let restored = row.into_recipe().expect("decodes");
    assert!(restored.images.is_empty());
    assert!(restored.keywords.is_empty());
}

#[test]
fn malformed_list_column_names_the_column() {
    let mut row = RecipeRow::from_recipe(7, &sample_recipe()).expect("encodes");
    row.instructions = "not json".to_string();

    let error = row.into_recipe().expect_err("should fail");
    let message = format!("{error:#}");
    assert!(message.contains("instructions"), "unexpected error: {message}");
    assert!(message.contains("row 7"), "unexpected error: {message}");
}
