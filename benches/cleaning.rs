use criterion::{Criterion, criterion_group, criterion_main};
use recipe_assistant::recipes::{RawRecipeTable, clean_recipes, parse_r_list_string};
use std::hint::black_box;

const HEADERS: [&str; 7] = [
    "RecipeId",
    "Name",
    "RecipeIngredientQuantities",
    "RecipeIngredientParts",
    "RecipeInstructions",
    "TotalTime",
    "AggregatedRating",
];

fn table(rows: usize) -> RawRecipeTable {
    let rows = (0..rows)
        .map(|row| {
            vec![
                Some(row.to_string()),
                Some(format!("Recipe {row}")),
                Some(r#"c("2", "1 1/2 cups", "1 tbsp", NA)"#.to_string()),
                Some(r#"c("Eggs", "Flour", "Butter", "Salt")"#.to_string()),
                Some(r#"c("Whisk the eggs.", "Fold in the flour.", "Bake for 20 minutes.")"#.to_string()),
                Some("PT1H25M".to_string()),
                (row % 3 != 0).then(|| "4.5".to_string()),
            ]
        })
        .collect();
    RawRecipeTable::new(&HEADERS, rows)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let table = table(2_000);
    c.bench_function("clean recipes", |b| b.iter(|| clean_recipes(black_box(&table))));

    let list = r#"c("Whisk the eggs.", "Fold in the flour.", "Rest the batter, then bake.")"#;
    c.bench_function("parse r list", |b| b.iter(|| parse_r_list_string(black_box(list))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
