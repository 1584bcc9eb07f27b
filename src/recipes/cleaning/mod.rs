// Offline recipe cleaning
// Loads the raw recipe CSV and turns it into normalized `Recipe` rows for indexing


use anyhow::{Context, Result};
use arrow::array::{Array, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use fancy_regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::AssistantError;
use crate::recipes::{Nutrition, Recipe};

const CSV_BATCH_SIZE: usize = 4096;

/// Columns that must be present for the table to be usable at all
pub const REQUIRED_COLUMNS: [&str; 3] = ["name", "recipe_ingredient_parts", "recipe_instructions"];

static CAMEL_BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<!^)(?=[A-Z])").expect("valid regex"));
static QUOTED_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("valid regex"));
static ISO_DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?").expect("valid regex"));
static NON_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Raw text table with snake_case column names; every cell is optional text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecipeTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawRecipeTable {
    /// Build a table, normalizing headers to snake_case
    #[inline]
    pub fn new(headers: &[&str], rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns: headers.iter().map(|h| to_snake_case(h)).collect(),
            rows,
        }
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Load the raw recipe CSV. Every column is read as text.
#[inline]
pub fn load_recipe_table(path: &Path) -> Result<RawRecipeTable> {
    info!("Loading recipe data from {}", path.display());

    let mut file = File::open(path)
        .with_context(|| format!("Failed to open recipe data: {}", path.display()))?;

    let format = Format::default().with_header(true);
    let (inferred, _) = format
        .infer_schema(&mut file, Some(1))
        .context("Failed to read recipe CSV header")?;
    file.seek(SeekFrom::Start(0))
        .context("Failed to rewind recipe CSV")?;

    let headers: Vec<String> = inferred.fields().iter().map(|f| f.name().clone()).collect();
    let schema = Arc::new(Schema::new(
        headers
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)
        .context("Failed to create CSV reader")?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.context("Failed to read recipe CSV batch")?;
        let columns = batch
            .columns()
            .iter()
            .map(|column| {
                column
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow::anyhow!("CSV column was not read as text"))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            rows.push(
                columns
                    .iter()
                    .map(|column| (!column.is_null(row)).then(|| column.value(row).to_string()))
                    .collect(),
            );
        }
    }

    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    let table = RawRecipeTable::new(&header_refs, rows);
    info!(
        "Loaded {} recipe rows with columns {:?}",
        table.len(),
        table.columns()
    );
    Ok(table)
}

/// Clean a raw table into recipe records ready for indexing.
///
/// Drops exact duplicate rows and rows whose name, ingredients or
/// instructions are missing or parse to nothing.
#[inline]
pub fn clean_recipes(table: &RawRecipeTable) -> Result<Vec<Recipe>, AssistantError> {
    for required in REQUIRED_COLUMNS {
        if table.column_index(required).is_none() {
            return Err(AssistantError::Preparation(format!(
                "Required column '{required}' is missing from recipe data"
            )));
        }
    }

    let accessor = ColumnAccessor::new(table);
    let mut seen = HashSet::with_capacity(table.len());
    let mut recipes = Vec::with_capacity(table.len());
    let mut duplicates = 0usize;
    let mut incomplete = 0usize;

    for row in &table.rows {
        if !seen.insert(row) {
            duplicates += 1;
            continue;
        }

        match clean_row(&accessor, row) {
            Some(recipe) => recipes.push(recipe),
            None => incomplete += 1,
        }
    }

    debug!(
        "Dropped {} duplicate rows and {} incomplete rows",
        duplicates, incomplete
    );
    if recipes.is_empty() {
        warn!("No usable recipes remained after cleaning");
    }
    info!("Cleaned {} recipes", recipes.len());

    Ok(recipes)
}

struct ColumnAccessor<'a> {
    table: &'a RawRecipeTable,
}

impl<'a> ColumnAccessor<'a> {
    fn new(table: &'a RawRecipeTable) -> Self {
        Self { table }
    }

    fn text<'r>(&self, row: &'r [Option<String>], column: &str) -> Option<&'r str> {
        self.table
            .column_index(column)
            .and_then(|index| row.get(index))
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != "NA")
    }

    fn owned(&self, row: &[Option<String>], column: &str) -> Option<String> {
        self.text(row, column).map(str::to_string)
    }

    fn number(&self, row: &[Option<String>], column: &str) -> Option<f64> {
        self.text(row, column)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }
}

fn clean_row(columns: &ColumnAccessor<'_>, row: &[Option<String>]) -> Option<Recipe> {
    let name = columns.owned(row, "name")?;
    let ingredients_raw = parse_r_list_string(columns.text(row, "recipe_ingredient_parts")?);
    let instructions = parse_r_list_string(columns.text(row, "recipe_instructions")?);
    let ingredients_cleaned = clean_string_list(&ingredients_raw);

    if ingredients_cleaned.is_empty() || instructions.is_empty() {
        return None;
    }

    let quantities = columns
        .text(row, "recipe_ingredient_quantities")
        .unwrap_or("[]");
    let ingredients_with_quantities =
        combine_ingredients_with_quantities(quantities, &ingredients_raw);

    Some(Recipe {
        recipe_id: columns.number(row, "recipe_id").map(|id| id as i64),
        name,
        author: columns.owned(row, "author_name"),
        description: columns.owned(row, "description"),
        category: columns.owned(row, "recipe_category"),
        keywords: columns
            .text(row, "keywords")
            .map(parse_r_list_string)
            .unwrap_or_default(),
        ingredients_raw,
        ingredients_cleaned,
        ingredients_with_quantities,
        instructions,
        calories: columns.number(row, "calories"),
        nutrition: Nutrition {
            fat: columns.number(row, "fat_content"),
            saturated_fat: columns.number(row, "saturated_fat_content"),
            cholesterol: columns.number(row, "cholesterol_content"),
            sodium: columns.number(row, "sodium_content"),
            carbohydrate: columns.number(row, "carbohydrate_content"),
            fiber: columns.number(row, "fiber_content"),
            sugar: columns.number(row, "sugar_content"),
            protein: columns.number(row, "protein_content"),
        },
        cook_time: columns.text(row, "cook_time").and_then(parse_iso_duration),
        prep_time: columns.text(row, "prep_time").and_then(parse_iso_duration),
        total_time: columns.text(row, "total_time").and_then(parse_iso_duration),
        date_published: columns
            .text(row, "date_published")
            .and_then(parse_publication_date),
        rating: Some(columns.number(row, "aggregated_rating").unwrap_or(0.0)),
        review_count: columns
            .number(row, "review_count")
            .map_or(0, |count| count as i64),
        servings: columns.number(row, "recipe_servings"),
        recipe_yield: columns.owned(row, "recipe_yield"),
        images: columns
            .text(row, "images")
            .map(parse_list_or_single)
            .unwrap_or_default(),
    })
}

/// Convert CamelCase or PascalCase to snake_case
#[inline]
pub fn to_snake_case(value: &str) -> String {
    CAMEL_BOUNDARY_REGEX
        .replace_all(value.trim(), "_")
        .to_lowercase()
}

/// Parse an R-style list string such as `c("a", "b")` into its quoted items
#[inline]
pub fn parse_r_list_string(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("c(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed);

    QUOTED_ITEM_REGEX
        .captures_iter(inner)
        .filter_map(|captures| captures.ok())
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Like [`parse_r_list_string`], but a bare unquoted value counts as a single item
fn parse_list_or_single(raw: &str) -> Vec<String> {
    let items = parse_r_list_string(raw);
    let trimmed = raw.trim();
    if items.is_empty() && !trimmed.contains('"') && !trimmed.starts_with("character(") {
        vec![trimmed.to_string()]
    } else {
        items
    }
}

fn clean_string_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|item| !item.is_empty())
        .map(|item| item.to_lowercase())
        .collect()
}

/// Zip a raw quantity list against ingredient names as "quantity ingredient".
///
/// The result is as long as the shorter of the two lists.
#[inline]
pub fn combine_ingredients_with_quantities(quantities_raw: &str, ingredients: &[String]) -> Vec<String> {
    parse_r_list_string(quantities_raw)
        .iter()
        .zip(ingredients)
        .map(|(quantity, ingredient)| format!("{quantity} {ingredient}").trim().to_string())
        .collect()
}

/// Convert an ISO-8601 duration such as `PT2H15M` into `HH:MM`
#[inline]
pub fn parse_iso_duration(duration: &str) -> Option<String> {
    let captures = ISO_DURATION_REGEX.captures(duration.trim()).ok()??;
    let component = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    Some(format!("{:02}:{:02}", component(1), component(2)))
}

fn parse_publication_date(raw: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.to_rfc3339())
}

/// Split a free-form user ingredient list ("Eggs, milk & flour!") into clean names
#[inline]
pub fn parse_user_ingredients(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| NON_WORD_REGEX.replace_all(&item.to_lowercase(), "").into_owned())
        .collect()
}
