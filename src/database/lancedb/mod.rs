// LanceDB vector storage
// Persists each field's flat index as its own table of (row_id, vector) rows

#[cfg(test)]
mod tests;

pub mod index_store;

pub use index_store::IndexStore;

use arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;

pub const ROW_ID_COLUMN: &str = "row_id";
pub const VECTOR_COLUMN: &str = "vector";

/// Rows written per record batch when persisting an index
pub const WRITE_BATCH_ROWS: usize = 8192;

/// Arrow schema of an index table with vectors of `dimension` floats
#[inline]
pub fn index_table_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ROW_ID_COLUMN, DataType::Int64, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(vector_item_field(), vector_length(dimension)),
            false,
        ),
    ]))
}

/// Element field shared by the schema and the vector arrays written against it
#[inline]
pub fn vector_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

#[inline]
pub fn vector_length(dimension: usize) -> i32 {
    i32::try_from(dimension).unwrap_or(i32::MAX)
}

/// Read the vector dimension back out of a table schema
#[inline]
pub fn schema_dimension(schema: &Schema) -> Option<usize> {
    schema
        .fields()
        .iter()
        .find(|field| field.name() == VECTOR_COLUMN)
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
}
