use super::*;

#[test]
fn schema_has_row_id_and_fixed_size_vector() {
    let schema = index_table_schema(384);

    assert_eq!(schema.fields().len(), 2);
    assert_eq!(schema.field(0).name(), ROW_ID_COLUMN);
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(schema_dimension(&schema), Some(384));
}

#[test]
fn dimension_is_absent_without_vector_column() {
    let schema = Schema::new(vec![Field::new(ROW_ID_COLUMN, DataType::Int64, false)]);
    assert_eq!(schema_dimension(&schema), None);

    let wrong_type = Schema::new(vec![Field::new(VECTOR_COLUMN, DataType::Utf8, false)]);
    assert_eq!(schema_dimension(&wrong_type), None);
}
