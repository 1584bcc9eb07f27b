use super::*;
use crate::recipes::Recipe;
use crate::retrieval::FieldManifest;
use tempfile::TempDir;

fn flat(rows: &[(i64, [f32; 3])]) -> FlatIndex {
    let mut index = FlatIndex::new(3);
    for (row_id, vector) in rows {
        index.add(*row_id, vector).expect("valid vector");
    }
    index
}

fn built() -> BuiltIndexes {
    let recipes = vec![
        Recipe {
            name: "Ramen".to_string(),
            ..Recipe::default()
        },
        Recipe {
            name: "Udon".to_string(),
            ..Recipe::default()
        },
    ];
    let title = flat(&[(0, [0.1, 0.2, 0.3]), (1, [0.4, 0.5, 0.6])]);
    let ingredients = flat(&[(0, [1.0, 0.0, 0.0]), (1, [0.0, 1.0, 0.0])]);

    let fields = BTreeMap::from([
        (EmbeddedField::Title, FieldManifest { dimension: 3, size: 2 }),
        (
            EmbeddedField::IngredientsCleaned,
            FieldManifest { dimension: 3, size: 2 },
        ),
    ]);

    BuiltIndexes {
        indexes: BTreeMap::from([
            (EmbeddedField::Title, title),
            (EmbeddedField::IngredientsCleaned, ingredients),
        ]),
        manifest: IndexManifest::new(&recipes, "test-embed", fields),
    }
}

#[tokio::test]
async fn persist_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = IndexStore::open(&temp_dir.path().join("indexes"))
        .await
        .expect("store opens");

    let built = built();
    store.persist(&built).await.expect("persist succeeds");
    assert!(store.manifest_path().exists());

    let (set, manifest) = store
        .load(&[EmbeddedField::Title, EmbeddedField::IngredientsCleaned])
        .await
        .expect("load succeeds");

    assert_eq!(manifest, built.manifest);
    assert_eq!(set.len(), 2);

    let title = store
        .read_index(EmbeddedField::Title)
        .await
        .expect("read succeeds");
    assert_eq!(title, built.indexes[&EmbeddedField::Title]);

    let hits = set
        .search(EmbeddedField::IngredientsCleaned, &[0.0, 1.0, 0.0], 1)
        .expect("search succeeds");
    assert_eq!(hits[0].row_id, 1);
}

#[tokio::test]
async fn missing_table_is_a_missing_index() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = IndexStore::open(temp_dir.path()).await.expect("store opens");
    store.persist(&built()).await.expect("persist succeeds");

    let result = store
        .load(&[EmbeddedField::Title, EmbeddedField::IngredientsWithQuantities])
        .await;

    match result {
        Err(AssistantError::Retrieval(RetrievalError::MissingIndex { field })) => {
            assert_eq!(field, EmbeddedField::IngredientsWithQuantities);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("load should fail"),
    }
}

#[tokio::test]
async fn missing_manifest_fails_load() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = IndexStore::open(temp_dir.path()).await.expect("store opens");
    let built = built();
    store
        .write_index(EmbeddedField::Title, &built.indexes[&EmbeddedField::Title])
        .await
        .expect("write succeeds");

    let result = store.load(&[EmbeddedField::Title]).await;
    assert!(matches!(
        result,
        Err(AssistantError::Retrieval(RetrievalError::ManifestMismatch { .. }))
    ));
}

#[tokio::test]
async fn rewriting_an_index_replaces_its_rows() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = IndexStore::open(temp_dir.path()).await.expect("store opens");

    store
        .write_index(
            EmbeddedField::Title,
            &flat(&[(0, [1.0, 1.0, 1.0]), (1, [2.0, 2.0, 2.0])]),
        )
        .await
        .expect("first write succeeds");
    store
        .write_index(EmbeddedField::Title, &flat(&[(0, [3.0, 3.0, 3.0])]))
        .await
        .expect("second write succeeds");

    let index = store
        .read_index(EmbeddedField::Title)
        .await
        .expect("read succeeds");
    assert_eq!(index.len(), 1);
    assert_eq!(index.flat_vectors(), &[3.0, 3.0, 3.0]);
}

#[tokio::test]
async fn vector_counts_report_absent_tables() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = IndexStore::open(temp_dir.path()).await.expect("store opens");
    store.persist(&built()).await.expect("persist succeeds");

    let counts = store.vector_counts().await.expect("counts succeed");
    assert_eq!(counts[&EmbeddedField::Title], Some(2));
    assert_eq!(counts[&EmbeddedField::IngredientsCleaned], Some(2));
    assert_eq!(counts[&EmbeddedField::IngredientsWithQuantities], None);
}
