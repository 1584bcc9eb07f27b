// Artifact consistency validation
// Compares the metadata store, the index tables and the build manifest without loading vectors


use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use crate::database::IndexStore;
use crate::database::sqlite::Database;
use crate::recipes::Recipe;
use crate::retrieval::{EmbeddedField, IndexManifest, fingerprint_recipes};

/// One disagreement between the persisted artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    MissingManifest,
    UnreadableManifest(String),
    ModelMismatch { manifest: String, configured: String },
    RowCountMismatch { manifest: usize, metadata: usize },
    FingerprintMismatch,
    MissingIndex(EmbeddedField),
    /// Table present but not described by the manifest
    UnrecordedIndex(EmbeddedField),
    SizeMismatch {
        field: EmbeddedField,
        manifest: usize,
        stored: usize,
    },
}

impl fmt::Display for ConsistencyIssue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingManifest => write!(f, "no build manifest"),
            Self::UnreadableManifest(reason) => write!(f, "unreadable manifest: {reason}"),
            Self::ModelMismatch {
                manifest,
                configured,
            } => write!(
                f,
                "indexes built with '{manifest}' but '{configured}' is configured"
            ),
            Self::RowCountMismatch { manifest, metadata } => write!(
                f,
                "manifest recorded {manifest} rows, metadata store has {metadata}"
            ),
            Self::FingerprintMismatch => {
                write!(f, "metadata content differs from what the indexes were built from")
            }
            Self::MissingIndex(field) => write!(f, "index table for {field} is missing"),
            Self::UnrecordedIndex(field) => {
                write!(f, "index table for {field} is not in the manifest")
            }
            Self::SizeMismatch {
                field,
                manifest,
                stored,
            } => write!(
                f,
                "index {field} holds {stored} vectors, manifest recorded {manifest}"
            ),
        }
    }
}

/// Result of comparing the persisted artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Rows in the SQLite metadata store
    pub metadata_rows: usize,
    /// Vectors per index table, `None` where the table is absent
    pub stored_vectors: BTreeMap<EmbeddedField, Option<usize>>,
    pub manifest: Option<IndexManifest>,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    /// Compare already-read artifacts. `manifest` is `None` when no manifest file exists.
    #[inline]
    pub fn evaluate(
        recipes: &[Recipe],
        stored_vectors: BTreeMap<EmbeddedField, Option<usize>>,
        manifest: Option<Result<IndexManifest, String>>,
        embedding_model: &str,
    ) -> Self {
        let mut issues = Vec::new();

        let manifest = match manifest {
            Some(Ok(manifest)) => Some(manifest),
            None => {
                issues.push(ConsistencyIssue::MissingManifest);
                None
            }
            Some(Err(reason)) => {
                issues.push(ConsistencyIssue::UnreadableManifest(reason));
                None
            }
        };

        if let Some(manifest) = &manifest {
            if manifest.embedding_model != embedding_model {
                issues.push(ConsistencyIssue::ModelMismatch {
                    manifest: manifest.embedding_model.clone(),
                    configured: embedding_model.to_string(),
                });
            }
            if manifest.row_count != recipes.len() {
                issues.push(ConsistencyIssue::RowCountMismatch {
                    manifest: manifest.row_count,
                    metadata: recipes.len(),
                });
            } else if manifest.fingerprint != fingerprint_recipes(recipes) {
                issues.push(ConsistencyIssue::FingerprintMismatch);
            }
        }

        for (&field, stored) in &stored_vectors {
            let recorded = manifest
                .as_ref()
                .and_then(|manifest| manifest.fields.get(&field));
            match (stored, recorded) {
                (None, _) => issues.push(ConsistencyIssue::MissingIndex(field)),
                (Some(_), None) if manifest.is_some() => {
                    issues.push(ConsistencyIssue::UnrecordedIndex(field));
                }
                (Some(stored), Some(recorded)) if *stored != recorded.size => {
                    issues.push(ConsistencyIssue::SizeMismatch {
                        field,
                        manifest: recorded.size,
                        stored: *stored,
                    });
                }
                _ => {}
            }
        }

        Self {
            metadata_rows: recipes.len(),
            stored_vectors,
            manifest,
            issues,
        }
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent() {
            format!(
                "Artifacts are consistent: {} recipes in SQLite, {} index tables",
                self.metadata_rows,
                self.stored_vectors.values().filter(|count| count.is_some()).count()
            )
        } else {
            format!(
                "Artifact inconsistencies found: {} issues, run `prepare` to rebuild",
                self.total_issues()
            )
        }
    }
}

/// Reads the artifacts and builds a `ConsistencyReport`
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    store: &'a IndexStore,
    embedding_model: &'a str,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, store: &'a IndexStore, embedding_model: &'a str) -> Self {
        Self {
            database,
            store,
            embedding_model,
        }
    }

    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        info!("Starting artifact consistency validation");

        let recipes = self.database.list_recipes().await?;
        let stored_vectors = self.store.vector_counts().await?;
        let manifest = self
            .store
            .manifest_path()
            .exists()
            .then(|| self.store.read_manifest().map_err(|e| e.to_string()));

        let report =
            ConsistencyReport::evaluate(&recipes, stored_vectors, manifest, self.embedding_model);

        if report.is_consistent() {
            info!("Artifact consistency validation passed");
        } else {
            for issue in &report.issues {
                warn!("Consistency issue: {}", issue);
            }
        }
        Ok(report)
    }
}
