use crate::error::StoreError;
use crate::models::ChunkMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_FILE: &str = "index.json";

/// One persisted (vector, metadata) pair. Vectors are stored L2-normalized so
/// inner-product search equals cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub vector: Vec<f32>,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredIndex {
    embedding_model: Option<String>,
    dimension: Option<usize>,
    updated_at: DateTime<Utc>,
    records: Vec<IndexRecord>,
}

/// Append-only nearest-neighbor index over L2-normalized vectors with
/// positionally aligned metadata. Vectors, metadata, and the header are one
/// serialized blob written atomically, so a crash can never leave the index
/// and its metadata out of step.
pub struct VectorStore {
    path: Option<PathBuf>,
    embedding_model: Option<String>,
    dimension: Option<usize>,
    records: Vec<IndexRecord>,
}

impl VectorStore {
    /// Loads the index at `path`, or starts empty when no file exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                embedding_model: None,
                dimension: None,
                records: Vec::new(),
            });
        }

        let raw = fs::read(&path)?;
        let stored: StoredIndex = serde_json::from_slice(&raw)?;
        Ok(Self {
            path: Some(path),
            embedding_model: stored.embedding_model,
            dimension: stored.dimension,
            records: stored.records,
        })
    }

    /// Backing-free store for tests and transient sessions.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            embedding_model: None,
            dimension: None,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    /// Appends a batch of (vector, metadata) pairs and persists. The first
    /// batch pins the index to its embedding model and dimensionality; later
    /// batches must match. Existing records are never reordered or mutated.
    pub fn upsert(
        &mut self,
        pairs: Vec<(Vec<f32>, ChunkMeta)>,
        embedding_model: &str,
    ) -> Result<(), StoreError> {
        if pairs.is_empty() {
            return Ok(());
        }

        // The whole batch is validated before the header is touched, so a
        // rejected batch leaves the store exactly as it was.
        let expected = self.dimension.unwrap_or(pairs[0].0.len());
        for (vector, _) in &pairs {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if let Some(current) = &self.embedding_model {
            if embedding_model != current {
                return Err(StoreError::ModelMismatch {
                    expected: current.clone(),
                    actual: embedding_model.to_string(),
                });
            }
        }

        self.dimension = Some(expected);
        self.embedding_model = Some(embedding_model.to_string());

        for (mut vector, meta) in pairs {
            normalize_l2(&mut vector);
            self.records.push(IndexRecord { vector, meta });
        }

        self.save()
    }

    /// Returns up to `k` metadata records ordered by descending inner-product
    /// similarity to `query`. An empty store yields an empty result set.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<ChunkMeta>, StoreError> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut normalized = query.to_vec();
        normalize_l2(&mut normalized);

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (position, dot(&record.vector, &normalized)))
            .collect();
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(k)
            .filter_map(|(position, _)| self.records.get(position))
            .map(|record| record.meta.clone())
            .collect())
    }

    fn check_dimension(&self, dimension: usize) -> Result<(), StoreError> {
        if let Some(expected) = self.dimension {
            if dimension != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }
        Ok(())
    }

    /// Serializes the whole index to a sibling temp file, then renames it into
    /// place so readers only ever observe a complete index.
    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored = StoredIndex {
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            updated_at: Utc::now(),
            records: self.records.clone(),
        };

        let tmp_path = temp_path(path);
        fs::write(&tmp_path, serde_json::to_vec(&stored)?)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Scales `vector` to unit length. Zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right.iter()).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MODEL: &str = "test-embedding-model";

    fn meta(text: &str) -> ChunkMeta {
        ChunkMeta {
            text: text.to_string(),
            filename: "doc.txt".to_string(),
            source: "user_upload".to_string(),
        }
    }

    #[test]
    fn empty_store_query_returns_nothing() {
        let store = VectorStore::in_memory();
        let hits = store.query(&[1.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut vector = vec![3.0f32, 4.0];
        normalize_l2(&mut vector);
        let once = vector.clone();
        normalize_l2(&mut vector);

        for (a, b) in once.iter().zip(vector.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn query_orders_by_descending_similarity() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(
                vec![
                    (vec![1.0, 0.0], meta("east")),
                    (vec![0.0, 1.0], meta("north")),
                    (vec![1.0, 1.0], meta("northeast")),
                ],
                MODEL,
            )
            .unwrap();

        let hits = store.query(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "east");
        assert_eq!(hits[1].text, "northeast");
    }

    #[test]
    fn fewer_records_than_k_returns_all() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(vec![(vec![1.0, 0.0], meta("only"))], MODEL)
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn upsert_appends_in_order_and_keeps_alignment() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(
                vec![(vec![1.0, 0.0], meta("first")), (vec![0.0, 1.0], meta("second"))],
                MODEL,
            )
            .unwrap();
        store
            .upsert(vec![(vec![0.5, 0.5], meta("third"))], MODEL)
            .unwrap();

        assert_eq!(store.len(), 3);
        let texts: Vec<&str> = store
            .records
            .iter()
            .map(|record| record.meta.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        for record in &store.records {
            assert_eq!(record.vector.len(), 2);
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(vec![(vec![1.0, 0.0], meta("a"))], MODEL)
            .unwrap();

        let result = store.upsert(vec![(vec![1.0, 0.0, 0.0], meta("b"))], MODEL);
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));

        let result = store.query(&[1.0, 0.0, 0.0], 1);
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
    }

    #[test]
    fn rejected_batch_leaves_the_header_unpinned() {
        let mut store = VectorStore::in_memory();

        // Ragged batch: the mismatch is only visible at the second vector.
        let result = store.upsert(
            vec![(vec![1.0, 0.0], meta("a")), (vec![1.0, 0.0, 0.0], meta("b"))],
            MODEL,
        );
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert!(store.is_empty());
        assert_eq!(store.embedding_model(), None);

        // A later well-formed batch of a different dimension still succeeds.
        store
            .upsert(vec![(vec![1.0, 0.0, 0.0], meta("c"))], MODEL)
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejected_batch_keeps_an_existing_header_intact() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(vec![(vec![1.0, 0.0], meta("a"))], MODEL)
            .unwrap();

        let result = store.upsert(
            vec![(vec![0.0, 1.0], meta("b")), (vec![1.0, 0.0, 0.0], meta("c"))],
            MODEL,
        );
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert_eq!(store.len(), 1);

        store
            .upsert(vec![(vec![0.0, 1.0], meta("d"))], MODEL)
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn model_mismatch_is_rejected() {
        let mut store = VectorStore::in_memory();
        store
            .upsert(vec![(vec![1.0, 0.0], meta("a"))], MODEL)
            .unwrap();

        let result = store.upsert(vec![(vec![0.0, 1.0], meta("b"))], "other-model");
        assert!(matches!(result, Err(StoreError::ModelMismatch { .. })));
    }

    #[test]
    fn save_and_reload_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("data").join(DEFAULT_INDEX_FILE);

        let mut store = VectorStore::open(&path)?;
        assert!(store.is_empty());
        store.upsert(
            vec![(vec![3.0, 4.0], meta("persisted chunk"))],
            MODEL,
        )?;

        let reloaded = VectorStore::open(&path)?;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.embedding_model(), Some(MODEL));

        let hits = reloaded.query(&[3.0, 4.0], 1)?;
        assert_eq!(hits[0].text, "persisted chunk");

        // No stray temp file after a successful save.
        assert!(!path.with_file_name(format!("{DEFAULT_INDEX_FILE}.tmp")).exists());
        Ok(())
    }
}
