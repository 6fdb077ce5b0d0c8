//! Vector index: build, existence check, and exact nearest-neighbor search.
//!
//! Vectors live in the same row as their serialized chunk, ordered by build
//! position, so the vector list and the chunk list cannot drift apart.
//! Search is an exhaustive scan with squared Euclidean distance — exact
//! nearest neighbors, linear in stored vectors × dimensionality, which is
//! fine at the scale of one repository's chunk set.
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info, warn};

use super::{Store, StoreError, deserialize_vector, serialize_vector};
use crate::chunker::Chunk;
use crate::embedder::Embedder;

/// Embedding input for a chunk: a short structured header improves
/// retrieval quality over raw content alone.
fn embedding_text(chunk: &Chunk) -> String {
    format!(
        "File: {}\nType: {}\n\n{}",
        chunk.file_path, chunk.language, chunk.content
    )
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

impl Store {
    /// Embed all chunks in one batch and persist the vector index for a
    /// repository, replacing any prior index.
    ///
    /// An empty chunk slice creates nothing: `has_index` stays false and the
    /// call succeeds (there is simply nothing to index).
    pub fn build_index(
        &mut self,
        repo_id: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Result<(), StoreError> {
        if chunks.is_empty() {
            warn!("No chunks to index for {repo_id}");
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        info!("Embedding {} chunks for {repo_id}...", chunks.len());
        let vectors = embedder.embed_batch(&text_refs)?;

        if vectors.len() != chunks.len() {
            return Err(StoreError::EmbeddingCountMismatch {
                expected: chunks.len(),
                returned: vectors.len(),
            });
        }

        let dimension = vectors[0].len();
        for v in &vectors {
            if v.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM index_entries WHERE repo_id = ?",
            params![repo_id],
        )?;
        tx.execute(
            "DELETE FROM vector_indexes WHERE repo_id = ?",
            params![repo_id],
        )?;
        tx.execute(
            "INSERT INTO vector_indexes (repo_id, dimension, vector_count, created_at) VALUES (?, ?, ?, ?)",
            params![repo_id, dimension as i64, chunks.len() as i64, Utc::now()],
        )?;

        for (position, (chunk, vector)) in chunks.iter().zip(vectors.iter()).enumerate() {
            tx.execute(
                "INSERT INTO index_entries (repo_id, position, embedding, chunk_json) VALUES (?, ?, ?, ?)",
                params![
                    repo_id,
                    position as i64,
                    serialize_vector(vector),
                    serde_json::to_string(chunk)?,
                ],
            )?;
        }

        tx.commit()?;
        info!("Index for {repo_id} saved ({} vectors)", chunks.len());
        Ok(())
    }

    /// Whether a vector index exists for the repository.
    pub fn has_index(&self, repo_id: &str) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM vector_indexes WHERE repo_id = ? AND vector_count > 0)",
            params![repo_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Number of vectors stored for the repository, if an index exists.
    pub fn vector_count(&self, repo_id: &str) -> Result<Option<usize>, StoreError> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT vector_count FROM vector_indexes WHERE repo_id = ?",
                params![repo_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c as usize))
    }

    /// Embed the query and return the `k` nearest chunks, closest first.
    ///
    /// No index for the repository is not an error — the caller reads an
    /// empty result as "not yet indexed". A query whose dimensionality does
    /// not match the stored index is a hard [`StoreError::DimensionMismatch`].
    pub fn search_index(
        &self,
        repo_id: &str,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Chunk>, StoreError> {
        let dimension: Option<i64> = self
            .conn
            .query_row(
                "SELECT dimension FROM vector_indexes WHERE repo_id = ?",
                params![repo_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(dimension) = dimension else {
            debug!("No index found for {repo_id}");
            return Ok(Vec::new());
        };
        let dimension = dimension as usize;

        let query_vector = embedder.embed(query)?;
        if query_vector.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                actual: query_vector.len(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT position, embedding, chunk_json FROM index_entries
             WHERE repo_id = ? ORDER BY position",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            let position: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let chunk_json: String = row.get(2)?;
            Ok((position as usize, blob, chunk_json))
        })?;

        let mut scored: Vec<(f32, usize, String)> = Vec::new();
        for row in rows {
            let (position, blob, chunk_json) = row?;
            let Some(vector) = deserialize_vector(&blob, dimension) else {
                return Err(StoreError::CorruptVector {
                    repo_id: repo_id.to_string(),
                    position,
                });
            };
            scored.push((squared_l2(&query_vector, &vector), position, chunk_json));
        }

        // Ascending distance; ties broken by storage position for stability
        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(_, _, chunk_json)| serde_json::from_str(&chunk_json).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, ChunkMetadata};
    use crate::embedder::mock::MockEmbedder;
    use crate::embedder::EmbedderError;
    use std::sync::Mutex;

    /// Embedder returning preset vectors, for distance-sensitive tests.
    struct FixedEmbedder {
        batch: Vec<Vec<f32>>,
        query: Mutex<Vec<f32>>,
    }

    impl FixedEmbedder {
        fn new(batch: Vec<Vec<f32>>, query: Vec<f32>) -> Self {
            Self {
                batch,
                query: Mutex::new(query),
            }
        }
    }

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
            Ok(self.query.lock().unwrap().clone())
        }

        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            Ok(self.batch.clone())
        }

        fn dimensions(&self) -> usize {
            self.batch.first().map_or(0, Vec::len)
        }
    }

    fn chunk(file_path: &str, content: &str) -> Chunk {
        Chunk::new(
            "test_repo",
            file_path,
            content.to_string(),
            1,
            1,
            "Python",
            ChunkMetadata::default(),
        )
    }

    #[test]
    fn test_build_then_exists_and_count() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("a.py", "aaa"), chunk("b.py", "bbb"), chunk("c.py", "ccc")];
        let embedder = MockEmbedder::new(16);

        store.build_index("test_repo", &chunks, &embedder).unwrap();

        assert!(store.has_index("test_repo").unwrap());
        assert_eq!(store.vector_count("test_repo").unwrap(), Some(3));
    }

    #[test]
    fn test_build_empty_creates_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        let embedder = MockEmbedder::new(16);

        store.build_index("test_repo", &[], &embedder).unwrap();

        assert!(!store.has_index("test_repo").unwrap());
        assert_eq!(store.vector_count("test_repo").unwrap(), None);
    }

    #[test]
    fn test_search_without_index_is_empty() {
        let store = Store::open_in_memory().unwrap();
        let embedder = MockEmbedder::new(16);

        let results = store
            .search_index("never_indexed", "query", 5, &embedder)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_nearest_first() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("origin.py", "at origin"), chunk("far.py", "far away")];
        let embedder = FixedEmbedder::new(vec![vec![0.0, 0.0], vec![1.0, 1.0]], vec![0.1, 0.1]);

        store.build_index("test_repo", &chunks, &embedder).unwrap();

        let results = store.search_index("test_repo", "q", 1, &embedder).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "origin.py");
    }

    #[test]
    fn test_search_k_exceeding_count_returns_all_sorted() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![
            chunk("far.py", "far"),
            chunk("near.py", "near"),
            chunk("mid.py", "mid"),
        ];
        let embedder = FixedEmbedder::new(
            vec![vec![5.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]],
            vec![0.0, 0.0],
        );

        store.build_index("test_repo", &chunks, &embedder).unwrap();

        let results = store.search_index("test_repo", "q", 10, &embedder).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].file_path, "near.py");
        assert_eq!(results[1].file_path, "mid.py");
        assert_eq!(results[2].file_path, "far.py");
    }

    #[test]
    fn test_search_tie_broken_by_position() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("first.py", "one"), chunk("second.py", "two")];
        let embedder = FixedEmbedder::new(vec![vec![1.0, 0.0], vec![1.0, 0.0]], vec![0.0, 0.0]);

        store.build_index("test_repo", &chunks, &embedder).unwrap();

        let results = store.search_index("test_repo", "q", 2, &embedder).unwrap();
        assert_eq!(results[0].file_path, "first.py");
        assert_eq!(results[1].file_path, "second.py");
    }

    #[test]
    fn test_dimension_mismatch_is_hard_error() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("a.py", "aaa")];
        let embedder = FixedEmbedder::new(vec![vec![0.0, 0.0]], vec![0.0, 0.0]);

        store.build_index("test_repo", &chunks, &embedder).unwrap();

        // Query embedder now produces a 3-dimensional vector
        *embedder.query.lock().unwrap() = vec![0.0, 0.0, 0.0];
        let err = store
            .search_index("test_repo", "q", 1, &embedder)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_rebuild_replaces_index() {
        let mut store = Store::open_in_memory().unwrap();
        let embedder = MockEmbedder::new(8);

        store
            .build_index("test_repo", &[chunk("a.py", "a"), chunk("b.py", "b")], &embedder)
            .unwrap();
        store
            .build_index("test_repo", &[chunk("c.py", "c")], &embedder)
            .unwrap();

        assert_eq!(store.vector_count("test_repo").unwrap(), Some(1));
        let results = store.search_index("test_repo", "c", 10, &embedder).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "c.py");
    }

    #[test]
    fn test_corrupt_blob_surfaces_error() {
        let mut store = Store::open_in_memory().unwrap();
        let embedder = MockEmbedder::new(8);
        store
            .build_index("test_repo", &[chunk("a.py", "a")], &embedder)
            .unwrap();

        // Truncate the stored blob behind the index's back
        store
            .conn
            .execute(
                "UPDATE index_entries SET embedding = X'0000' WHERE repo_id = 'test_repo'",
                [],
            )
            .unwrap();

        let err = store
            .search_index("test_repo", "q", 1, &embedder)
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptVector { .. }));
    }

    #[test]
    fn test_embedding_count_mismatch() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("a.py", "a"), chunk("b.py", "b")];
        // Batch returns one vector for two chunks
        let embedder = FixedEmbedder::new(vec![vec![0.0, 0.0]], vec![0.0, 0.0]);

        let err = store
            .build_index("test_repo", &chunks, &embedder)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::EmbeddingCountMismatch {
                expected: 2,
                returned: 1
            }
        ));
        assert!(!store.has_index("test_repo").unwrap());
    }
}
