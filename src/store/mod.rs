//! Persistence layer: SQLite-backed chunk store and vector index.
//!
//! One database holds both persisted artifacts, keyed by repository
//! identifier: the chunk snapshot (queryable by file and line range) and the
//! vector index (embedding blob + serialized chunk stored together per row,
//! so the positional alignment between vectors and chunks is a single
//! storage object rather than two parallel structures).
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::embedder::EmbedderError;

pub mod chunks;
pub mod index;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    chunk_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    language TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_repo ON chunks(repo_id);
CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(repo_id, file_path);

CREATE TABLE IF NOT EXISTS vector_indexes (
    repo_id TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    vector_count INTEGER NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS index_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    chunk_json TEXT NOT NULL,
    FOREIGN KEY (repo_id) REFERENCES vector_indexes(repo_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_repo ON index_entries(repo_id, position);
"#;

/// Errors from the persistence layer.
///
/// Per-item problems during chunking never reach here; anything surfacing as
/// a `StoreError` is either an infrastructure failure or structural
/// inconsistency in persisted state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedderError),

    /// Query vector dimensionality does not match the persisted index.
    /// Indicates corrupted or incompatible persisted state; never coerced.
    #[error("dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt vector blob for {repo_id} at position {position}")]
    CorruptVector { repo_id: String, position: usize },

    #[error("embedding batch returned {returned} vectors for {expected} chunks")]
    EmbeddingCountMismatch { expected: usize, returned: usize },
}

/// A wrapper around a SQLite connection initialized with the repolens schema.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open a database at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Initializing store: {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

/// Serialize a float32 vector into little-endian bytes for BLOB storage.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a stored vector blob, validating the expected dimensionality.
pub fn deserialize_vector(bytes: &[u8], dimension: usize) -> Option<Vec<f32>> {
    if bytes.len() != dimension * 4 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_init() {
        let store = Store::open_in_memory().expect("Failed to open in-memory store");

        let tables: usize = store.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('chunks', 'vector_indexes', 'index_entries');",
            [],
            |row| row.get(0),
        ).unwrap();

        assert_eq!(tables, 3);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);

        // 1.0f32 in hex: 0x3f800000 -> little endian: 00 00 80 3f
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_vector_round_trip() {
        let vec = vec![0.25, -1.5, 3.75, 0.0];
        let bytes = serialize_vector(&vec);
        let decoded = deserialize_vector(&bytes, 4).unwrap();
        assert_eq!(decoded, vec);
    }

    #[test]
    fn test_deserialize_rejects_wrong_dimension() {
        let bytes = serialize_vector(&[1.0, 2.0]);
        assert!(deserialize_vector(&bytes, 3).is_none());
        assert!(deserialize_vector(&bytes[..7], 2).is_none());
    }
}
