//! Chunk store operations: whole-repository snapshots queryable by file
//! path and line-range overlap.
use rusqlite::params;
use tracing::info;

use super::{Store, StoreError};
use crate::chunker::Chunk;

const CHUNK_COLUMNS: &str =
    "chunk_id, repo_id, file_path, language, start_line, end_line, content, metadata";

/// Raw row before the metadata column is parsed.
struct ChunkRow {
    chunk_id: String,
    repo_id: String,
    file_path: String,
    language: String,
    start_line: usize,
    end_line: usize,
    content: String,
    metadata: String,
}

fn map_chunk_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRow> {
    Ok(ChunkRow {
        chunk_id: row.get(0)?,
        repo_id: row.get(1)?,
        file_path: row.get(2)?,
        language: row.get(3)?,
        start_line: row.get::<_, i64>(4)? as usize,
        end_line: row.get::<_, i64>(5)? as usize,
        content: row.get(6)?,
        metadata: row.get(7)?,
    })
}

impl ChunkRow {
    fn into_chunk(self) -> Result<Chunk, StoreError> {
        Ok(Chunk {
            chunk_id: self.chunk_id,
            repo_id: self.repo_id,
            file_path: self.file_path,
            language: self.language,
            start_line: self.start_line,
            end_line: self.end_line,
            line_count: self.end_line - self.start_line + 1,
            content: self.content,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

impl Store {
    /// Persist the chunk snapshot for a repository, replacing any prior one.
    pub fn save_chunks(&mut self, repo_id: &str, chunks: &[Chunk]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE repo_id = ?", params![repo_id])?;

        for (position, chunk) in chunks.iter().enumerate() {
            let metadata = serde_json::to_string(&chunk.metadata)?;
            tx.execute(
                "INSERT INTO chunks (repo_id, position, chunk_id, file_path, language, start_line, end_line, content, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    repo_id,
                    position as i64,
                    chunk.chunk_id,
                    chunk.file_path,
                    chunk.language,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.content,
                    metadata,
                ],
            )?;
        }

        tx.commit()?;
        info!("Saved {} chunks for {repo_id}", chunks.len());
        Ok(())
    }

    /// Load the chunk snapshot for a repository, in insertion order.
    /// Returns an empty vec if nothing has been persisted yet.
    pub fn load_chunks(&self, repo_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let sql =
            format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE repo_id = ? ORDER BY position");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![repo_id], map_chunk_row)?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?.into_chunk()?);
        }
        Ok(chunks)
    }

    /// All chunks belonging to one file of a repository.
    pub fn chunks_for_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Vec<Chunk>, StoreError> {
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE repo_id = ? AND file_path = ? ORDER BY position"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![repo_id, file_path], map_chunk_row)?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?.into_chunk()?);
        }
        Ok(chunks)
    }

    /// Chunks of one file whose line range intersects `[start_line, end_line]`.
    /// Two ranges intersect unless one strictly precedes the other.
    pub fn chunks_overlapping(
        &self,
        repo_id: &str,
        file_path: &str,
        start_line: usize,
        end_line: usize,
    ) -> Result<Vec<Chunk>, StoreError> {
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks
             WHERE repo_id = ? AND file_path = ?
               AND NOT (end_line < ? OR start_line > ?)
             ORDER BY position"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![repo_id, file_path, start_line as i64, end_line as i64],
            map_chunk_row,
        )?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?.into_chunk()?);
        }
        Ok(chunks)
    }

    /// Whether a chunk snapshot exists for the repository. Does not
    /// deserialize any content.
    pub fn has_chunks(&self, repo_id: &str) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chunks WHERE repo_id = ?)",
            params![repo_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, ChunkMetadata, extract_metadata};

    fn chunk(file_path: &str, start: usize, end: usize, content: &str) -> Chunk {
        Chunk::new(
            "test_repo",
            file_path,
            content.to_string(),
            start,
            end,
            "Python",
            extract_metadata(content, "Python"),
        )
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut store = Store::open_in_memory().unwrap();

        let chunks = vec![
            chunk("a.py", 1, 10, "import os\n\ndef alpha():\n    pass"),
            chunk("a.py", 8, 20, "def beta():\n    pass"),
            chunk("b.py", 1, 5, "class Gamma:\n    pass"),
        ];
        store.save_chunks("test_repo", &chunks).unwrap();

        let loaded = store.load_chunks("test_repo").unwrap();
        assert_eq!(loaded, chunks, "round trip should preserve all fields");
        assert!(loaded[0].metadata.has_imports);
        assert_eq!(loaded[2].metadata.class_names, vec!["Gamma"]);
    }

    #[test]
    fn test_load_unknown_repo_is_empty() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.load_chunks("nope").unwrap().is_empty());
        assert!(!store.has_chunks("nope").unwrap());
    }

    #[test]
    fn test_save_replaces_prior_snapshot() {
        let mut store = Store::open_in_memory().unwrap();

        store
            .save_chunks("test_repo", &[chunk("a.py", 1, 10, "old content")])
            .unwrap();
        store
            .save_chunks("test_repo", &[chunk("c.py", 1, 3, "new content")])
            .unwrap();

        let loaded = store.load_chunks("test_repo").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].file_path, "c.py");
    }

    #[test]
    fn test_chunks_for_file_filters() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![
            chunk("a.py", 1, 10, "x"),
            chunk("b.py", 1, 10, "y"),
            chunk("a.py", 8, 20, "z"),
        ];
        store.save_chunks("test_repo", &chunks).unwrap();

        let for_a = store.chunks_for_file("test_repo", "a.py").unwrap();
        assert_eq!(for_a.len(), 2);
        assert!(for_a.iter().all(|c| c.file_path == "a.py"));
    }

    #[test]
    fn test_overlapping_ranges() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks = vec![chunk("a.py", 1, 10, "x"), chunk("a.py", 8, 20, "y")];
        store.save_chunks("test_repo", &chunks).unwrap();

        // Degenerate single-line query inside both ranges
        let both = store.chunks_overlapping("test_repo", "a.py", 9, 9).unwrap();
        assert_eq!(both.len(), 2);

        // Only the first range
        let first = store.chunks_overlapping("test_repo", "a.py", 1, 5).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].start_line, 1);

        // Touching boundaries still intersect
        let at_10 = store
            .chunks_overlapping("test_repo", "a.py", 10, 10)
            .unwrap();
        assert_eq!(at_10.len(), 2);

        // Strictly after both
        let none = store
            .chunks_overlapping("test_repo", "a.py", 21, 30)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_overlapping_matches_filtered_load() {
        let mut store = Store::open_in_memory().unwrap();
        let chunks: Vec<Chunk> = (0..8)
            .map(|i| chunk("a.py", i * 5 + 1, i * 5 + 7, "body"))
            .collect();
        store.save_chunks("test_repo", &chunks).unwrap();

        for (a, b) in [(1, 1), (3, 12), (7, 7), (1, 40), (39, 40)] {
            let via_query = store.chunks_overlapping("test_repo", "a.py", a, b).unwrap();
            let via_filter: Vec<Chunk> = store
                .chunks_for_file("test_repo", "a.py")
                .unwrap()
                .into_iter()
                .filter(|c| !(c.end_line < a || c.start_line > b))
                .collect();
            assert_eq!(via_query, via_filter, "mismatch for range [{a}, {b}]");
        }
    }

    #[test]
    fn test_repos_are_isolated() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .save_chunks("repo_one", &[chunk("a.py", 1, 2, "x")])
            .unwrap();

        assert!(store.has_chunks("repo_one").unwrap());
        assert!(!store.has_chunks("repo_two").unwrap());
        assert!(store.load_chunks("repo_two").unwrap().is_empty());
    }

    #[test]
    fn test_default_metadata_round_trips() {
        let mut store = Store::open_in_memory().unwrap();
        let c = Chunk::new(
            "test_repo",
            "notes.txt",
            "plain text".to_string(),
            1,
            1,
            "Unknown",
            ChunkMetadata::default(),
        );
        store.save_chunks("test_repo", &[c.clone()]).unwrap();
        assert_eq!(store.load_chunks("test_repo").unwrap(), vec![c]);
    }
}
