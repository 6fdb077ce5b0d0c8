//! Retrieval façade: turn a repository snapshot into a persisted chunk
//! store + vector index, then serve top-k lookups for a query.
//!
//! The snapshot itself (how files were fetched, cloned, filtered) is the
//! caller's concern; this module consumes `(path, content, extension)`
//! tuples and owns everything from chunking to ranked results.
use tracing::{info, warn};

use crate::chunker::{Chunk, FileChunker};
use crate::embedder::Embedder;
use crate::store::{Store, StoreError};

/// One file of a repository snapshot.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Repository-relative path, `/`-separated.
    pub path: String,
    pub content: String,
    /// Extension without the leading dot.
    pub extension: String,
}

/// Per-run indexing counters.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files: usize,
    pub chunks: usize,
    pub skipped: usize,
}

/// Detect a display language from a file extension.
#[must_use]
pub fn detect_language(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "py" => "Python",
        "js" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "cpp" | "hpp" | "cc" => "C++",
        "c" => "C",
        "h" => "C/C++",
        "go" => "Go",
        "rs" => "Rust",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "scala" => "Scala",
        "cs" => "C#",
        "r" => "R",
        "html" | "htm" => "HTML",
        "css" => "CSS",
        "scss" => "SCSS",
        "vue" => "Vue",
        "sh" | "bash" => "Shell",
        "sql" => "SQL",
        "md" | "markdown" => "Markdown",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        _ => "Unknown",
    }
}

/// Chunks repository snapshots into the store and answers queries against
/// the persisted index.
///
/// One persisted index per repository identifier with single-writer,
/// whole-repository-replace semantics: concurrent `index_repository` calls
/// for the same identifier need an external lock.
pub struct Retriever {
    pub store: Store,
    pub chunker: FileChunker,
}

impl Retriever {
    #[must_use]
    pub fn new(store: Store, chunker: FileChunker) -> Self {
        Self { store, chunker }
    }

    /// Chunk every file of the snapshot, persist the chunk store snapshot,
    /// and build the vector index. Files that produce no chunks (empty or
    /// whitespace-only) are counted as skipped, not errors.
    pub fn index_repository(
        &mut self,
        repo_id: &str,
        files: &[SourceFile],
        embedder: &dyn Embedder,
    ) -> Result<IndexSummary, StoreError> {
        let mut summary = IndexSummary::default();
        let mut all_chunks: Vec<Chunk> = Vec::new();

        for file in files {
            let language = detect_language(&file.extension);
            let chunks = self.chunker.chunk_file(
                repo_id,
                &file.path,
                &file.content,
                language,
                &file.extension,
            );

            if chunks.is_empty() {
                summary.skipped += 1;
                continue;
            }

            summary.files += 1;
            summary.chunks += chunks.len();
            all_chunks.extend(chunks);
        }

        if all_chunks.is_empty() {
            warn!("Snapshot for {repo_id} produced no chunks");
        }

        info!(
            "Chunked {} files into {} chunks for {repo_id}",
            summary.files, summary.chunks
        );

        self.store.save_chunks(repo_id, &all_chunks)?;
        self.store.build_index(repo_id, &all_chunks, embedder)?;

        Ok(summary)
    }

    /// Top-k chunks for a query, nearest first. Empty if the repository has
    /// not been indexed yet.
    pub fn search(
        &self,
        repo_id: &str,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Chunk>, StoreError> {
        self.store.search_index(repo_id, query, k, embedder)
    }

    /// Whether the repository already has a persisted vector index.
    pub fn is_indexed(&self, repo_id: &str) -> Result<bool, StoreError> {
        self.store.has_index(repo_id)
    }
}
