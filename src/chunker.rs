//! Line-tracked file chunking.
//!
//! Splits one file's text with the boundary-aware [`crate::splitter`] and
//! then locates every produced piece back in the original content to recover
//! exact 1-based `[start_line, end_line]` provenance. A lightweight,
//! table-driven heuristic scan records declaration and import metadata per
//! chunk — no parsing involved.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::splitter;

/// Heuristic flags extracted from chunk content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub has_classes: bool,
    pub has_functions: bool,
    pub has_imports: bool,
    pub class_names: Vec<String>,
    pub function_names: Vec<String>,
}

/// A contiguous, possibly overlapping slice of one file's text with exact
/// source-line provenance. Immutable once created; re-indexing the owning
/// repository replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub repo_id: String,
    pub file_path: String,
    pub language: String,
    /// 1-based, inclusive. `start_line <= end_line` always holds.
    pub start_line: usize,
    pub end_line: usize,
    pub line_count: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(
        repo_id: &str,
        file_path: &str,
        content: String,
        start_line: usize,
        end_line: usize,
        language: &str,
        metadata: ChunkMetadata,
    ) -> Self {
        let chunk_id = format!("{repo_id}__{file_path}__L{start_line}-L{end_line}")
            .replace(['/', '\\'], "_");
        Self {
            chunk_id,
            repo_id: repo_id.to_string(),
            file_path: file_path.to_string(),
            language: language.to_string(),
            start_line,
            end_line,
            line_count: end_line - start_line + 1,
            content,
            metadata,
        }
    }
}

// ── Metadata heuristics ──────────────────────────────────────────────

/// Per-language-family patterns for the metadata scan. Adding a language is
/// a table entry, not a branch.
struct LanguageProfile {
    languages: &'static [&'static str],
    class_decl: Regex,
    function_decl: Regex,
    import_prefixes: &'static [&'static str],
}

static PROFILES: LazyLock<Vec<LanguageProfile>> = LazyLock::new(|| {
    vec![
        LanguageProfile {
            languages: &["Python"],
            class_decl: Regex::new(r"^class\s+([A-Za-z_]\w*)").unwrap(),
            function_decl: Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)").unwrap(),
            import_prefixes: &["import ", "from "],
        },
        LanguageProfile {
            languages: &["JavaScript", "TypeScript"],
            class_decl: Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)").unwrap(),
            function_decl: Regex::new(
                r"function\s*\*?\s*([A-Za-z_$][\w$]*)?|([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?\([^)]*\)\s*=>",
            )
            .unwrap(),
            import_prefixes: &["import ", "require("],
        },
        LanguageProfile {
            languages: &["Rust"],
            class_decl: Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z_]\w*)")
                .unwrap(),
            function_decl: Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_]\w*)")
                .unwrap(),
            import_prefixes: &["use "],
        },
        LanguageProfile {
            languages: &["Go"],
            class_decl: Regex::new(r"^type\s+([A-Za-z_]\w*)").unwrap(),
            function_decl: Regex::new(r"^func\s+(?:\([^)]*\)\s+)?([A-Za-z_]\w*)").unwrap(),
            import_prefixes: &["import "],
        },
    ]
});

/// Line-by-line heuristic scan for declarations and imports. Best-effort:
/// unknown languages yield default metadata.
#[must_use]
pub fn extract_metadata(content: &str, language: &str) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::default();

    let Some(profile) = PROFILES.iter().find(|p| p.languages.contains(&language)) else {
        return metadata;
    };

    for line in content.lines() {
        let stripped = line.trim();

        if let Some(caps) = profile.class_decl.captures(stripped) {
            metadata.has_classes = true;
            if let Some(name) = caps.get(1) {
                metadata.class_names.push(name.as_str().to_string());
            }
        }

        if let Some(caps) = profile.function_decl.captures(stripped) {
            metadata.has_functions = true;
            if let Some(name) = caps.iter().skip(1).flatten().next() {
                metadata.function_names.push(name.as_str().to_string());
            }
        }

        if profile
            .import_prefixes
            .iter()
            .any(|p| stripped.starts_with(p))
        {
            metadata.has_imports = true;
        }
    }

    metadata
}

// ── Chunker ──────────────────────────────────────────────────────────

/// Chunks files while tracking source line numbers.
pub struct FileChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FileChunker {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk one file, preserving line numbers.
    ///
    /// Empty or whitespace-only content yields no chunks. Files with at most
    /// `chunk_size / 10` lines become a single chunk spanning the whole file.
    /// Everything else goes through the separator rules and the line remap.
    pub fn chunk_file(
        &self,
        repo_id: &str,
        file_path: &str,
        content: &str,
        language: &str,
        extension: &str,
    ) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let total_lines = content.lines().count();

        // Tiny files are not worth splitting
        if total_lines <= self.chunk_size / 10 {
            return vec![Chunk::new(
                repo_id,
                file_path,
                content.to_string(),
                1,
                total_lines,
                language,
                extract_metadata(content, language),
            )];
        }

        let rule = splitter::rule_for_extension(extension, self.chunk_size, self.chunk_overlap);
        let pieces = splitter::split_text(content, &rule);

        self.remap_pieces(&pieces, content, repo_id, file_path, language)
    }

    /// Locate each piece in the original content with a forward-only cursor
    /// and derive its line range from the surrounding newline counts.
    ///
    /// The cursor is advanced to `piece_end - chunk_overlap` so overlapping
    /// pieces still match without rescanning earlier content. A piece whose
    /// text cannot be found (the splitter trimmed it past recognition) is
    /// dropped with a diagnostic; chunking continues.
    fn remap_pieces(
        &self,
        pieces: &[String],
        content: &str,
        repo_id: &str,
        file_path: &str,
        language: &str,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut cursor = 0usize;

        for piece in pieces {
            let Some(rel) = content[cursor..].find(piece.as_str()) else {
                warn!("Could not locate chunk in {file_path}, skipping");
                continue;
            };

            let start = cursor + rel;
            let end = start + piece.len();

            let start_line = count_newlines(&content[..start]) + 1;
            let end_line = count_newlines(&content[..end]) + 1;

            chunks.push(Chunk::new(
                repo_id,
                file_path,
                piece.clone(),
                start_line,
                end_line,
                language,
                extract_metadata(piece, language),
            ));

            // Step back over the configured overlap, staying on a char boundary
            let back: usize = content[..end]
                .chars()
                .rev()
                .take(self.chunk_overlap)
                .map(char::len_utf8)
                .sum();
            cursor = end - back;
        }

        chunks
    }
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

// ── Tests ────────────────────────────────────────────────────────────
