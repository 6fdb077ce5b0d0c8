use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use repolens::chunker::FileChunker;
use repolens::config::Config;
use repolens::embedder::mock::MockEmbedder;
use repolens::retriever::{Retriever, SourceFile};
use repolens::store::Store;

/// Extensions worth indexing: code plus adjacent text formats.
const INCLUDED_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "hpp", "go", "rs", "rb", "php",
    "swift", "kt", "scala", "cs", "r", "sh", "bash", "sql", "html", "css", "scss", "vue", "lua",
    "md", "txt", "rst", "json", "yaml", "yml", "toml", "ini", "cfg", "xml",
];

/// Directories never worth descending into.
const IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    "env",
    "build",
    "dist",
    "target",
    "bin",
    "obj",
    ".idea",
    ".vscode",
    "vendor",
    ".next",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    ".cache",
];

const MAX_FILE_SIZE: u64 = 1_000_000;

#[derive(Parser)]
#[command(name = "repolens", about = "Index a repository and search it by meaning")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a local repository checkout and build its vector index
    Index {
        /// Repository identifier that scopes the persisted state
        repo_id: String,
        /// Directory containing the repository files
        dir: PathBuf,
    },
    /// Query an indexed repository for the most relevant chunks
    Search {
        repo_id: String,
        query: String,
        /// Number of results to return (defaults to config search_top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate()?;
    config.ensure_storage_dir()?;

    let store = Store::open(&config.db_path)?;
    let embedder = MockEmbedder::default();

    match cli.command {
        Command::Index { repo_id, dir } => {
            let files = collect_source_files(&dir)
                .with_context(|| format!("failed to read {}", dir.display()))?;
            anyhow::ensure!(!files.is_empty(), "no readable files found in {}", dir.display());

            let mut retriever = Retriever::new(
                store,
                FileChunker::new(config.chunk_size, config.chunk_overlap),
            );
            let summary = retriever.index_repository(&repo_id, &files, &embedder)?;
            info!(
                "Indexed {repo_id}: {} files, {} chunks ({} skipped)",
                summary.files, summary.chunks, summary.skipped
            );
        }
        Command::Search {
            repo_id,
            query,
            top_k,
        } => {
            let retriever = Retriever::new(
                store,
                FileChunker::new(config.chunk_size, config.chunk_overlap),
            );
            let k = top_k.unwrap_or(config.search_top_k);
            let results = retriever.search(&repo_id, &query, k, &embedder)?;

            if results.is_empty() {
                println!("No results — is {repo_id} indexed?");
            }
            for chunk in results {
                println!(
                    "{} L{}-L{} ({})",
                    chunk.file_path, chunk.start_line, chunk.end_line, chunk.language
                );
                println!("{}\n", chunk.content);
            }
        }
    }

    Ok(())
}

/// Walk a repository checkout into snapshot tuples: filtered by extension
/// and size, paths normalized to `/`, sorted for deterministic chunk order.
fn collect_source_files(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    walk(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !IGNORE_DIRS.contains(&name.as_ref()) {
                walk(root, &path, out)?;
            }
            continue;
        }

        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();
        if !INCLUDED_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_SIZE {
            continue;
        }

        // Unreadable or non-UTF-8 files are skipped, not fatal
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(&path);
        out.push(SourceFile {
            path: relative.to_string_lossy().replace('\\', "/"),
            content,
            extension,
        });
    }
    Ok(())
}
