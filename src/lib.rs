//! # repolens — repository chunking and vector retrieval
//!
//! Indexes the textual content of a software repository into line-addressed
//! chunks and answers queries with exact nearest-neighbor search over their
//! embeddings.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, defaults
//! - **[`embedder`]** — `Embedder` trait (injected provider) + mock implementation
//! - **[`splitter`]** — Per-extension separator rules, recursive character splitting
//! - **[`chunker`]** — Line-tracked chunks with heuristic code metadata
//! - **[`store`]** — SQLite chunk store and brute-force L2 vector index
//! - **[`retriever`]** — Façade: index a repository snapshot, serve top-k lookups

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod retriever;
pub mod splitter;
pub mod store;
