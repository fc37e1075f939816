//! Semantic search pipeline
//!
//! Write path: record → text → embedding → vector store.
//! Read path: query → embedding → full-scan ranking → top-K results.

pub mod embedding;
pub mod engine;
pub mod index;
pub mod provider;
pub mod ranking;
pub mod vectordb;

pub use embedding::{Embedder, HtpEmbedder};
pub use engine::{PluginSearchService, SearchService, TaskSearchService};
pub use index::{Health, SemanticIndex};
pub use provider::EmbeddingProvider;
pub use vectordb::{IndexStats, VectorStore};
