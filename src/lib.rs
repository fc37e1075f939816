//! wisetask-search library
//!
//! Semantic search over tasks and plugins: records are embedded with a local
//! model, stored in SQLite and ranked by cosine similarity.
//!
//! # Modules
//!
//! - `core`: Records, configuration and errors
//! - `search`: Embedding provider, vector store, ranking and search services

pub mod core;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::{ModelSource, SearchConfig};
pub use crate::core::error::{Result, SearchError};
pub use crate::core::record::{
    BulkIndexRequest, IndexedCount, Namespace, PluginBulkIndexRequest, PluginIn, PluginResult,
    Record, SearchRequest, TaskIn, TaskResult, DEFAULT_TOP_K,
};
pub use search::{EmbeddingProvider, Health, SemanticIndex, VectorStore};
