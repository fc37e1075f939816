//! Semantic index: the boundary operations over tasks and plugins
//!
//! Owns the shared embedding provider and vector store and one search service
//! per namespace. Transports (CLI, MCP) map their calls 1:1 onto these methods.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use super::engine::{PluginSearchService, TaskSearchService};
use super::provider::EmbeddingProvider;
use super::vectordb::{IndexStats, VectorStore};
use crate::core::config::SearchConfig;
use crate::core::error::Result;
use crate::core::record::{IndexedCount, PluginIn, PluginResult, TaskIn, TaskResult};

/// Liveness payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
}

impl Health {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

pub struct SemanticIndex {
    provider: Arc<EmbeddingProvider>,
    store: VectorStore,
    tasks: TaskSearchService,
    plugins: PluginSearchService,
    /// Set once the loaded model has been checked against the store
    bound: Mutex<bool>,
}

impl SemanticIndex {
    /// Open the store and set up the services. The model is not loaded yet;
    /// call [`SemanticIndex::warmup`] before serving.
    pub fn open(config: &SearchConfig) -> Result<Self> {
        let provider = Arc::new(EmbeddingProvider::new(config.model.clone()));
        let store = VectorStore::open(&config.db_path)?;
        Ok(Self::with_parts(provider, store))
    }

    pub fn with_parts(provider: Arc<EmbeddingProvider>, store: VectorStore) -> Self {
        Self {
            tasks: TaskSearchService::new(Arc::clone(&provider), store.clone()),
            plugins: PluginSearchService::new(Arc::clone(&provider), store.clone()),
            provider,
            store,
            bound: Mutex::new(false),
        }
    }

    /// Load the model and bind it to the store.
    ///
    /// Fails with `ModelLoad` if the model cannot be built, or `ModelMismatch`
    /// if the store holds vectors from a different model.
    pub fn warmup(&self) -> Result<()> {
        let mut bound = self.bound.lock().unwrap_or_else(PoisonError::into_inner);
        let model = self.provider.warmup()?;
        self.store.bind_model(model.model_id(), model.dimension())?;
        if !*bound {
            info!(
                "Semantic index ready at {} with model {}",
                self.store.path().display(),
                model.model_id()
            );
        }
        *bound = true;
        Ok(())
    }

    /// Bind the model before the first operation that embeds anything
    fn ensure_bound(&self) -> Result<()> {
        if *self.bound.lock().unwrap_or_else(PoisonError::into_inner) {
            return Ok(());
        }
        self.warmup()
    }

    pub fn bulk_index_tasks(&self, tasks: Vec<TaskIn>) -> Result<IndexedCount> {
        if !tasks.is_empty() {
            self.ensure_bound()?;
        }
        let tasks: Vec<TaskIn> = tasks.into_iter().map(TaskIn::normalized).collect();
        let indexed = self.tasks.bulk_index(&tasks)?;
        Ok(IndexedCount { indexed })
    }

    pub fn search_tasks(&self, query: &str, top_k: i64) -> Result<Vec<TaskResult>> {
        if reaches_model(query, top_k) {
            self.ensure_bound()?;
        }
        self.tasks.search(query, top_k)
    }

    pub fn bulk_index_plugins(&self, plugins: Vec<PluginIn>) -> Result<IndexedCount> {
        if !plugins.is_empty() {
            self.ensure_bound()?;
        }
        let plugins: Vec<PluginIn> = plugins.into_iter().map(PluginIn::normalized).collect();
        let indexed = self.plugins.bulk_index(&plugins)?;
        Ok(IndexedCount { indexed })
    }

    pub fn search_plugins(&self, query: &str, top_k: i64) -> Result<Vec<PluginResult>> {
        if reaches_model(query, top_k) {
            self.ensure_bound()?;
        }
        self.plugins.search(query, top_k)
    }

    pub fn health(&self) -> Health {
        Health::ok()
    }

    pub fn status(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }
}

/// Blank queries and non-positive `top_k` short-circuit in the search service
fn reaches_model(query: &str, top_k: i64) -> bool {
    !query.trim().is_empty() && top_k > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ModelSource;
    use crate::core::error::SearchError;
    use crate::core::record::{Namespace, DEFAULT_TOP_K};
    use crate::search::embedding::{Embedder, HtpEmbedder};
    use crate::search::provider::testing::counting_provider;
    use tempfile::TempDir;

    /// HTP vectors reported under another model id
    struct RenamedEmbedder(&'static str);

    impl Embedder for RenamedEmbedder {
        fn model_id(&self) -> &str {
            self.0
        }

        fn dimension(&self) -> usize {
            HtpEmbedder::new().dimension()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            HtpEmbedder::new().embed(text)
        }
    }

    fn renamed_provider(model_id: &'static str) -> Arc<EmbeddingProvider> {
        Arc::new(EmbeddingProvider::with_loader(
            ModelSource::default(),
            Box::new(move |_: &ModelSource| {
                Ok(Arc::new(RenamedEmbedder(model_id)) as Arc<dyn Embedder>)
            }),
        ))
    }

    fn open_index(dir: &TempDir) -> Result<SemanticIndex> {
        let config = SearchConfig {
            db_path: dir.path().join("semantic_search.db"),
            model: ModelSource::default(),
        };
        SemanticIndex::open(&config)
    }

    #[test]
    fn test_boundary_operations() -> Result<()> {
        let dir = TempDir::new()?;
        let index = open_index(&dir)?;
        index.warmup()?;

        let count = index.bulk_index_tasks(vec![
            TaskIn::new("t1", "Write report").with_description("quarterly summary"),
            TaskIn::new("t2", "Call plumber"),
        ])?;
        assert_eq!(count, IndexedCount { indexed: 2 });

        let count = index.bulk_index_plugins(vec![PluginIn {
            plugin_type: Some("sink".to_string()),
            ..PluginIn::new("p1", "Report exporter")
        }])?;
        assert_eq!(count.indexed, 1);

        let tasks = index.search_tasks("quarterly report", DEFAULT_TOP_K)?;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "t1");

        let plugins = index.search_plugins("report", DEFAULT_TOP_K)?;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].plugin_type, "sink");

        assert_eq!(index.health(), Health::ok());
        let stats = index.status()?;
        assert_eq!(stats.namespaces[0].namespace, Namespace::Tasks);
        assert_eq!(stats.namespaces[0].count, 2);
        assert_eq!(stats.namespaces[1].count, 1);
        assert_eq!(stats.model_id.as_deref(), Some("htp-384"));
        Ok(())
    }

    #[test]
    fn test_blank_fields_normalized_at_boundary() -> Result<()> {
        let dir = TempDir::new()?;
        let index = open_index(&dir)?;
        index.bulk_index_tasks(vec![TaskIn {
            id: "t1".to_string(),
            name: "Write report".to_string(),
            description: Some("  ".to_string()),
            category: None,
        }])?;

        let stored = index.store.get::<TaskIn>("t1")?.unwrap();
        assert_eq!(stored.record.description, None);
        Ok(())
    }

    #[test]
    fn test_warmup_fails_on_bad_model() -> Result<()> {
        let dir = TempDir::new()?;
        let config = SearchConfig {
            db_path: dir.path().join("semantic_search.db"),
            model: ModelSource::LocalPath(dir.path().join("no-model-here")),
        };
        let index = SemanticIndex::open(&config)?;
        assert!(matches!(index.warmup(), Err(SearchError::ModelLoad { .. })));
        Ok(())
    }

    #[test]
    fn test_warmup_detects_model_change() -> Result<()> {
        let dir = TempDir::new()?;
        let store = VectorStore::open(&dir.path().join("semantic_search.db"))?;
        store.bind_model("BGESmallENV15", 384)?;

        let (provider, _) = counting_provider();
        let index = SemanticIndex::with_parts(provider, store);
        assert!(matches!(
            index.warmup(),
            Err(SearchError::ModelMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_query_is_not_an_error() -> Result<()> {
        let dir = TempDir::new()?;
        let index = open_index(&dir)?;
        assert!(index.search_tasks("", 3)?.is_empty());
        assert!(index.search_plugins("   ", 3)?.is_empty());
        assert!(!index.provider().is_loaded());
        Ok(())
    }

    #[test]
    fn test_indexing_without_warmup_binds_model() -> Result<()> {
        let dir = TempDir::new()?;
        let db_path = dir.path().join("semantic_search.db");

        let index = open_index(&dir)?;
        index.bulk_index_tasks(vec![TaskIn::new("t1", "Write report")])?;
        assert_eq!(index.status()?.model_id.as_deref(), Some("htp-384"));
        drop(index);

        let other = SemanticIndex::with_parts(
            renamed_provider("BGESmallENV15"),
            VectorStore::open(&db_path)?,
        );
        assert!(matches!(
            other.warmup(),
            Err(SearchError::ModelMismatch { .. })
        ));
        assert!(matches!(
            other.search_tasks("report", 1),
            Err(SearchError::ModelMismatch { .. })
        ));
        assert!(matches!(
            other.bulk_index_plugins(vec![PluginIn::new("p1", "Exporter")]),
            Err(SearchError::ModelMismatch { .. })
        ));
        assert_eq!(other.status()?.namespaces[1].count, 0);
        Ok(())
    }

    #[test]
    fn test_first_search_binds_model() -> Result<()> {
        let dir = TempDir::new()?;
        let index = open_index(&dir)?;
        assert!(index.search_plugins("csv reader", 3)?.is_empty());
        assert_eq!(index.status()?.model_id.as_deref(), Some("htp-384"));
        assert_eq!(index.status()?.dimension, Some(384));
        Ok(())
    }

    #[test]
    fn test_empty_batch_leaves_store_unbound() -> Result<()> {
        let dir = TempDir::new()?;
        let index = open_index(&dir)?;
        assert_eq!(index.bulk_index_tasks(Vec::new())?.indexed, 0);
        assert_eq!(index.status()?.model_id, None);
        assert!(!index.provider().is_loaded());
        Ok(())
    }

    #[test]
    fn test_health_payload() {
        assert_eq!(
            serde_json::to_string(&Health::ok()).unwrap(),
            r#"{"status":"ok"}"#
        );
    }
}
