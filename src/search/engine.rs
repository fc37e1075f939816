//! Search service - combines embedding provider, vector store and ranking
//! for one namespace

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use super::provider::EmbeddingProvider;
use super::ranking::rank;
use super::vectordb::VectorStore;
use crate::core::error::Result;
use crate::core::record::{PluginIn, Record, TaskIn};

/// Index and search one record type
pub struct SearchService<R: Record> {
    provider: Arc<EmbeddingProvider>,
    store: VectorStore,
    _record: PhantomData<fn() -> R>,
}

pub type TaskSearchService = SearchService<TaskIn>;
pub type PluginSearchService = SearchService<PluginIn>;

impl<R: Record> SearchService<R> {
    pub fn new(provider: Arc<EmbeddingProvider>, store: VectorStore) -> Self {
        Self {
            provider,
            store,
            _record: PhantomData,
        }
    }

    /// Embed and upsert a single record
    pub fn index_one(&self, record: &R) -> Result<()> {
        record.validate()?;

        let text = record.embedding_text();
        let embedding = self.provider.encode(&text)?;
        self.store.upsert(record, &embedding)?;

        debug!("Indexed {} '{}'", R::NAMESPACE, record.id());
        Ok(())
    }

    /// Index records in order, stopping at the first failure.
    ///
    /// Records before the failing one stay indexed; indexing is idempotent
    /// per id, so the whole batch can be retried.
    pub fn bulk_index(&self, records: &[R]) -> Result<usize> {
        for record in records {
            self.index_one(record)?;
        }

        info!("Indexed {} {}", records.len(), R::NAMESPACE);
        Ok(records.len())
    }

    /// Rank stored records against a query.
    ///
    /// A blank query, or `top_k <= 0`, returns an empty list without touching
    /// the model or the store.
    pub fn search(&self, query: &str, top_k: i64) -> Result<Vec<R::Scored>> {
        if query.trim().is_empty() || top_k <= 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.encode(query)?;
        let candidates = self.store.get_all::<R>()?;
        let total = candidates.len();

        let results: Vec<R::Scored> = rank(&query_embedding, candidates, top_k)
            .into_iter()
            .map(|(record, score)| record.into_scored(score))
            .collect();

        debug!(
            "Search {} for {:?}: {} of {} records returned",
            R::NAMESPACE,
            query,
            results.len(),
            total
        );
        Ok(results)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}
