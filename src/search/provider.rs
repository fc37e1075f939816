//! Lazily loaded, shared embedding model

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, info};

use super::embedding::{l2_normalize, load_model, Embedder};
use crate::core::config::ModelSource;
use crate::core::error::Result;

/// Builds the model for a source; swapped out in tests
pub type ModelLoader = Box<dyn Fn(&ModelSource) -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Owns at most one embedding model, loaded on first use.
///
/// Share it between services with `Arc`. The first caller of `encode` or
/// `warmup` builds the model while holding the lock; concurrent callers block
/// and then reuse that instance. A failed load leaves the slot empty, so the
/// next call tries again.
pub struct EmbeddingProvider {
    source: ModelSource,
    loader: ModelLoader,
    model: Mutex<Option<Arc<dyn Embedder>>>,
}

impl EmbeddingProvider {
    pub fn new(source: ModelSource) -> Self {
        Self::with_loader(source, Box::new(load_model))
    }

    pub fn with_loader(source: ModelSource, loader: ModelLoader) -> Self {
        Self {
            source,
            loader,
            model: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Load the model now so load failures surface before serving traffic
    pub fn warmup(&self) -> Result<Arc<dyn Embedder>> {
        let mut slot = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let start = Instant::now();
        let model = (self.loader)(&self.source)?;
        info!(
            "Loaded embedding model {} ({} dims) from {} in {}ms",
            model.model_id(),
            model.dimension(),
            self.source,
            start.elapsed().as_millis()
        );
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Embed text as a unit-length vector
    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.warmup()?;
        let mut embedding = model.embed(text)?;
        l2_normalize(&mut embedding);
        debug!("Encoded {} chars into {} dims", text.len(), embedding.len());
        Ok(embedding)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::counting_provider;
    use super::*;
    use crate::core::error::SearchError;

    #[test]
    fn test_lazy_load() {
        let (provider, counters) = counting_provider();
        assert!(!provider.is_loaded());
        assert_eq!(counters.loads(), 0);

        provider.encode("first").unwrap();
        provider.encode("second").unwrap();
        assert!(provider.is_loaded());
        assert_eq!(counters.loads(), 1);
        assert_eq!(counters.encodes(), 2);
    }

    #[test]
    fn test_single_load_under_race() {
        let (provider, counters) = counting_provider();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || provider.encode(&format!("query {}", i)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.loads(), 1);
        assert_eq!(counters.encodes(), 8);
    }

    #[test]
    fn test_warmup_surfaces_load_error() {
        let provider =
            EmbeddingProvider::new(ModelSource::LocalPath("/nonexistent/model".into()));
        let err = provider.warmup().err().unwrap();
        assert!(matches!(err, SearchError::ModelLoad { .. }));
        assert!(!provider.is_loaded());
        assert!(provider.encode("text").is_err());
    }

    #[test]
    fn test_encode_is_normalized() {
        let provider = EmbeddingProvider::new(ModelSource::default());
        let v = provider.encode("Write report").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
