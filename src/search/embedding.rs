//! Text embedding models
//!
//! Every model sits behind the [`Embedder`] trait. Two backends exist:
//!
//! - `htp`: Harmonic Token Projection, a deterministic, training-free
//!   embedding (<https://arxiv.org/html/2511.20665>). No model file, always
//!   available. This is the built-in default.
//! - fastembed ONNX sentence models, behind the `fastembed` cargo feature.

use std::f64::consts::PI;
use std::sync::Arc;

use crate::core::config::ModelSource;
use crate::core::error::{Result, SearchError};

/// Dimension of the HTP embedding (sin + cos per modulus)
pub const HTP_DIM: usize = 384;

const HTP_MODEL_ID: &str = "htp-384";

/// Code points beyond this are ignored when hashing a token
const MAX_TOKEN_LENGTH: usize = 64;

/// A text → vector function with a fixed output dimension
pub trait Embedder: Send + Sync {
    /// Stable identifier stored alongside the vectors this model produces
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Construct the model a source points at.
///
/// Unknown names, missing directories and models whose backend is not
/// compiled in all fail with `ModelLoad`.
pub fn load_model(source: &ModelSource) -> Result<Arc<dyn Embedder>> {
    match source {
        ModelSource::Named(name) => match name.to_lowercase().as_str() {
            "htp" | "htp-384" | "default" => Ok(Arc::new(HtpEmbedder::new())),
            other => load_named_onnx(other, name),
        },
        ModelSource::LocalPath(path) => {
            if !path.exists() {
                return Err(SearchError::model_load(
                    path.display().to_string(),
                    "model path does not exist",
                ));
            }
            load_local_onnx(path)
        }
    }
}

#[cfg(feature = "fastembed")]
fn load_named_onnx(lowered: &str, original: &str) -> Result<Arc<dyn Embedder>> {
    let model = onnx::model_from_name(lowered).ok_or_else(|| {
        SearchError::model_load(original, "unknown model name")
    })?;
    Ok(Arc::new(onnx::FastEmbedder::new(model, None)?))
}

#[cfg(not(feature = "fastembed"))]
fn load_named_onnx(_lowered: &str, original: &str) -> Result<Arc<dyn Embedder>> {
    Err(SearchError::model_load(
        original,
        "unknown model name (ONNX models need the `fastembed` feature)",
    ))
}

#[cfg(feature = "fastembed")]
fn load_local_onnx(path: &std::path::Path) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(onnx::FastEmbedder::new(
        onnx::DEFAULT_ONNX_MODEL,
        Some(path.to_path_buf()),
    )?))
}

#[cfg(not(feature = "fastembed"))]
fn load_local_onnx(path: &std::path::Path) -> Result<Arc<dyn Embedder>> {
    Err(SearchError::model_load(
        path.display().to_string(),
        "local model directories need the `fastembed` feature",
    ))
}

/// Scale to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Harmonic Token Projection embedder.
///
/// Each token is read as an integer in base 2^16 over its code points. Its
/// residue modulo each of 192 primes is projected onto the unit circle, giving
/// a (sin, cos) pair per prime. Token vectors are mean pooled and normalized.
///
/// Residues are computed digit by digit, so the token integer itself is never
/// materialized and every code point counts.
pub struct HtpEmbedder {
    moduli: Vec<u64>,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(HTP_DIM / 2),
        }
    }

    fn embed_token(&self, token: &str, acc: &mut [f64]) {
        let digits: Vec<u64> = token
            .chars()
            .take(MAX_TOKEN_LENGTH)
            .map(|c| c as u64)
            .collect();

        for (pair, &m) in acc.chunks_exact_mut(2).zip(&self.moduli) {
            let residue = digits.iter().fold(0u64, |r, &d| ((r << 16) + d) % m);
            let theta = 2.0 * PI * residue as f64 / m as f64;
            pair[0] += theta.sin();
            pair[1] += theta.cos();
        }
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HtpEmbedder {
    fn model_id(&self) -> &str {
        HTP_MODEL_ID
    }

    fn dimension(&self) -> usize {
        HTP_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; HTP_DIM]);
        }

        let mut acc = vec![0.0f64; HTP_DIM];

        for token in &tokens {
            self.embed_token(token, &mut acc);
        }

        let count = tokens.len() as f64;
        let mut embedding: Vec<f32> = acc.iter().map(|v| (v / count) as f32).collect();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Lowercased words split on whitespace and ASCII punctuation
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// First `count` primes by trial division against earlier primes
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

#[cfg(feature = "fastembed")]
mod onnx {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use super::Embedder;
    use crate::core::error::{Result, SearchError};

    /// Model used when only a local directory is given
    pub const DEFAULT_ONNX_MODEL: EmbeddingModel = EmbeddingModel::BGESmallENV15;

    pub fn model_from_name(name: &str) -> Option<EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" | "minilm" => Some(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" | "bge-small" | "baai/bge-small-en-v1.5" => {
                Some(EmbeddingModel::BGESmallENV15)
            }
            "bge-base-en-v1.5" | "bge-base" | "baai/bge-base-en-v1.5" => {
                Some(EmbeddingModel::BGEBaseENV15)
            }
            "bge-large-en-v1.5" | "bge-large" | "baai/bge-large-en-v1.5" => {
                Some(EmbeddingModel::BGELargeENV15)
            }
            _ => None,
        }
    }

    fn dimension_of(model: &EmbeddingModel) -> usize {
        match model {
            EmbeddingModel::BGEBaseENV15 => 768,
            EmbeddingModel::BGELargeENV15 => 1024,
            _ => 384,
        }
    }

    /// fastembed sentence model; the session is not shareable across threads
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        model_id: String,
        dimension: usize,
    }

    impl FastEmbedder {
        pub fn new(model: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
            let model_id = format!("{:?}", model);
            info!("Loading ONNX embedding model {}", model_id);

            let mut options = InitOptions::new(model.clone()).with_show_download_progress(false);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }

            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| SearchError::model_load(&model_id, e))?;

            Ok(Self {
                dimension: dimension_of(&model),
                model: Mutex::new(embedding),
                model_id,
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        #[allow(unused_mut)]
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| SearchError::Embedding("model lock poisoned".to_string()))?;
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| SearchError::Embedding(e.to_string()))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| SearchError::Embedding("model returned no vector".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(6), vec![2, 3, 5, 7, 11, 13]);
        assert_eq!(first_primes(HTP_DIM / 2).last(), Some(&1163));
    }

    #[test]
    fn test_htp_deterministic() {
        let a = HtpEmbedder::new();
        let b = HtpEmbedder::new();
        let text = "Write report\nquarterly summary";
        assert_eq!(a.embed(text).unwrap(), b.embed(text).unwrap());
    }

    #[test]
    fn test_htp_unit_norm() {
        let model = HtpEmbedder::new();
        for text in ["hello world", "한국어 테스트", "CSV reader\ndag"] {
            let emb = model.embed(text).unwrap();
            assert_eq!(emb.len(), HTP_DIM);
            let norm = dot(&emb, &emb).sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "norm {} for {:?}", norm, text);
        }
    }

    #[test]
    fn test_htp_no_tokens_is_zero_vector() {
        let emb = HtpEmbedder::new().embed(" ... ").unwrap();
        assert_eq!(emb.len(), HTP_DIM);
        assert!(emb.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_htp_distinguishes_shared_suffixes() {
        let model = HtpEmbedder::new();
        for (a, b) in [
            ("painting", "planting"),
            ("meeting", "setting"),
            ("deployment", "employment"),
        ] {
            let ea = model.embed(a).unwrap();
            let eb = model.embed(b).unwrap();
            assert_ne!(ea, eb, "{} and {} embed identically", a, b);
            assert!(dot(&ea, &eb) < 0.9, "{} and {} nearly collide", a, b);
        }
    }

    #[test]
    fn test_htp_residue_matches_small_token() {
        // "ab" = 0x61 * 2^16 + 0x62, small enough to reduce directly
        let model = HtpEmbedder::new();
        let n = (0x61u64 << 16) + 0x62;
        let mut acc = vec![0.0f64; HTP_DIM];
        model.embed_token("ab", &mut acc);

        let m = model.moduli[10];
        let theta = 2.0 * PI * (n % m) as f64 / m as f64;
        assert!((acc[20] - theta.sin()).abs() < 1e-12);
        assert!((acc[21] - theta.cos()).abs() < 1e-12);
    }

    #[test]
    fn test_htp_shared_tokens_score_higher() {
        let model = HtpEmbedder::new();
        let query = model.embed("quarterly financial summary").unwrap();
        let report = model.embed("Write report\nquarterly summary").unwrap();
        let groceries = model.embed("Buy groceries\nmilk and eggs").unwrap();
        assert!(dot(&query, &report) > dot(&query, &groceries));
    }

    #[test]
    fn test_load_default_model() {
        let model = load_model(&ModelSource::default()).unwrap();
        assert_eq!(model.model_id(), "htp-384");
        assert_eq!(model.dimension(), HTP_DIM);
    }

    #[test]
    fn test_load_missing_path_fails() {
        let source = ModelSource::LocalPath("/nonexistent/model/dir".into());
        let err = load_model(&source).err().unwrap();
        assert!(matches!(err, SearchError::ModelLoad { .. }));
    }

    #[cfg(not(feature = "fastembed"))]
    #[test]
    fn test_load_unknown_name_fails() {
        let err = load_model(&ModelSource::Named("no-such-model".into()))
            .err()
            .unwrap();
        assert!(matches!(err, SearchError::ModelLoad { .. }));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.6, 0.8]);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
