//! Embedding providers for the semantic tool index.
//!
//! The index is written against [`Embedder`] only. Two strategies exist:
//! an in-process ONNX bi-encoder ([`LocalEmbedder`]) and an
//! OpenAI-compatible embeddings endpoint ([`HttpEmbedder`]).

pub mod http;
pub mod local;

pub use http::HttpEmbedder;
pub use local::LocalEmbedder;

use crate::config::{EmbedderKind, ScopeConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use ndarray::Array2;
use std::sync::Arc;

/// Text-to-vector conversion, one row per input text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Every row has the same dimension.
    async fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>>;

    /// Identifier of the model producing the vectors.
    fn model_id(&self) -> &str;
}

/// Build the embedder selected by configuration.
///
/// Returns `Ok(None)` when the embedder type is `disabled`.
///
/// # Errors
/// `ConfigError` when `remote-http` has no endpoint; model loading errors
/// for `local-model`.
pub fn from_config(config: &ScopeConfig) -> Result<Option<Arc<dyn Embedder>>> {
    match config.embedder {
        EmbedderKind::Disabled => Ok(None),
        EmbedderKind::LocalModel => {
            tracing::info!(model = %config.model, "Loading local embedding model");
            let embedder = LocalEmbedder::load(config)?;
            Ok(Some(Arc::new(embedder)))
        }
        EmbedderKind::RemoteHttp => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                AppError::ConfigError(
                    "remote-http embedder requires TOOLSCOPE_EMBEDDER_URL".to_string(),
                )
            })?;
            let embedder = HttpEmbedder::new(endpoint, &config.model, config.timeout_secs)?;
            Ok(Some(Arc::new(embedder)))
        }
    }
}
