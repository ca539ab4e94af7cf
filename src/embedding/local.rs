use crate::config::ScopeConfig;
use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use crate::inference::BiEncoderModel;
use async_trait::async_trait;
use ndarray::Array2;
use std::sync::Arc;

/// In-process embedder running the ONNX bi-encoder.
///
/// Inference is CPU-bound and blocking, so every batch runs on the blocking
/// thread pool.
pub struct LocalEmbedder {
    model: Arc<BiEncoderModel>,
    model_id: String,
}

impl LocalEmbedder {
    pub fn load(config: &ScopeConfig) -> Result<Self> {
        let model = BiEncoderModel::load(
            &config.model_path,
            &config.tokenizer_path,
            config.max_sequence_length,
            config.pool_size,
        )?;

        Ok(Self {
            model: Arc::new(model),
            model_id: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || model.encode_batch(&texts))
            .await
            .map_err(|e| AppError::ModelError(format!("Embedding task join error: {}", e)))?
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
