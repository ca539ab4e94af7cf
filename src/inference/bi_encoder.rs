//! Bi-encoder model for tool and query embeddings.
//!
//! Encodes text independently into fixed-size, L2-normalised vectors
//! (384-dim for all-MiniLM-L6-v2, 768-dim for BGE-base), so tool vectors can
//! be computed once at startup and compared to a query by dot product.

use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ndarray::{Array1, Array2};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;
use tokenizers::Tokenizer;

/// Bi-encoder backed by a pool of ONNX sessions.
///
/// `Session::run` needs `&mut self`. Sessions are moved out of a lock-free
/// queue for the duration of one batch and pushed back afterwards, so each
/// session is only ever used by one thread at a time.
pub struct BiEncoderModel {
    sessions: ArrayQueue<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
}

impl BiEncoderModel {
    /// Load the model and tokenizer.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer JSON file
    /// * `max_length` - Maximum sequence length
    /// * `pool_size` - Number of sessions to create
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let pool_size = pool_size.max(1);

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            AppError::TokenizationError(format!("Failed to load bi-encoder tokenizer: {}", e))
        })?;

        // Read model file once
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::ModelError(format!("Failed to read model file: {}", e)))?;

        let sessions = ArrayQueue::new(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e| AppError::ModelError(format!("Failed to load bi-encoder model: {}", e)))?;

            sessions
                .push(session)
                .map_err(|_| AppError::ModelError("Failed to initialize session pool".into()))?;
        }

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            max_length,
            pool_size,
            "Bi-encoder model loaded"
        );

        Ok(Self {
            sessions,
            tokenizer,
            max_length,
        })
    }

    /// Encode a batch of texts.
    ///
    /// # Returns
    /// Array2<f32> of shape (batch_size, embedding_dim), rows L2-normalised.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let mut session = self
            .sessions
            .pop()
            .ok_or_else(|| AppError::ResourceError("No available bi-encoder sessions".into()))?;

        let result = self.run_batch(&mut session, texts);

        // Always hand the session back, even when inference failed
        let _ = self.sessions.push(session);

        result
    }

    fn run_batch(&self, session: &mut Session, texts: &[String]) -> Result<Array2<f32>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::TokenizationError(e.to_string()))?;

        let batch_size = encodings.len();

        // Longest sequence in this batch, capped at max_length
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::ModelError(format!("Bi-encoder inference failed: {}", e)))?;

        // last_hidden_state: (batch, seq_len, hidden_size)
        let hidden_state = outputs
            .get("last_hidden_state")
            .ok_or_else(|| AppError::ModelError("No 'last_hidden_state' output found".to_string()))?;

        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let hidden_size = shape_info[2] as usize;

        // Mean pooling over non-padding tokens
        let mut embeddings = Array2::zeros((batch_size, hidden_size));

        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                if attention_mask[i * max_len + j] == 1 {
                    let base_idx = i * max_len * hidden_size + j * hidden_size;
                    for (k, sum_val) in sum.iter_mut().enumerate() {
                        *sum_val += data[base_idx + k];
                    }
                    count += 1.0;
                }
            }

            if count > 0.0 {
                for (k, sum_val) in sum.iter().enumerate() {
                    embeddings[[i, k]] = sum_val / count;
                }
            }
        }

        normalize_rows(&mut embeddings);
        Ok(embeddings)
    }

    /// Cosine similarity between a query and every row of `doc_embeddings`.
    ///
    /// Both sides must already be L2-normalised, so this is a dot product.
    pub fn cosine_similarity(
        query_embedding: &Array1<f32>,
        doc_embeddings: &Array2<f32>,
    ) -> Vec<f32> {
        doc_embeddings
            .outer_iter()
            .map(|doc| query_embedding.dot(&doc))
            .collect()
    }
}

/// L2-normalise every row in place. Zero rows are left untouched.
pub fn normalize_rows(embeddings: &mut Array2<f32>) {
    for mut row in embeddings.rows_mut() {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}
