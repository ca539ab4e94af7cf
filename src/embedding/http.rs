use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use ndarray::Array2;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Embedder calling an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(AppError::ConfigError(
                "Embedding endpoint cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(endpoint, model, timeout_secs, "Remote embedder configured");

        Ok(Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbedderError(format!(
                "Embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmbedderError(format!("Malformed embedding response: {}", e)))?;

        to_matrix(parsed.data, texts.len())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Place each returned vector at its `index` (or response position) and
/// check the batch is complete and rectangular.
fn to_matrix(data: Vec<EmbeddingData>, expected: usize) -> Result<Array2<f32>> {
    if data.len() != expected {
        return Err(AppError::EmbedderError(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    let dim = data.first().map(|d| d.embedding.len()).unwrap_or(0);
    if dim == 0 {
        return Err(AppError::EmbedderError("Empty embedding vector".to_string()));
    }

    let mut rows: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.into_iter().enumerate() {
        let slot = item.index.unwrap_or(position);
        if item.embedding.len() != dim {
            return Err(AppError::EmbedderError(format!(
                "Inconsistent embedding dimensions: {} vs {}",
                item.embedding.len(),
                dim
            )));
        }
        match rows.get_mut(slot) {
            Some(entry) if entry.is_none() => *entry = Some(item.embedding),
            _ => {
                return Err(AppError::EmbedderError(format!(
                    "Invalid or duplicate embedding index {}",
                    slot
                )))
            }
        }
    }

    let flat: Vec<f32> = rows.into_iter().flatten().flatten().collect();
    Array2::from_shape_vec((expected, dim), flat)
        .map_err(|e| AppError::EmbedderError(format!("Failed to shape embeddings: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_embed_batch_orders_rows_by_index() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_body(mockito::Matcher::Json(json!({
                "model": "test-embed",
                "input": ["train a model", "deploy it"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let embedder =
            HttpEmbedder::new(&format!("{}/v1/embeddings", server.url()), "test-embed", 5).unwrap();
        let texts = vec!["train a model".to_string(), "deploy it".to_string()];
        let matrix = embedder.embed_batch(&texts).await.unwrap();

        mock.assert_async().await;
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(matrix.row(1).to_vec(), vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_batch_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embed")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(&format!("{}/embed", server.url()), "m", 5).unwrap();
        let result = embedder.embed_batch(&["q".to_string()]).await;

        assert!(matches!(result, Err(AppError::EmbedderError(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_embed_batch_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embed")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(&format!("{}/embed", server.url()), "m", 5).unwrap();
        let result = embedder.embed_batch(&["q".to_string()]).await;

        assert!(matches!(result, Err(AppError::EmbedderError(_))));
    }

    #[test]
    fn test_to_matrix_rejects_ragged_rows() {
        let data = vec![
            EmbeddingData { index: Some(0), embedding: vec![1.0, 0.0] },
            EmbeddingData { index: Some(1), embedding: vec![1.0] },
        ];
        assert!(to_matrix(data, 2).is_err());
    }

    #[test]
    fn test_to_matrix_rejects_count_mismatch() {
        let data = vec![EmbeddingData { index: None, embedding: vec![1.0] }];
        assert!(to_matrix(data, 2).is_err());
    }

    #[test]
    fn test_to_matrix_rejects_duplicate_index() {
        let data = vec![
            EmbeddingData { index: Some(0), embedding: vec![1.0] },
            EmbeddingData { index: Some(0), embedding: vec![2.0] },
        ];
        assert!(to_matrix(data, 2).is_err());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpEmbedder::new("  ", "m", 5),
            Err(AppError::ConfigError(_))
        ));
    }
}
