//! Semantic tool index ("ToolScope").
//!
//! Embeds every tool's inference view once and answers nearest-neighbour
//! queries by cosine similarity. The index degrades instead of failing: if
//! no embedder can be built the index stays `Disabled`, and a failing query
//! returns no matches while the index stays `Ready`.

pub mod category;

pub use category::{infer_category, CATEGORY_PATTERNS, OTHER_CATEGORY};

use crate::config::ScopeConfig;
use crate::embedding::{self, Embedder};
use crate::error::{AppError, Result};
use crate::inference::{normalize_rows, BiEncoderModel};
use crate::ingestion::ToolDescriptor;
use crate::persistence;
use async_trait::async_trait;
use ndarray::{concatenate, Array2, Axis};
use serde::Serialize;
use std::sync::Arc;

/// Texts per embedding call while building the index.
const EMBED_BATCH_SIZE: usize = 64;

/// A tool matched by semantic search.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolMatch {
    pub name: String,
    pub description: String,
    /// Backend-defined similarity, higher is more relevant.
    pub score: f32,
    pub category: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Uninitialized,
    Initializing,
    Ready,
    Disabled,
}

/// Read side of a semantic tool index, as consumed by the visibility engine.
#[async_trait]
pub trait ToolSearch: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Best matches for `query`, most relevant first. Never fails: errors
    /// yield an empty list.
    async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        categories: Option<&[String]>,
    ) -> Vec<ToolMatch>;
}

pub struct ToolScope {
    config: ScopeConfig,
    state: ScopeState,
    tools: Vec<ToolDescriptor>,
    /// One L2-normalised row per entry in `tools`.
    embeddings: Array2<f32>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl ToolScope {
    pub fn new(config: ScopeConfig) -> Self {
        Self {
            config,
            state: ScopeState::Uninitialized,
            tools: Vec::new(),
            embeddings: Array2::zeros((0, 0)),
            embedder: None,
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Build the index with the embedder selected by configuration.
    ///
    /// Never returns an error; every failure leaves the index `Disabled`.
    pub async fn initialize(&mut self, catalog: &[ToolDescriptor]) {
        if !self.config.enabled {
            tracing::info!("ToolScope disabled, skipping initialization");
            self.state = ScopeState::Disabled;
            return;
        }

        match embedding::from_config(&self.config) {
            Ok(Some(embedder)) => self.initialize_with(catalog, embedder).await,
            Ok(None) => {
                tracing::info!("Embedder type is disabled, ToolScope disabled");
                self.state = ScopeState::Disabled;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create embedder, ToolScope disabled");
                self.state = ScopeState::Disabled;
            }
        }
    }

    /// Build the index with an already constructed embedder.
    pub async fn initialize_with(&mut self, catalog: &[ToolDescriptor], embedder: Arc<dyn Embedder>) {
        if self.state == ScopeState::Ready {
            tracing::warn!("ToolScope already initialized, ignoring rebuild");
            return;
        }
        if !self.config.enabled {
            tracing::info!("ToolScope disabled, skipping initialization");
            self.state = ScopeState::Disabled;
            return;
        }
        if catalog.is_empty() {
            tracing::warn!("No tools found for ToolScope indexing");
            self.state = ScopeState::Disabled;
            return;
        }

        self.state = ScopeState::Initializing;
        let start = std::time::Instant::now();

        match self.build_embeddings(catalog, embedder.as_ref()).await {
            Ok(embeddings) => {
                self.tools = catalog.to_vec();
                self.embeddings = embeddings;
                self.embedder = Some(embedder);
                self.state = ScopeState::Ready;
                tracing::info!(
                    tools = self.tools.len(),
                    dim = self.embeddings.ncols(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "ToolScope index built"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build ToolScope index");
                self.state = ScopeState::Disabled;
            }
        }
    }

    async fn build_embeddings(
        &self,
        catalog: &[ToolDescriptor],
        embedder: &dyn Embedder,
    ) -> Result<Array2<f32>> {
        let cache_path = self.config.cache_path.as_deref();

        if let Some(path) = cache_path {
            if let Some(cached) =
                persistence::try_load_embeddings_cache(path, embedder.model_id(), catalog)
            {
                return Ok(cached);
            }
        }

        let texts: Vec<String> = catalog.iter().map(|t| t.inference_view.clone()).collect();
        let mut chunks = Vec::with_capacity(texts.len().div_ceil(EMBED_BATCH_SIZE));
        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let embedded = embedder.embed_batch(chunk).await?;
            if embedded.nrows() != chunk.len() {
                return Err(AppError::EmbedderError(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    embedded.nrows()
                )));
            }
            chunks.push(embedded);
        }

        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        let mut embeddings = concatenate(Axis(0), &views)
            .map_err(|e| AppError::EmbedderError(format!("Inconsistent embedding batches: {}", e)))?;
        if embeddings.ncols() == 0 {
            return Err(AppError::EmbedderError("Embedder returned empty vectors".to_string()));
        }
        normalize_rows(&mut embeddings);

        if let Some(path) = cache_path {
            if let Err(e) =
                persistence::save_embeddings_cache(path, embedder.model_id(), catalog, &embeddings)
            {
                tracing::warn!(error = %e, "Failed to save embeddings cache");
            }
        }

        Ok(embeddings)
    }

    async fn try_search(&self, query: &str, k: usize) -> Result<Vec<ToolMatch>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::ResourceError("ToolScope has no embedder".to_string()))?;

        let mut query_matrix = embedder.embed_batch(&[query.to_string()]).await?;
        if query_matrix.nrows() != 1 || query_matrix.ncols() != self.embeddings.ncols() {
            return Err(AppError::EmbedderError(format!(
                "Query embedding has shape {:?}, index dimension is {}",
                query_matrix.shape(),
                self.embeddings.ncols()
            )));
        }
        normalize_rows(&mut query_matrix);
        let query_embedding = query_matrix.row(0).to_owned();

        let similarities = BiEncoderModel::cosine_similarity(&query_embedding, &self.embeddings);

        // Stable sort keeps catalog order among equal scores
        let mut ranked: Vec<(usize, f32)> = similarities.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| {
                let tool = &self.tools[idx];
                ToolMatch {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    score,
                    category: infer_category(&tool.name).to_string(),
                    tags: tool.tags.clone(),
                }
            })
            .collect())
    }

    /// Health summary for `/health`.
    pub fn health(&self) -> (bool, String) {
        if !self.config.enabled {
            return (true, "ToolScope disabled".to_string());
        }
        match self.state {
            ScopeState::Ready => (
                true,
                format!("ToolScope ready ({} tools indexed)", self.tools.len()),
            ),
            _ => (
                true,
                "ToolScope not initialized (fallback to keyword search)".to_string(),
            ),
        }
    }
}

#[async_trait]
impl ToolSearch for ToolScope {
    fn is_ready(&self) -> bool {
        self.state == ScopeState::Ready
    }

    async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        categories: Option<&[String]>,
    ) -> Vec<ToolMatch> {
        if !self.is_ready() || query.trim().is_empty() {
            return Vec::new();
        }

        let k = k.unwrap_or(self.config.default_k);
        if k == 0 {
            return Vec::new();
        }

        let matches = match self.try_search(query, k).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(error = %e, "ToolScope search failed");
                return Vec::new();
            }
        };

        let matches = match categories {
            Some(wanted) if !wanted.is_empty() => matches
                .into_iter()
                .filter(|m| wanted.iter().any(|c| c == &m.category))
                .collect(),
            _ => matches,
        };

        tracing::debug!(query, k, returned = matches.len(), "ToolScope search");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedderKind;
    use crate::ingestion::atomize_tools;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const VOCAB: &[&str] = &["train", "deploy", "notebook", "storage", "pipeline", "cluster"];

    /// Bag-of-keywords embedder: one dimension per vocabulary word.
    struct KeywordEmbedder {
        fail_after: Option<usize>,
        calls: AtomicUsize,
        broken: AtomicBool,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                fail_after: None,
                calls: AtomicUsize::new(0),
                broken: AtomicBool::new(false),
            }
        }

        fn failing_after(calls: usize) -> Self {
            Self {
                fail_after: Some(calls),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.load(Ordering::SeqCst) || self.fail_after.is_some_and(|n| call >= n) {
                return Err(AppError::EmbedderError("provider unreachable".to_string()));
            }

            let mut out = Array2::zeros((texts.len(), VOCAB.len()));
            for (i, text) in texts.iter().enumerate() {
                let lower = text.to_lowercase();
                for (j, word) in VOCAB.iter().enumerate() {
                    out[[i, j]] = lower.matches(word).count() as f32;
                }
            }
            Ok(out)
        }

        fn model_id(&self) -> &str {
            "keyword-test"
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        atomize_tools(
            &json!({
                "tools": [
                    { "name": "train", "description": "Train a model with LoRA", "tags": ["gpu"] },
                    { "name": "deploy_model", "description": "Deploy a model for serving" },
                    { "name": "create_workbench", "description": "Create a notebook" },
                    { "name": "list_storage", "description": "List storage volumes" },
                    { "name": "explore_cluster", "description": "Explore the cluster" }
                ]
            }),
            "rhoai",
        )
        .unwrap()
    }

    async fn ready_scope(embedder: KeywordEmbedder) -> ToolScope {
        let mut scope = ToolScope::new(ScopeConfig {
            default_k: 3,
            ..ScopeConfig::default()
        });
        scope.initialize_with(&catalog(), Arc::new(embedder)).await;
        scope
    }

    #[tokio::test]
    async fn test_search_before_initialize_is_empty() {
        let scope = ToolScope::new(ScopeConfig::default());
        assert_eq!(scope.state(), ScopeState::Uninitialized);
        assert!(scope.search("train", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_config_skips_build() {
        let mut scope = ToolScope::new(ScopeConfig {
            enabled: false,
            ..ScopeConfig::default()
        });
        scope.initialize(&catalog()).await;
        assert_eq!(scope.state(), ScopeState::Disabled);
        assert!(!scope.is_ready());
        assert_eq!(scope.health().1, "ToolScope disabled");
    }

    #[tokio::test]
    async fn test_disabled_embedder_type() {
        let mut scope = ToolScope::new(ScopeConfig {
            embedder: EmbedderKind::Disabled,
            ..ScopeConfig::default()
        });
        scope.initialize(&catalog()).await;
        assert_eq!(scope.state(), ScopeState::Disabled);
    }

    #[tokio::test]
    async fn test_remote_without_endpoint_degrades_to_disabled() {
        let mut scope = ToolScope::new(ScopeConfig {
            embedder: EmbedderKind::RemoteHttp,
            endpoint: None,
            ..ScopeConfig::default()
        });
        scope.initialize(&catalog()).await;
        assert_eq!(scope.state(), ScopeState::Disabled);
        assert!(scope.search("train", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_is_disabled() {
        let mut scope = ToolScope::new(ScopeConfig::default());
        scope.initialize_with(&[], Arc::new(KeywordEmbedder::new())).await;
        assert_eq!(scope.state(), ScopeState::Disabled);
    }

    #[tokio::test]
    async fn test_build_failure_is_disabled() {
        let mut scope = ToolScope::new(ScopeConfig::default());
        scope
            .initialize_with(&catalog(), Arc::new(KeywordEmbedder::failing_after(0)))
            .await;
        assert_eq!(scope.state(), ScopeState::Disabled);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let scope = ready_scope(KeywordEmbedder::new()).await;
        assert!(scope.is_ready());
        assert_eq!(scope.tool_count(), 5);

        let matches = scope.search("I want to train a model", None, None).await;
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].name, "train");
        assert_eq!(matches[0].category, "training");
        assert_eq!(matches[0].tags, vec!["gpu"]);
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let scope = ready_scope(KeywordEmbedder::new()).await;
        assert_eq!(scope.search("deploy", Some(1), None).await.len(), 1);
        assert_eq!(scope.search("deploy", Some(50), None).await.len(), 5);
        assert!(scope.search("deploy", Some(0), None).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_category_filter_preserves_order() {
        let scope = ready_scope(KeywordEmbedder::new()).await;
        let wanted = vec!["inference".to_string(), "storage".to_string()];

        let matches = scope.search("deploy storage", Some(5), Some(&wanted)).await;
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| wanted.contains(&m.category)));

        let unfiltered = scope.search("deploy storage", Some(5), None).await;
        let expected: Vec<&str> = unfiltered
            .iter()
            .filter(|m| wanted.contains(&m.category))
            .map(|m| m.name.as_str())
            .collect();
        let got: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_query_failure_returns_empty_and_stays_ready() {
        // One call to build the index, then every query fails
        let scope = ready_scope(KeywordEmbedder::failing_after(1)).await;
        assert!(scope.is_ready());

        assert!(scope.search("train", None, None).await.is_empty());
        assert_eq!(scope.state(), ScopeState::Ready);
    }

    #[tokio::test]
    async fn test_blank_query_is_empty() {
        let scope = ready_scope(KeywordEmbedder::new()).await;
        assert!(scope.search("   ", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_is_written_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScopeConfig {
            cache_path: Some(dir.path().join("embeddings.bin")),
            ..ScopeConfig::default()
        };

        let mut first = ToolScope::new(config.clone());
        first.initialize_with(&catalog(), Arc::new(KeywordEmbedder::new())).await;
        assert!(first.is_ready());
        assert!(dir.path().join("embeddings.bin").exists());

        // Only the query may reach the embedder on the second build
        let embedder = Arc::new(KeywordEmbedder::new());
        let mut second = ToolScope::new(config);
        second.initialize_with(&catalog(), embedder.clone()).await;
        assert!(second.is_ready());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        let matches = second.search("cluster", Some(1), None).await;
        assert_eq!(matches[0].name, "explore_cluster");
    }

    #[tokio::test]
    async fn test_health_messages() {
        let scope = ready_scope(KeywordEmbedder::new()).await;
        assert_eq!(scope.health(), (true, "ToolScope ready (5 tools indexed)".to_string()));

        let idle = ToolScope::new(ScopeConfig::default());
        assert!(idle.health().1.contains("not initialized"));
    }
}
