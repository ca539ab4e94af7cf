use crate::catalog::ToolRegistry;
use crate::config::Config;
use crate::error::Result;
use crate::ingestion::load_catalog;
use crate::optimizer::SmallModelOptimizer;
use crate::scope::{ToolScope, ToolSearch};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state shared across all request handlers.
///
/// Registry and index are immutable after startup and shared through `Arc`.
/// The optimizer owns the conversation context, so requests take turns on it.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub scope: Arc<ToolScope>,
    pub optimizer: Mutex<SmallModelOptimizer>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Load the catalog, build the semantic index and install the optimizer.
    ///
    /// Index failures only disable semantic search; a catalog that cannot be
    /// read is a startup error.
    pub async fn new(config: Config) -> Result<Self> {
        let tools = match &config.tools_path {
            Some(path) => load_catalog(path, &config.tools_server_name)?,
            None => {
                tracing::warn!("TOOLS_PATH not set, serving an empty catalog");
                Vec::new()
            }
        };
        tracing::info!(num_tools = tools.len(), "Tool catalog loaded");

        let mut scope = ToolScope::new(config.scope.clone());
        scope.initialize(&tools).await;

        Ok(Self::from_parts(config, ToolRegistry::new(tools), scope).await)
    }

    /// Assemble state from an already built registry and index.
    pub async fn from_parts(config: Config, registry: ToolRegistry, scope: ToolScope) -> Self {
        let registry = Arc::new(registry);
        let scope = Arc::new(scope);

        let search: Arc<dyn ToolSearch> = scope.clone();
        let mut optimizer = SmallModelOptimizer::new(config.filter.clone(), Some(search));
        optimizer.install(registry.clone()).await;

        Self {
            registry,
            scope,
            optimizer: Mutex::new(optimizer),
            config: Arc::new(config),
        }
    }
}
