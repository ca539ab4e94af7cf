use crate::catalog::ToolLister;
use crate::config::{FilterConfig, FilterMode};
use crate::ingestion::ToolDescriptor;
use crate::optimizer::context::ConversationContextBuffer;
use crate::scope::ToolSearch;
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Extra candidates requested from the index beyond the free slots, since
/// some matches may already be visible.
const SEARCH_OVERFETCH: usize = 5;

/// Visibility policy engine.
///
/// Decorates the host's [`ToolLister`]: after [`install`](Self::install) the
/// host lists tools through this engine and sees only the subset allowed by
/// the configured [`FilterMode`].
pub struct SmallModelOptimizer {
    config: FilterConfig,
    context: ConversationContextBuffer,
    search: Option<Arc<dyn ToolSearch>>,
    inner: Option<Arc<dyn ToolLister>>,
    catalog: IndexMap<String, ToolDescriptor>,
    /// Size of the most recent listing, reported by `health`.
    last_visible: AtomicUsize,
}

impl SmallModelOptimizer {
    pub fn new(config: FilterConfig, search: Option<Arc<dyn ToolSearch>>) -> Self {
        if matches!(config.mode, FilterMode::Moderate | FilterMode::Aggressive)
            && config.pinned_tools.len() > config.max_tools
        {
            tracing::warn!(
                pinned = config.pinned_tools.len(),
                max_tools = config.max_tools,
                "More pinned tools than max_tools, visible tools will exceed the cap"
            );
        }

        tracing::info!(
            mode = config.mode.as_str(),
            max_tools = config.max_tools,
            context_size = config.context_size,
            semantic = search.is_some(),
            "Small model optimizer configured"
        );

        Self {
            context: ConversationContextBuffer::new(config.context_size),
            config,
            search,
            inner: None,
            catalog: IndexMap::new(),
            last_visible: AtomicUsize::new(0),
        }
    }

    /// Capture the full catalog from `inner` and keep it for pass-through.
    ///
    /// The catalog is read exactly once; a second install is ignored.
    pub async fn install(&mut self, inner: Arc<dyn ToolLister>) {
        if self.inner.is_some() {
            tracing::warn!("Optimizer already installed, ignoring");
            return;
        }

        let tools = inner.list_tools().await;
        for tool in tools {
            if self.catalog.contains_key(&tool.name) {
                tracing::warn!(tool = %tool.name, "Duplicate tool name in catalog, keeping first");
                continue;
            }
            self.catalog.insert(tool.name.clone(), tool);
        }
        self.inner = Some(inner);

        let visible = match self.config.mode {
            FilterMode::None => self.catalog.len(),
            _ => self.visible_names().await.len(),
        };
        self.last_visible.store(visible, Ordering::Relaxed);

        tracing::info!(
            total_tools = self.catalog.len(),
            visible_tools = visible,
            mode = self.config.mode.as_str(),
            "Optimizer installed"
        );
    }

    pub fn is_installed(&self) -> bool {
        self.inner.is_some()
    }

    pub fn mode(&self) -> FilterMode {
        self.config.mode
    }

    pub fn record_context(&mut self, query: impl Into<String>, tool_calls: Option<Vec<String>>) {
        self.context.add(query, tool_calls);
    }

    pub fn context(&self) -> &ConversationContextBuffer {
        &self.context
    }

    pub fn all_tool_names(&self) -> Vec<String> {
        self.catalog.keys().cloned().collect()
    }

    pub fn total_tool_count(&self) -> usize {
        self.catalog.len()
    }

    pub async fn visible_tool_count(&self) -> usize {
        self.filtered_tools().await.len()
    }

    /// Tools the model may see right now.
    ///
    /// Order is pinned tools, then semantic matches, then defaults.
    pub async fn filtered_tools(&self) -> Vec<ToolDescriptor> {
        let tools = if self.config.mode == FilterMode::None {
            match &self.inner {
                Some(inner) => inner.list_tools().await,
                None => Vec::new(),
            }
        } else {
            let visible = self.visible_names().await;
            visible
                .iter()
                .filter_map(|name| self.catalog.get(name).cloned())
                .collect()
        };

        self.last_visible.store(tools.len(), Ordering::Relaxed);
        tools
    }

    /// Pinned tools are never capped; `max_tools` only limits what
    /// semantic matches and defaults may add.
    async fn visible_names(&self) -> IndexSet<String> {
        let mut visible = IndexSet::new();

        for name in &self.config.pinned_tools {
            if self.catalog.contains_key(name) {
                visible.insert(name.clone());
            }
        }
        if self.config.mode == FilterMode::Minimal {
            return visible;
        }

        let cap = self.config.max_tools;
        let remaining = cap.saturating_sub(visible.len());
        if remaining > 0 {
            if let Some(search) = self.search.as_ref().filter(|s| s.is_ready()) {
                let query = self.context.combined_query();
                if !query.is_empty() {
                    let matches = search
                        .search(&query, Some(remaining + SEARCH_OVERFETCH), None)
                        .await;
                    tracing::debug!(
                        query = %query,
                        matches = matches.len(),
                        "Semantic candidates for visible tools"
                    );
                    self.extend_capped(&mut visible, matches.iter().map(|m| &m.name), cap);
                }
            }
        }

        self.extend_capped(&mut visible, self.config.default_tools.iter(), cap);
        visible
    }

    /// Add catalog members from `names` in order until `cap` is reached.
    fn extend_capped<'a>(
        &self,
        visible: &mut IndexSet<String>,
        names: impl Iterator<Item = &'a String>,
        cap: usize,
    ) {
        for name in names {
            if visible.len() >= cap {
                break;
            }
            if self.catalog.contains_key(name) {
                visible.insert(name.clone());
            }
        }
    }

    /// Health summary for `/health`.
    ///
    /// The visible count is the size of the last listing, so no embedding
    /// call is made here.
    pub fn health(&self) -> (bool, String) {
        if self.config.mode == FilterMode::None {
            return (true, "Small model optimization disabled".to_string());
        }
        if !self.is_installed() {
            return (true, "Optimizer not installed".to_string());
        }

        let visible = self.last_visible.load(Ordering::Relaxed);
        (
            true,
            format!(
                "Optimizer active (mode={}, {}/{} tools visible)",
                self.config.mode.as_str(),
                visible,
                self.total_tool_count()
            ),
        )
    }
}

#[async_trait]
impl ToolLister for SmallModelOptimizer {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.filtered_tools().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolRegistry;
    use crate::ingestion::atomize_tools;
    use crate::scope::ToolMatch;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Index stub returning a fixed ranking and recording queries.
    struct FixedSearch {
        ready: bool,
        ranking: Vec<&'static str>,
        queries: Mutex<Vec<(String, Option<usize>)>>,
    }

    impl FixedSearch {
        fn new(ranking: Vec<&'static str>) -> Self {
            Self {
                ready: true,
                ranking,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn not_ready() -> Self {
            Self {
                ready: false,
                ..Self::new(vec!["train"])
            }
        }
    }

    #[async_trait]
    impl ToolSearch for FixedSearch {
        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn search(
            &self,
            query: &str,
            k: Option<usize>,
            _categories: Option<&[String]>,
        ) -> Vec<ToolMatch> {
            self.queries.lock().unwrap().push((query.to_string(), k));
            self.ranking
                .iter()
                .take(k.unwrap_or(5))
                .enumerate()
                .map(|(i, name)| ToolMatch {
                    name: name.to_string(),
                    description: String::new(),
                    score: 1.0 - i as f32 * 0.1,
                    category: "other".to_string(),
                    tags: Vec::new(),
                })
                .collect()
        }
    }

    struct CountingLister {
        inner: ToolRegistry,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolLister for CountingLister {
        async fn list_tools(&self) -> Vec<ToolDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_tools().await
        }
    }

    fn registry(names: &[&str]) -> ToolRegistry {
        let defs: Vec<_> = names
            .iter()
            .map(|n| json!({ "name": n, "description": format!("{} tool", n) }))
            .collect();
        ToolRegistry::new(atomize_tools(&json!({ "tools": defs }), "rhoai").unwrap())
    }

    fn config(mode: FilterMode, max_tools: usize, pinned: &[&str]) -> FilterConfig {
        FilterConfig {
            mode,
            max_tools,
            pinned_tools: pinned.iter().map(|s| s.to_string()).collect(),
            ..FilterConfig::default()
        }
    }

    const CATALOG: &[&str] = &[
        "suggest_tools",
        "list_tool_categories",
        "explore_cluster",
        "cluster_summary",
        "project_summary",
        "train",
        "deploy_model",
    ];

    async fn installed(
        config: FilterConfig,
        search: Option<Arc<dyn ToolSearch>>,
        names: &[&str],
    ) -> SmallModelOptimizer {
        let mut optimizer = SmallModelOptimizer::new(config, search);
        optimizer.install(Arc::new(registry(names))).await;
        optimizer
    }

    async fn visible(optimizer: &SmallModelOptimizer) -> Vec<String> {
        optimizer
            .filtered_tools()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    #[tokio::test]
    async fn test_none_mode_passes_through() {
        let optimizer = installed(FilterConfig::default(), None, CATALOG).await;
        assert_eq!(visible(&optimizer).await, CATALOG);
        assert_eq!(
            optimizer.health().1,
            "Small model optimization disabled"
        );
    }

    #[tokio::test]
    async fn test_not_installed_is_empty() {
        let optimizer = SmallModelOptimizer::new(
            config(FilterMode::Moderate, 5, &["suggest_tools"]),
            None,
        );
        assert!(!optimizer.is_installed());
        assert!(visible(&optimizer).await.is_empty());
        assert_eq!(optimizer.health(), (true, "Optimizer not installed".to_string()));
    }

    #[tokio::test]
    async fn test_minimal_mode_is_pinned_only() {
        let mut optimizer = installed(
            config(FilterMode::Minimal, 10, &["suggest_tools", "list_tool_categories"]),
            Some(Arc::new(FixedSearch::new(vec!["train"]))),
            &["suggest_tools", "list_tool_categories", "train", "deploy_model"],
        )
        .await;
        optimizer.record_context("I want to train a model", None);
        assert_eq!(
            visible(&optimizer).await,
            vec!["suggest_tools", "list_tool_categories"]
        );
    }

    #[tokio::test]
    async fn test_moderate_without_context_uses_defaults() {
        let search = Arc::new(FixedSearch::new(vec!["train"]));
        let optimizer = installed(
            config(FilterMode::Moderate, 5, &["suggest_tools"]),
            Some(search.clone()),
            CATALOG,
        )
        .await;

        assert_eq!(
            visible(&optimizer).await,
            vec!["suggest_tools", "explore_cluster", "cluster_summary", "project_summary"]
        );
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_moderate_with_context_adds_semantic_matches() {
        let search = Arc::new(FixedSearch::new(vec!["train", "deploy_model"]));
        let mut optimizer = installed(
            config(FilterMode::Moderate, 5, &["suggest_tools"]),
            Some(search.clone()),
            CATALOG,
        )
        .await;
        optimizer.record_context("I want to train a model", None);

        assert_eq!(
            visible(&optimizer).await,
            vec![
                "suggest_tools",
                "train",
                "deploy_model",
                "explore_cluster",
                "cluster_summary"
            ]
        );

        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[0], ("I want to train a model".to_string(), Some(4 + 5)));
    }

    #[tokio::test]
    async fn test_cap_holds_for_large_catalog() {
        let names: Vec<String> = (0..25).map(|i| format!("tool_{}", i)).collect();
        let mut all: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        all.extend_from_slice(CATALOG);

        let ranking: Vec<&'static str> = vec!["tool_1", "tool_2", "tool_3", "tool_4", "train"];
        for mode in [FilterMode::Moderate, FilterMode::Aggressive] {
            let mut optimizer = installed(
                config(mode, 3, &["suggest_tools"]),
                Some(Arc::new(FixedSearch::new(ranking.clone()))),
                &all,
            )
            .await;
            assert!(optimizer.filtered_tools().await.len() <= 3);

            optimizer.record_context("anything", None);
            assert_eq!(
                visible(&optimizer).await,
                vec!["suggest_tools", "tool_1", "tool_2"]
            );
            assert_eq!(optimizer.visible_tool_count().await, 3);
            assert_eq!(optimizer.total_tool_count(), 32);
        }
    }

    #[tokio::test]
    async fn test_absent_pinned_tool_is_skipped() {
        let optimizer = installed(
            config(FilterMode::Minimal, 10, &["no_such_tool", "suggest_tools"]),
            None,
            CATALOG,
        )
        .await;
        assert_eq!(visible(&optimizer).await, vec!["suggest_tools"]);
    }

    #[tokio::test]
    async fn test_pinned_tools_exceed_cap() {
        for mode in [FilterMode::Moderate, FilterMode::Aggressive] {
            let mut optimizer = installed(
                config(mode, 1, &["suggest_tools", "list_tool_categories"]),
                Some(Arc::new(FixedSearch::new(vec!["train"]))),
                CATALOG,
            )
            .await;
            optimizer.record_context("train a model", None);

            // No slots left, so neither semantic matches nor defaults are added
            assert_eq!(
                visible(&optimizer).await,
                vec!["suggest_tools", "list_tool_categories"]
            );
        }
    }

    #[tokio::test]
    async fn test_unready_index_falls_back_to_defaults() {
        let search = Arc::new(FixedSearch::not_ready());
        let mut optimizer = installed(
            config(FilterMode::Moderate, 4, &["suggest_tools"]),
            Some(search.clone()),
            CATALOG,
        )
        .await;
        optimizer.record_context("train llama", None);

        assert_eq!(
            visible(&optimizer).await,
            vec!["suggest_tools", "explore_cluster", "cluster_summary", "project_summary"]
        );
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_index_and_unknown_matches_degrade_gracefully() {
        let mut optimizer = installed(
            config(FilterMode::Moderate, 10, &["suggest_tools"]),
            Some(Arc::new(FixedSearch::new(vec!["not_in_catalog", "train"]))),
            &["suggest_tools", "train"],
        )
        .await;
        optimizer.record_context("train", None);

        // Unknown match skipped, defaults absent from the catalog skipped
        assert_eq!(visible(&optimizer).await, vec!["suggest_tools", "train"]);
    }

    #[tokio::test]
    async fn test_semantic_duplicates_of_pinned_not_repeated() {
        let mut optimizer = installed(
            config(FilterMode::Moderate, 3, &["suggest_tools"]),
            Some(Arc::new(FixedSearch::new(vec!["suggest_tools", "train"]))),
            CATALOG,
        )
        .await;
        optimizer.record_context("help", None);

        assert_eq!(
            visible(&optimizer).await,
            vec!["suggest_tools", "train", "explore_cluster"]
        );
    }

    #[tokio::test]
    async fn test_catalog_captured_once() {
        let lister = Arc::new(CountingLister {
            inner: registry(CATALOG),
            calls: AtomicUsize::new(0),
        });
        let mut optimizer =
            SmallModelOptimizer::new(config(FilterMode::Moderate, 5, &["suggest_tools"]), None);

        optimizer.install(lister.clone()).await;
        optimizer.install(lister.clone()).await;
        for _ in 0..3 {
            optimizer.list_tools().await;
        }

        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
        assert_eq!(optimizer.all_tool_names(), CATALOG);
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let optimizer = installed(
            config(FilterMode::Aggressive, 3, &["suggest_tools"]),
            None,
            CATALOG,
        )
        .await;
        assert_eq!(
            optimizer.health(),
            (
                true,
                "Optimizer active (mode=aggressive, 3/7 tools visible)".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_health_does_not_search() {
        let search = Arc::new(FixedSearch::new(vec!["train", "deploy_model"]));
        let mut optimizer = installed(
            config(FilterMode::Moderate, 3, &["suggest_tools"]),
            Some(search.clone()),
            CATALOG,
        )
        .await;
        optimizer.record_context("train", None);

        assert_eq!(
            optimizer.health().1,
            "Optimizer active (mode=moderate, 3/7 tools visible)"
        );
        assert!(search.queries.lock().unwrap().is_empty());

        // Reflects the latest listing
        let listed = optimizer.filtered_tools().await.len();
        assert_eq!(search.queries.lock().unwrap().len(), 1);
        assert_eq!(
            optimizer.health().1,
            format!("Optimizer active (mode=moderate, {}/7 tools visible)", listed)
        );
    }

    #[tokio::test]
    async fn test_record_context_feeds_buffer() {
        let mut optimizer = SmallModelOptimizer::new(
            FilterConfig {
                context_size: 2,
                ..FilterConfig::default()
            },
            None,
        );
        optimizer.record_context("a", Some(vec!["train".to_string()]));
        optimizer.record_context("b", None);
        optimizer.record_context("c", None);

        assert_eq!(optimizer.context().len(), 2);
        assert_eq!(optimizer.context().combined_query(), "b c");
        assert!(optimizer.context().recent_tool_calls().is_empty());
    }
}
