//! Intent-to-tools guidance for agents.
//!
//! `suggest_tools` records the intent as conversation context, so calling it
//! also widens the filtered tool list on the next listing.

use crate::optimizer::SmallModelOptimizer;
use crate::scope::ToolSearch;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Matches requested from the index for a suggestion.
const SUGGEST_K: usize = 5;

const WORKFLOW_LEN: usize = 3;

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

pub struct CategoryInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub tools: &'static [&'static str],
    pub typical_workflow: &'static [&'static str],
    pub use_first: bool,
}

pub const TOOL_CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        name: "discovery",
        description: "Start here to understand cluster state",
        tools: &["cluster_summary", "project_summary", "explore_cluster", "list_resources"],
        typical_workflow: &[],
        use_first: true,
    },
    CategoryInfo {
        name: "training",
        description: "Model fine-tuning operations",
        tools: &[
            "prepare_training",
            "train",
            "get_training_progress",
            "get_training_logs",
            "analyze_training_failure",
        ],
        typical_workflow: &[
            "prepare_training",
            "train (with confirmed=True)",
            "get_training_progress",
        ],
        use_first: false,
    },
    CategoryInfo {
        name: "inference",
        description: "Model deployment and serving",
        tools: &[
            "prepare_model_deployment",
            "deploy_model",
            "get_model_endpoint",
            "test_model_endpoint",
            "recommend_serving_runtime",
        ],
        typical_workflow: &["prepare_model_deployment", "deploy_model", "test_model_endpoint"],
        use_first: false,
    },
    CategoryInfo {
        name: "workbenches",
        description: "Jupyter notebook environments",
        tools: &[
            "list_workbenches",
            "create_workbench",
            "start_workbench",
            "stop_workbench",
            "get_workbench_url",
        ],
        typical_workflow: &[],
        use_first: false,
    },
    CategoryInfo {
        name: "diagnostics",
        description: "Troubleshooting and debugging",
        tools: &[
            "diagnose_resource",
            "analyze_training_failure",
            "get_job_events",
            "get_training_logs",
        ],
        typical_workflow: &[],
        use_first: false,
    },
    CategoryInfo {
        name: "resources",
        description: "Generic resource operations",
        tools: &["get_resource", "list_resources", "manage_resource", "resource_status"],
        typical_workflow: &[],
        use_first: false,
    },
    CategoryInfo {
        name: "storage",
        description: "Storage and data connections",
        tools: &[
            "list_storage",
            "create_storage",
            "setup_training_storage",
            "list_data_connections",
            "create_s3_data_connection",
        ],
        typical_workflow: &[],
        use_first: false,
    },
];

struct IntentPattern {
    patterns: &'static [&'static str],
    category: &'static str,
    workflow: &'static [&'static str],
    explanation: &'static str,
}

const INTENT_PATTERNS: &[IntentPattern] = &[
    IntentPattern {
        patterns: &["train", "fine-tune", "finetune", "lora", "qlora"],
        category: "training",
        workflow: &["prepare_training", "train"],
        explanation: "Training workflow: First use prepare_training() to check prerequisites, \
                      then train() with confirmed=True to start the job.",
    },
    IntentPattern {
        patterns: &["deploy", "serve", "inference", "predict"],
        category: "inference",
        workflow: &["prepare_model_deployment", "deploy_model"],
        explanation: "Deployment workflow: First use prepare_model_deployment() to validate, \
                      then deploy_model() to create the InferenceService.",
    },
    IntentPattern {
        patterns: &["debug", "troubleshoot", "failed", "error", "why", "broken"],
        category: "diagnostics",
        workflow: &["diagnose_resource"],
        explanation: "Use diagnose_resource() to get comprehensive diagnostics including \
                      status, events, logs, and suggested fixes.",
    },
    IntentPattern {
        patterns: &["explore", "overview", "cluster", "what's running", "status"],
        category: "discovery",
        workflow: &["explore_cluster"],
        explanation: "Use explore_cluster() to get a complete overview of all projects \
                      and resources in the cluster.",
    },
    IntentPattern {
        patterns: &["notebook", "workbench", "jupyter", "code"],
        category: "workbenches",
        workflow: &["list_workbenches", "create_workbench"],
        explanation: "Use list_workbenches() to see existing notebooks, \
                      create_workbench() to create a new one.",
    },
    IntentPattern {
        patterns: &["storage", "pvc", "volume", "data connection", "s3"],
        category: "storage",
        workflow: &["list_storage", "list_data_connections"],
        explanation: "Use list_storage() for PVCs, list_data_connections() for S3 connections.",
    },
];

/// Index into `INTENT_PATTERNS` used when no keyword matches.
const DISCOVERY_PATTERN: usize = 3;

/// Optional hints used to fill example call arguments.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SuggestContext {
    pub namespace: Option<String>,
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuggestedMatch {
    pub name: String,
    pub score: f32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Suggestion {
    pub intent: String,
    pub category: String,
    pub workflow: Vec<String>,
    pub explanation: String,
    /// `"semantic"` or `"keyword"`.
    pub search_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<SuggestedMatch>>,
    pub example_calls: Vec<Value>,
    pub all_categories: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategorySummary {
    pub category: &'static str,
    pub description: &'static str,
    pub key_tools: Vec<&'static str>,
    pub use_first: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryListing {
    pub categories: Vec<CategorySummary>,
    pub recommendation: &'static str,
}

/// Recommend tools and a workflow for `intent`.
///
/// Semantic search is used when the index is ready and finds anything;
/// otherwise the intent is matched against fixed keyword patterns.
pub async fn suggest_tools(
    intent: &str,
    context: &SuggestContext,
    optimizer: &mut SmallModelOptimizer,
    scope: &dyn ToolSearch,
) -> Suggestion {
    optimizer.record_context(intent, None);

    if scope.is_ready() {
        let matches = scope.search(intent, Some(SUGGEST_K), None).await;
        if let Some(first) = matches.first() {
            let category = first.category.clone();
            let workflow: Vec<String> = matches
                .iter()
                .take(WORKFLOW_LEN)
                .map(|m| m.name.clone())
                .collect();

            let mut explanation = format!(
                "Based on semantic search for '{}', these tools are most relevant. ",
                intent
            );
            if let Some(info) = category_info(&category) {
                if !info.typical_workflow.is_empty() {
                    explanation.push_str(&format!(
                        "Typical workflow: {}",
                        info.typical_workflow.join(" -> ")
                    ));
                }
            }

            tracing::debug!(intent, category = %category, "Semantic tool suggestion");

            return Suggestion {
                intent: intent.to_string(),
                category,
                example_calls: example_calls(&workflow, context),
                workflow,
                explanation,
                search_method: "semantic",
                matches: Some(
                    matches
                        .iter()
                        .map(|m| SuggestedMatch {
                            name: m.name.clone(),
                            score: (m.score * 1000.0).round() / 1000.0,
                            description: m
                                .description
                                .chars()
                                .take(DESCRIPTION_PREVIEW_CHARS)
                                .collect(),
                        })
                        .collect(),
                ),
                all_categories: category_names(),
            };
        }
    }

    let pattern = keyword_match(intent);
    tracing::debug!(intent, category = pattern.category, "Keyword tool suggestion");

    let workflow: Vec<String> = pattern.workflow.iter().map(|s| s.to_string()).collect();
    Suggestion {
        intent: intent.to_string(),
        category: pattern.category.to_string(),
        example_calls: example_calls(&workflow, context),
        workflow,
        explanation: pattern.explanation.to_string(),
        search_method: "keyword",
        matches: None,
        all_categories: category_names(),
    }
}

pub fn list_tool_categories() -> CategoryListing {
    CategoryListing {
        categories: TOOL_CATEGORIES
            .iter()
            .map(|info| CategorySummary {
                category: info.name,
                description: info.description,
                key_tools: info.tools.iter().take(3).copied().collect(),
                use_first: info.use_first,
            })
            .collect(),
        recommendation: "Start with 'discovery' tools like explore_cluster() \
                         to understand the cluster state before taking actions.",
    }
}

fn category_info(name: &str) -> Option<&'static CategoryInfo> {
    TOOL_CATEGORIES.iter().find(|c| c.name == name)
}

fn category_names() -> Vec<&'static str> {
    TOOL_CATEGORIES.iter().map(|c| c.name).collect()
}

/// Pattern with the most keyword hits; ties keep the earlier pattern.
fn keyword_match(intent: &str) -> &'static IntentPattern {
    let intent = intent.to_lowercase();
    let mut best = &INTENT_PATTERNS[DISCOVERY_PATTERN];
    let mut best_score = 0;

    for pattern in INTENT_PATTERNS {
        let score = pattern.patterns.iter().filter(|p| intent.contains(*p)).count();
        if score > best_score {
            best_score = score;
            best = pattern;
        }
    }
    best
}

fn example_calls(workflow: &[String], context: &SuggestContext) -> Vec<Value> {
    let namespace = context.namespace.as_deref().unwrap_or("my-project");
    let resource_name = context.resource_name.as_deref().unwrap_or("my-resource");
    let model_id = "meta-llama/Llama-2-7b-hf";

    workflow
        .iter()
        .map(|tool| {
            let args = match tool.as_str() {
                "prepare_training" => json!({
                    "namespace": namespace,
                    "model_id": model_id,
                    "dataset_id": "tatsu-lab/alpaca",
                }),
                "train" => json!({
                    "namespace": namespace,
                    "model_id": model_id,
                    "confirmed": true,
                }),
                "prepare_model_deployment" => json!({
                    "namespace": namespace,
                    "model_id": model_id,
                }),
                "deploy_model" => json!({
                    "namespace": namespace,
                    "name": "my-model",
                    "runtime": "vllm-runtime",
                    "model_format": "pytorch",
                    "storage_uri": "pvc://model-storage/model",
                }),
                "diagnose_resource" => json!({
                    "resource_type": "training_job",
                    "name": resource_name,
                    "namespace": namespace,
                }),
                "explore_cluster" => json!({}),
                _ => json!({ "namespace": namespace }),
            };
            json!({ "tool": tool, "args": args })
        })
        .collect()
}
