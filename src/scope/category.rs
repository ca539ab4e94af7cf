//! Name-based tool categories.
//!
//! Table order is priority order: `deploy_model` is `inference` rather than
//! `discovery` because `inference` comes first.

pub const OTHER_CATEGORY: &str = "other";

pub const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    ("training", &["train", "prepare_training", "get_training"]),
    ("inference", &["deploy", "model", "endpoint", "serve"]),
    ("workbenches", &["workbench", "notebook"]),
    ("storage", &["storage", "pvc", "volume"]),
    ("connections", &["connection", "s3", "data_connection"]),
    ("pipelines", &["pipeline"]),
    ("projects", &["project"]),
    ("discovery", &["cluster", "explore", "summary", "list"]),
];

/// Category of a tool, from the first table row with a pattern contained in
/// the lower-cased name.
pub fn infer_category(tool_name: &str) -> &'static str {
    let name = tool_name.to_lowercase();

    CATEGORY_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| name.contains(p)))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER_CATEGORY)
}
