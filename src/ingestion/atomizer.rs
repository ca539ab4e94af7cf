//! Tool atomization: turns an MCP `list_tools` document into `ToolDescriptor`s.
//!
//! Accepts either a full JSON-RPC response (`result.tools`) or a bare
//! `{"tools": [...]}` object, which is what most catalog dumps look like.

use crate::error::{AppError, Result};
use crate::ingestion::types::ToolDescriptor;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Maximum description length before truncation
const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Maximum parameter description length for the summary
const MAX_PARAM_DESC_LENGTH: usize = 50;

/// Transform an MCP tool listing into descriptors.
///
/// Individual malformed tools are logged and skipped. Duplicate names keep
/// the first occurrence, since the catalog is keyed by name.
///
/// # Errors
/// Returns `AppError::AtomizerError` if no tools array can be found, or if
/// every entry in a non-empty array is malformed.
pub fn atomize_tools(json: &Value, server_name: &str) -> Result<Vec<ToolDescriptor>> {
    let tools_array = extract_tools_array(json)?;

    let mut results = Vec::with_capacity(tools_array.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(tools_array.len());

    for (idx, tool_value) in tools_array.iter().enumerate() {
        match normalize_tool(tool_value, server_name) {
            Ok(tool) => {
                if seen.insert(tool.name.clone()) {
                    results.push(tool);
                } else {
                    tracing::warn!(index = idx, name = %tool.name, "Skipping duplicate tool name");
                }
            }
            Err(e) => {
                tracing::warn!(
                    index = idx,
                    error = %e,
                    "Skipping malformed tool definition"
                );
            }
        }
    }

    if results.is_empty() && !tools_array.is_empty() {
        return Err(AppError::AtomizerError(
            "All tool definitions failed to parse".into(),
        ));
    }

    tracing::debug!(
        total = tools_array.len(),
        parsed = results.len(),
        server = server_name,
        "Tool atomization complete"
    );

    Ok(results)
}

/// Read and atomize a catalog file.
pub fn load_catalog(path: &Path, server_name: &str) -> Result<Vec<ToolDescriptor>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::AtomizerError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let json: Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::AtomizerError(format!("Invalid JSON in {}: {}", path.display(), e)))?;

    let tools = atomize_tools(&json, server_name)?;
    tracing::info!(path = %path.display(), count = tools.len(), "Tool catalog loaded");
    Ok(tools)
}

fn extract_tools_array(json: &Value) -> Result<&Vec<Value>> {
    json.get("result")
        .and_then(|r| r.get("tools"))
        .or_else(|| json.get("tools"))
        .and_then(|t| t.as_array())
        .ok_or_else(|| {
            AppError::AtomizerError("Expected 'result.tools' or 'tools' array".into())
        })
}

fn normalize_tool(tool_value: &Value, server_name: &str) -> Result<ToolDescriptor> {
    let name = tool_value
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::AtomizerError(format!(
                "Tool missing required 'name' field: {:?}",
                tool_value.get("name")
            ))
        })?;

    let description = tool_value
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let input_schema = tool_value
        .get("inputSchema")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    let tags = tool_value
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let truncated_desc = truncate_description(description);
    let param_summary = build_param_summary(Some(&input_schema));
    let inference_view = build_inference_view(name, server_name, &truncated_desc, &param_summary);

    Ok(ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        server_origin: server_name.to_string(),
        tags,
        inference_view,
        raw_definition: tool_value.clone(),
    })
}

/// Byte offset of the last char boundary at or before `max`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Truncate description to MAX_DESCRIPTION_LENGTH with ellipsis,
/// preferring a word boundary.
fn truncate_description(desc: &str) -> String {
    if desc.len() <= MAX_DESCRIPTION_LENGTH {
        return desc.to_string();
    }

    let truncated = &desc[..floor_char_boundary(desc, MAX_DESCRIPTION_LENGTH)];

    match truncated.rfind(' ') {
        Some(pos) if pos > MAX_DESCRIPTION_LENGTH - 50 => {
            format!("{}...", &truncated[..pos])
        }
        _ => format!("{}...", truncated),
    }
}

/// Build parameter summary from inputSchema.properties.
///
/// Format: "param1*: type (desc), param2: type"
/// Required parameters are marked with an asterisk (*).
fn build_param_summary(input_schema: Option<&Value>) -> String {
    let Some(schema) = input_schema else {
        return "none".to_string();
    };

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return "none".to_string();
    };

    if properties.is_empty() {
        return "none".to_string();
    }

    let required: HashSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let params: Vec<String> = properties
        .iter()
        .map(|(name, prop)| format_param(name, prop, required.contains(name.as_str())))
        .collect();

    params.join(", ")
}

fn format_param(name: &str, prop: &Value, is_required: bool) -> String {
    let param_type = prop.get("type").and_then(|t| t.as_str()).unwrap_or("any");

    let brief_desc = prop
        .get("description")
        .and_then(|d| d.as_str())
        .map(|d| {
            // First sentence, or the first MAX_PARAM_DESC_LENGTH bytes
            let end = d
                .find('.')
                .unwrap_or(MAX_PARAM_DESC_LENGTH)
                .min(MAX_PARAM_DESC_LENGTH);
            &d[..floor_char_boundary(d, end)]
        })
        .unwrap_or("");

    let req_marker = if is_required { "*" } else { "" };

    if brief_desc.is_empty() {
        format!("{}{}: {}", name, req_marker, param_type)
    } else {
        format!("{}{}: {} ({})", name, req_marker, param_type, brief_desc)
    }
}

fn build_inference_view(name: &str, server: &str, desc: &str, params: &str) -> String {
    format!(
        "TOOL: {} | CONTEXT: {} | FUNC: {} | INPUTS: {}",
        name, server, desc, params
    )
}
