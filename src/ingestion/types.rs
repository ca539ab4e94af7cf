//! Type definitions for the ingestion module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocable tool from the host catalog.
///
/// Built once when the catalog is loaded and never mutated afterwards.
/// `inference_view` is the text handed to the embedding provider, while
/// `raw_definition` is what gets returned to the model in a tool listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    /// Unique tool identifier (from MCP tool.name)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON schema of the tool parameters (`inputSchema`)
    pub input_schema: Value,

    /// The MCP server that provided this tool
    pub server_origin: String,

    /// Free-form labels carried on the tool definition, if any
    #[serde(default)]
    pub tags: Vec<String>,

    /// Pre-formatted text for embedding.
    /// Format: "TOOL: <name> | CONTEXT: <server_name> | FUNC: <description> | INPUTS: <param_summary>"
    pub inference_view: String,

    /// Full definition preserved for listing and invocation
    pub raw_definition: Value,
}
