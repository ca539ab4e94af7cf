//! Ingestion of the host tool catalog.
//!
//! Transforms MCP tool definitions into `ToolDescriptor` records that the
//! semantic index and the visibility engine both read from.

pub mod atomizer;
pub mod types;

pub use atomizer::{atomize_tools, load_catalog};
pub use types::ToolDescriptor;
