//! Host tool registry and the "list tools" strategy seam.
//!
//! The host never lists tools directly: it asks whatever `ToolLister` it was
//! handed. `ToolRegistry` lists the full catalog; `SmallModelOptimizer`
//! decorates a registry and lists a filtered subset.

use crate::ingestion::ToolDescriptor;
use async_trait::async_trait;
use std::sync::Arc;

/// Strategy for enumerating currently available tools.
#[async_trait]
pub trait ToolLister: Send + Sync {
    async fn list_tools(&self) -> Vec<ToolDescriptor>;
}

/// Immutable snapshot of every registered tool, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<[ToolDescriptor]>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools: tools.into(),
        }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

#[async_trait]
impl ToolLister for ToolRegistry {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.to_vec()
    }
}
