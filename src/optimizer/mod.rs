//! Small model optimization: conversation context tracking and the policy
//! that narrows the tool catalog to a budget.

pub mod context;
pub mod engine;

pub use context::{ContextEntry, ConversationContextBuffer, COMBINED_QUERY_WINDOW};
pub use engine::SmallModelOptimizer;
