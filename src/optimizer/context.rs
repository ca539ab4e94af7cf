use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// Number of most recent entries joined by [`ConversationContextBuffer::combined_query`].
pub const COMBINED_QUERY_WINDOW: usize = 3;

/// One user intent and the tools invoked in response to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub tool_calls: Vec<String>,
}

/// Bounded, recency-ordered log of user intents.
///
/// Strict FIFO: once full, every `add` evicts the oldest entry first.
#[derive(Debug, Clone)]
pub struct ConversationContextBuffer {
    entries: VecDeque<ContextEntry>,
    max_size: usize,
}

impl ConversationContextBuffer {
    /// A capacity of 0 is treated as 1.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add(&mut self, query: impl Into<String>, tool_calls: Option<Vec<String>>) {
        while self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(ContextEntry {
            query: query.into(),
            timestamp: Utc::now(),
            tool_calls: tool_calls.unwrap_or_default(),
        });
    }

    /// Queries of the last [`COMBINED_QUERY_WINDOW`] entries, oldest first,
    /// joined by single spaces. Empty when the buffer is empty.
    pub fn combined_query(&self) -> String {
        let skip = self.entries.len().saturating_sub(COMBINED_QUERY_WINDOW);
        self.entries
            .iter()
            .skip(skip)
            .map(|e| e.query.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every tool name called across the retained entries.
    pub fn recent_tool_calls(&self) -> HashSet<String> {
        self.entries
            .iter()
            .flat_map(|e| e.tool_calls.iter().cloned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn entries(&self) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter()
    }
}
