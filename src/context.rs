//! Per-call context handed to tools.

use chrono::{DateTime, Utc};

/// Context for one tool invocation inside a response loop.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation (thread key) the call belongs to.
    pub chat_id: String,
    /// 1-based response cycle that issued the call.
    pub cycle: u32,
    /// Tool call id assigned by the model.
    pub tool_call_id: String,
    pub started_at: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(chat_id: impl Into<String>, cycle: u32, tool_call_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            cycle,
            tool_call_id: tool_call_id.into(),
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the call started, never negative.
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}
