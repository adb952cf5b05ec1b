//! Conversation state types

use crate::persona::FALLBACK_REPLY;
use crate::session::ConversationId;
use serde::{Deserialize, Serialize};

/// Credits deducted locally when an exchange fails
pub const DEFAULT_FAILURE_CREDIT_COST: u32 = 2;

/// The in-flight request: the latest user message plus the conversation
/// it belongs to. Exists only between dispatch and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExchange {
    /// Sequence number; resolutions carrying another number are stale
    pub seq: u64,
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input
    Idle {
        /// Number of exchanges resolved so far
        completed: u64,
    },

    /// One exchange in flight; further submissions are rejected
    Busy { exchange: PendingExchange },
}

impl Default for ConvState {
    fn default() -> Self {
        ConvState::Idle { completed: 0 }
    }
}

impl ConvState {
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        matches!(self, ConvState::Busy { .. })
    }

    pub fn status(&self) -> EngineStatus {
        match self {
            ConvState::Idle { .. } => EngineStatus::Idle,
            ConvState::Busy { .. } => EngineStatus::Busy,
        }
    }
}

/// Coarse state as shown to observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    #[default]
    Idle,
    Busy,
}

impl EngineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Busy => "busy",
        }
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvContext {
    /// Assistant copy appended when an exchange fails
    pub fallback_reply: String,
    /// Credits deducted locally when an exchange fails
    pub failure_credit_cost: u32,
}

impl Default for ConvContext {
    fn default() -> Self {
        Self {
            fallback_reply: FALLBACK_REPLY.to_string(),
            failure_credit_cost: DEFAULT_FAILURE_CREDIT_COST,
        }
    }
}

impl ConvContext {
    pub fn new(fallback_reply: impl Into<String>, failure_credit_cost: u32) -> Self {
        Self {
            fallback_reply: fallback_reply.into(),
            failure_credit_cost,
        }
    }
}
