//! Effects produced by state transitions

use super::state::{EngineStatus, PendingExchange};
use crate::session::ConversationId;
use crate::transcript::Role;

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Replied,
    /// The fallback reply was substituted
    FellBack { reason: String },
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append to the transcript
    AppendMessage { role: Role, content: String },

    /// Send the exchange to the transport (spawns as background task)
    Dispatch { exchange: PendingExchange },

    /// Bind the session to the server's conversation
    EstablishConversation { conversation_id: ConversationId },

    /// The server answered for a different conversation than the session's
    ReportInconsistency {
        established: ConversationId,
        received: ConversationId,
    },

    /// Authoritative balance from the server
    SetCredits { credits: u32 },

    /// Local deduction, floored at zero by the session store
    DeductCredits { amount: u32 },

    /// Notify observers of the new engine status
    NotifyStateChange { status: EngineStatus },

    /// Notify observers that an exchange resolved
    NotifyExchangeDone { seq: u64, outcome: ExchangeOutcome },
}

impl Effect {
    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn notify_state_change(status: EngineStatus) -> Self {
        Effect::NotifyStateChange { status }
    }
}
