//! Events that can occur in a conversation

use crate::transport::{ChatReply, TransportError};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit { text: String },

    // Transport events
    ExchangeSucceeded { seq: u64, reply: ChatReply },
    /// Network failure, non-success status or undecodable payload
    ExchangeFailed { seq: u64, error: TransportError },
}

impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::UserSubmit { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::UserSubmit { .. } => "user_submit",
            Event::ExchangeSucceeded { .. } => "exchange_succeeded",
            Event::ExchangeFailed { .. } => "exchange_failed",
        }
    }
}
