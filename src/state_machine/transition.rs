//! Pure state transition function
//!
//! Given the same state, context, session and event this always produces
//! the same result. All I/O happens in the runtime executing the effects.

use super::effect::ExchangeOutcome;
use super::state::{EngineStatus, PendingExchange};
use super::{ConvContext, ConvState, Effect, Event};
use crate::session::Session;
use crate::transport::{ChatReply, TransportError};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition. None of them change state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("An exchange is already in flight, wait for the reply")]
    AgentBusy,
    #[error("Stale response for exchange {received} (expected {expected:?})")]
    StaleResponse {
        expected: Option<u64>,
        received: u64,
    },
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    session: &Session,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Idle + UserSubmit -> Busy
        (ConvState::Idle { completed }, Event::UserSubmit { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyInput);
            }

            let exchange = PendingExchange {
                seq: completed + 1,
                message: text.to_string(),
                conversation_id: session.conversation_id.clone(),
            };
            Ok(TransitionResult::new(ConvState::Busy {
                exchange: exchange.clone(),
            })
            .with_effect(Effect::append_user(text))
            .with_effect(Effect::notify_state_change(EngineStatus::Busy))
            .with_effect(Effect::Dispatch { exchange }))
        }

        // Busy + UserSubmit -> reject (single-flight guard, not a queue)
        (ConvState::Busy { .. }, Event::UserSubmit { text }) => {
            if text.trim().is_empty() {
                Err(TransitionError::EmptyInput)
            } else {
                Err(TransitionError::AgentBusy)
            }
        }

        // ============================================================
        // Resolution
        // ============================================================

        (ConvState::Busy { exchange }, Event::ExchangeSucceeded { seq, reply })
            if seq == exchange.seq =>
        {
            Ok(resolve_success(exchange, session, reply))
        }

        (ConvState::Busy { exchange }, Event::ExchangeFailed { seq, error })
            if seq == exchange.seq =>
        {
            Ok(resolve_failure(exchange, context, &error))
        }

        // Resolution for an exchange that is not the one in flight
        (
            ConvState::Busy { exchange },
            Event::ExchangeSucceeded { seq, .. } | Event::ExchangeFailed { seq, .. },
        ) => Err(TransitionError::StaleResponse {
            expected: Some(exchange.seq),
            received: seq,
        }),
        (
            ConvState::Idle { .. },
            Event::ExchangeSucceeded { seq, .. } | Event::ExchangeFailed { seq, .. },
        ) => Err(TransitionError::StaleResponse {
            expected: None,
            received: seq,
        }),
    }
}

fn resolve_success(
    exchange: &PendingExchange,
    session: &Session,
    reply: ChatReply,
) -> TransitionResult {
    let conversation_effect = match &session.conversation_id {
        None => Effect::EstablishConversation {
            conversation_id: reply.conversation_id,
        },
        Some(established) if *established == reply.conversation_id => {
            Effect::EstablishConversation {
                conversation_id: reply.conversation_id,
            }
        }
        // Keep the established id; report the mismatch
        Some(established) => Effect::ReportInconsistency {
            established: established.clone(),
            received: reply.conversation_id,
        },
    };

    TransitionResult::new(ConvState::Idle {
        completed: exchange.seq,
    })
    .with_effects([
        Effect::append_assistant(reply.reply_text),
        conversation_effect,
        Effect::SetCredits {
            credits: reply.remaining_credits,
        },
        Effect::NotifyExchangeDone {
            seq: exchange.seq,
            outcome: ExchangeOutcome::Replied,
        },
        Effect::notify_state_change(EngineStatus::Idle),
    ])
}

fn resolve_failure(
    exchange: &PendingExchange,
    context: &ConvContext,
    error: &TransportError,
) -> TransitionResult {
    TransitionResult::new(ConvState::Idle {
        completed: exchange.seq,
    })
    .with_effects([
        Effect::append_assistant(context.fallback_reply.clone()),
        Effect::DeductCredits {
            amount: context.failure_credit_cost,
        },
        Effect::NotifyExchangeDone {
            seq: exchange.seq,
            outcome: ExchangeOutcome::FellBack {
                reason: error.to_string(),
            },
        },
        Effect::notify_state_change(EngineStatus::Idle),
    ])
}
