//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::session::{ConversationId, Session, SessionStore, UserProfile};
use crate::transcript::{Role, Transcript};
use crate::transport::{ChatReply, TransportError};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn session_with(credits: u32, conversation: Option<&str>) -> Session {
    let mut session = Session::authenticated(
        UserProfile {
            id: None,
            name: "Tony".to_string(),
            email: "tony@example.com".to_string(),
            credits,
        },
        "tok",
    );
    session.conversation_id = conversation.map(ConversationId::new);
    session
}

/// Minimal effect interpreter: applies transcript/session effects in place
struct Harness {
    state: ConvState,
    context: ConvContext,
    store: SessionStore,
    transcript: Transcript,
    dispatched: Vec<PendingExchange>,
}

impl Harness {
    fn new(credits: u32, failure_cost: u32) -> Self {
        Self {
            state: ConvState::default(),
            context: ConvContext::new("fallback", failure_cost),
            store: SessionStore::new(session_with(credits, None)),
            transcript: Transcript::new(),
            dispatched: Vec::new(),
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(
            &self.state,
            &self.context,
            self.store.current_session(),
            event,
        )?;
        self.state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage { role, content } => {
                    self.transcript.append(role, content);
                }
                Effect::Dispatch { exchange } => self.dispatched.push(exchange),
                Effect::EstablishConversation { conversation_id } => {
                    let _ = self.store.establish_conversation(conversation_id);
                }
                Effect::SetCredits { credits } => {
                    self.store.set_credits(credits);
                }
                Effect::DeductCredits { amount } => {
                    self.store.deduct_credits(amount);
                }
                Effect::ReportInconsistency { .. }
                | Effect::NotifyStateChange { .. }
                | Effect::NotifyExchangeDone { .. } => {}
            }
        }
        Ok(())
    }

    fn last_role(&self) -> Option<Role> {
        self.transcript.messages().last().map(|m| m.role)
    }

    fn in_flight_seq(&self) -> Option<u64> {
        match &self.state {
            ConvState::Busy { exchange } => Some(exchange.seq),
            ConvState::Idle { .. } => None,
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-zA-Z ]{1,30}",
        1 => "[ \t\n]{0,5}",
    ]
}

fn arb_reply() -> impl Strategy<Value = ChatReply> {
    ("[a-zA-Z ]{1,30}", prop_oneof![Just("c1"), Just("c2")], 0u32..1000).prop_map(
        |(reply_text, conversation, remaining_credits)| ChatReply {
            reply_text,
            conversation_id: ConversationId::new(conversation),
            remaining_credits,
        },
    )
}

/// Driver actions: a submission, or a resolution of whatever is in flight
#[derive(Debug, Clone)]
enum Action {
    Submit(String),
    Succeed(ChatReply),
    Fail,
    /// Resolution tagged with a sequence number that is not in flight
    Stale(ChatReply),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_text().prop_map(Action::Submit),
        2 => arb_reply().prop_map(Action::Succeed),
        2 => Just(Action::Fail),
        1 => arb_reply().prop_map(Action::Stale),
    ]
}

fn arb_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        (0u64..100).prop_map(|completed| ConvState::Idle { completed }),
        (1u64..100, "[a-z]{1,10}").prop_map(|(seq, message)| ConvState::Busy {
            exchange: PendingExchange {
                seq,
                message,
                conversation_id: None,
            }
        }),
    ]
}

fn resolve(harness: &mut Harness, action: Action) -> Result<(), TransitionError> {
    let seq = harness.in_flight_seq();
    match action {
        Action::Submit(text) => harness.apply(Event::submit(text)),
        Action::Succeed(reply) => harness.apply(Event::ExchangeSucceeded {
            seq: seq.unwrap_or(0),
            reply,
        }),
        Action::Fail => harness.apply(Event::ExchangeFailed {
            seq: seq.unwrap_or(0),
            error: TransportError::network("down"),
        }),
        Action::Stale(reply) => harness.apply(Event::ExchangeSucceeded {
            seq: seq.map_or(u64::MAX, |s| s + 1000),
            reply,
        }),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Errors never change state
    #[test]
    fn prop_errors_are_noops(state in arb_state(), action in arb_action()) {
        let mut harness = Harness::new(100, 2);
        harness.state = state.clone();
        let before_len = harness.transcript.messages().len();
        let before_credits = harness.store.credits();

        if resolve(&mut harness, action).is_err() {
            prop_assert_eq!(&harness.state, &state);
            prop_assert_eq!(harness.transcript.messages().len(), before_len);
            prop_assert_eq!(harness.store.credits(), before_credits);
        }
    }

    /// Submissions while busy are never dispatched
    #[test]
    fn prop_single_flight(texts in proptest::collection::vec("[a-z]{1,10}", 1..10)) {
        let mut harness = Harness::new(100, 2);
        let mut iter = texts.into_iter();
        let first = iter.next().unwrap();
        harness.apply(Event::submit(first)).unwrap();

        for text in iter {
            prop_assert_eq!(
                harness.apply(Event::submit(text)),
                Err(TransitionError::AgentBusy)
            );
        }
        prop_assert_eq!(harness.dispatched.len(), 1);
        prop_assert_eq!(harness.transcript.messages().len(), 1);
    }

    /// Transcript grows by one on dispatch and one on resolution; credits
    /// follow the server on success and the floored deduction on failure;
    /// the first conversation id sticks.
    #[test]
    fn prop_exchange_invariants(
        credits in 0u32..50,
        cost in 0u32..5,
        actions in proptest::collection::vec(arb_action(), 1..40),
    ) {
        let mut harness = Harness::new(credits, cost);
        let mut first_conversation: Option<ConversationId> = None;

        for action in actions {
            let was_busy = harness.state.is_busy();
            let len_before = harness.transcript.messages().len();
            let credits_before = harness.store.credits();
            let expected_success_credits = match &action {
                Action::Succeed(reply) => Some(reply.remaining_credits),
                _ => None,
            };
            let is_failure = matches!(action, Action::Fail);

            if resolve(&mut harness, action).is_err() {
                continue;
            }

            if was_busy {
                // Resolution appended exactly one assistant message
                prop_assert_eq!(harness.transcript.messages().len(), len_before + 1);
                prop_assert_eq!(harness.last_role(), Some(Role::Assistant));
                prop_assert!(!harness.state.is_busy());
                if let Some(expected) = expected_success_credits {
                    prop_assert_eq!(harness.store.credits(), expected);
                }
                if is_failure {
                    prop_assert_eq!(harness.store.credits(), credits_before.saturating_sub(cost));
                }
            } else {
                // Dispatch appended exactly one user message
                prop_assert_eq!(harness.transcript.messages().len(), len_before + 1);
                prop_assert_eq!(harness.last_role(), Some(Role::User));
                prop_assert!(harness.state.is_busy());
            }

            match (&first_conversation, harness.store.conversation_id()) {
                (None, Some(id)) => first_conversation = Some(id.clone()),
                (Some(first), current) => prop_assert_eq!(Some(first), current),
                (None, None) => {}
            }
        }

        // Completed exchanges contribute two messages; a pending one contributes one
        let completed = match &harness.state {
            ConvState::Idle { completed } => *completed,
            ConvState::Busy { exchange } => exchange.seq - 1,
        };
        let pending = u64::from(harness.state.is_busy());
        prop_assert_eq!(harness.transcript.messages().len() as u64, 2 * completed + pending);
    }

    /// Sequence numbers are dense and increasing
    #[test]
    fn prop_sequence_numbers_increase(actions in proptest::collection::vec(arb_action(), 1..40)) {
        let mut harness = Harness::new(100, 2);
        for action in actions {
            let _ = resolve(&mut harness, action);
        }
        let seqs: Vec<u64> = harness.dispatched.iter().map(|e| e.seq).collect();
        let expected: Vec<u64> = (1..=seqs.len() as u64).collect();
        prop_assert_eq!(seqs, expected);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_success() {
    let mut harness = Harness::new(500, 2);
    harness.apply(Event::submit("Hello")).unwrap();
    harness
        .apply(Event::ExchangeSucceeded {
            seq: 1,
            reply: ChatReply {
                reply_text: "Hi sir".to_string(),
                conversation_id: ConversationId::new("c1"),
                remaining_credits: 497,
            },
        })
        .unwrap();

    let transcript: Vec<_> = harness
        .transcript
        .messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![(Role::User, "Hello"), (Role::Assistant, "Hi sir")]
    );
    assert_eq!(harness.store.credits(), 497);
    assert_eq!(
        harness.store.conversation_id(),
        Some(&ConversationId::new("c1"))
    );
}

#[test]
fn scenario_failure() {
    let mut harness = Harness::new(500, 2);
    harness.apply(Event::submit("Hello")).unwrap();
    harness
        .apply(Event::ExchangeFailed {
            seq: 1,
            error: TransportError::network("Connection refused"),
        })
        .unwrap();

    assert_eq!(harness.transcript.messages().len(), 2);
    assert_eq!(
        harness.transcript.messages().last().map(|m| m.content.as_str()),
        Some("fallback")
    );
    assert_eq!(harness.store.credits(), 498);
    assert_eq!(harness.store.conversation_id(), None);
}

#[test]
fn scenario_empty_submit() {
    let mut harness = Harness::new(500, 2);
    assert_eq!(
        harness.apply(Event::submit("")),
        Err(TransitionError::EmptyInput)
    );
    assert!(harness.transcript.messages().is_empty());
    assert_eq!(harness.state, ConvState::Idle { completed: 0 });
}
