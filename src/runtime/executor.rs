//! Conversation runtime executor

use super::{EngineEvent, EngineSnapshot};
use crate::session::{ConversationId, Session, SessionStore};
use crate::state_machine::{
    transition, ConvContext, ConvState, Effect, Event, ExchangeOutcome, PendingExchange,
    TransitionError,
};
use crate::transcript::Transcript;
use crate::transport::{ChatRequest, ChatTransport};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Conversation runtime generic over the chat transport
pub struct ConversationRuntime<T>
where
    T: ChatTransport + 'static,
{
    context: ConvContext,
    state: ConvState,
    store: SessionStore,
    transcript: Transcript,
    transport: Arc<T>,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the loop ends once every handle is dropped
    event_tx: mpsc::WeakSender<Event>,
    broadcast_tx: broadcast::Sender<EngineEvent>,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    submissions_seen: u64,
}

impl<T> ConversationRuntime<T>
where
    T: ChatTransport + 'static,
{
    pub fn new(
        context: ConvContext,
        session: Session,
        transport: T,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
        broadcast_tx: broadcast::Sender<EngineEvent>,
        snapshot_tx: watch::Sender<EngineSnapshot>,
    ) -> Self {
        Self {
            context,
            state: ConvState::default(),
            store: SessionStore::new(session),
            transcript: Transcript::new(),
            transport: Arc::new(transport),
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            submissions_seen: 0,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(transport = %self.transport.name(), "Starting conversation runtime");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!(
            messages = self.transcript.messages().len(),
            credits = self.store.credits(),
            conversation_id = ?self.store.conversation_id(),
            "Conversation runtime stopped"
        );
    }

    fn process_event(&mut self, event: Event) {
        let is_submit = matches!(event, Event::UserSubmit { .. });
        let kind = event.kind();

        match transition(
            &self.state,
            &self.context,
            self.store.current_session(),
            event,
        ) {
            Ok(result) => {
                self.state = result.new_state;
                for effect in result.effects {
                    self.execute_effect(effect);
                }
            }
            Err(TransitionError::EmptyInput) => {
                tracing::debug!("Ignoring empty submission");
            }
            Err(e @ TransitionError::AgentBusy) => {
                tracing::info!(error = %e, "Submission rejected");
                let _ = self.broadcast_tx.send(EngineEvent::Rejected {
                    reason: e.to_string(),
                });
            }
            Err(e @ TransitionError::StaleResponse { .. }) => {
                tracing::warn!(event = kind, error = %e, "Discarding stale response");
            }
        }

        if is_submit {
            self.submissions_seen += 1;
        }
        self.publish_snapshot();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage { role, content } => {
                let message = self.transcript.append(role, content);
                let _ = self.broadcast_tx.send(EngineEvent::Message { message });
            }

            Effect::Dispatch { exchange } => self.dispatch(exchange),

            Effect::EstablishConversation { conversation_id } => {
                match self.store.establish_conversation(conversation_id.clone()) {
                    Ok(true) => {
                        tracing::info!(
                            conversation_id = %conversation_id,
                            "Conversation established"
                        );
                        let _ = self
                            .broadcast_tx
                            .send(EngineEvent::ConversationEstablished { conversation_id });
                    }
                    Ok(false) => {}
                    Err(e) => self.report_inconsistency(e.established, e.received),
                }
            }

            Effect::ReportInconsistency {
                established,
                received,
            } => self.report_inconsistency(established, received),

            Effect::SetCredits { credits } => {
                let credits = self.store.set_credits(credits);
                let _ = self.broadcast_tx.send(EngineEvent::CreditsChanged { credits });
            }

            Effect::DeductCredits { amount } => {
                let credits = self.store.deduct_credits(amount);
                tracing::debug!(amount, credits, "Deducted credits locally");
                let _ = self.broadcast_tx.send(EngineEvent::CreditsChanged { credits });
            }

            Effect::NotifyStateChange { status } => {
                let _ = self.broadcast_tx.send(EngineEvent::StateChange { status });
            }

            Effect::NotifyExchangeDone { seq, outcome } => {
                if let ExchangeOutcome::FellBack { reason } = &outcome {
                    tracing::warn!(seq, reason = %reason, "Exchange failed, used fallback reply");
                }
                let _ = self.broadcast_tx.send(EngineEvent::ExchangeDone { seq, outcome });
            }
        }
    }

    /// Send the exchange as a background task; the result comes back as an event
    fn dispatch(&self, exchange: PendingExchange) {
        let Some(event_tx) = self.event_tx.upgrade() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let token = self.store.token().map(str::to_owned);
        let seq = exchange.seq;
        let request = ChatRequest {
            message: exchange.message,
            conversation_id: exchange.conversation_id,
        };

        tokio::spawn(async move {
            tracing::debug!(seq, transport = %transport.name(), "Sending exchange (background)");
            let event = match transport.send(&request, token.as_deref()).await {
                Ok(reply) => Event::ExchangeSucceeded { seq, reply },
                Err(error) => Event::ExchangeFailed { seq, error },
            };
            let _ = event_tx.send(event).await;
        });
    }

    fn report_inconsistency(&self, established: ConversationId, received: ConversationId) {
        tracing::warn!(
            established = %established,
            received = %received,
            "Server returned a different conversation id, keeping the established one"
        );
        let _ = self.broadcast_tx.send(EngineEvent::ProtocolInconsistency {
            established,
            received,
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(EngineSnapshot {
            status: self.state.status(),
            transcript: self.transcript.messages().to_vec(),
            session: self.store.current_session().clone(),
            submissions_seen: self.submissions_seen,
        });
    }
}
