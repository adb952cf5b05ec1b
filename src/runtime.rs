//! Runtime for executing a conversation
//!
//! One task per conversation owns the state, the session store and the
//! transcript. Callers talk to it through a [`ConversationHandle`]:
//! submissions go in over an mpsc channel, observers receive
//! [`EngineEvent`]s over a broadcast channel and can read the latest
//! [`EngineSnapshot`] at any time.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;

use crate::session::{ConversationId, Session};
use crate::state_machine::{ConvContext, EngineStatus, Event, ExchangeOutcome};
use crate::transcript::Message;
use crate::transport::ChatTransport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

/// Events sent to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Message { message: Message },
    StateChange { status: EngineStatus },
    CreditsChanged { credits: u32 },
    ConversationEstablished { conversation_id: ConversationId },
    /// The server answered for a conversation other than the established one
    ProtocolInconsistency {
        established: ConversationId,
        received: ConversationId,
    },
    ExchangeDone { seq: u64, outcome: ExchangeOutcome },
    /// A submission was refused (an exchange is already in flight)
    Rejected { reason: String },
}

/// Point-in-time view of the conversation
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub status: EngineStatus,
    pub transcript: Vec<Message>,
    pub session: Session,
    /// Submissions the runtime has processed, accepted or not
    pub submissions_seen: u64,
}

impl EngineSnapshot {
    pub fn credits(&self) -> u32 {
        self.session.credits()
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.session.conversation_id.as_ref()
    }
}

/// The runtime task is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conversation runtime has stopped")]
pub struct EngineClosed;

/// Handle to interact with a running conversation
pub struct ConversationHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<EngineEvent>,
    snapshot_rx: watch::Receiver<EngineSnapshot>,
    submissions_sent: Arc<AtomicU64>,
}

impl ConversationHandle {
    /// Start a runtime for `session` on the current tokio runtime
    pub fn spawn<T>(context: ConvContext, session: Session, transport: T) -> Self
    where
        T: ChatTransport + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot {
            session: session.clone(),
            ..EngineSnapshot::default()
        });

        let runtime = ConversationRuntime::new(
            context,
            session,
            transport,
            event_rx,
            event_tx.downgrade(),
            broadcast_tx.clone(),
            snapshot_tx,
        );
        tokio::spawn(runtime.run());

        Self {
            event_tx,
            broadcast_tx,
            snapshot_rx,
            submissions_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a user submission. Acceptance is reported through events.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), EngineClosed> {
        self.event_tx
            .send(Event::submit(text))
            .await
            .map_err(|_| EngineClosed)?;
        self.submissions_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Wait until every submission sent so far has been processed and no
    /// exchange is in flight
    pub async fn wait_until_idle(&self) -> Result<EngineSnapshot, EngineClosed> {
        let sent = self.submissions_sent.load(Ordering::SeqCst);
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| s.submissions_seen >= sent && s.status == EngineStatus::Idle)
            .await
            .map_err(|_| EngineClosed)?;
        Ok(snapshot.clone())
    }
}
