//! Mock implementations for testing
//!
//! These mocks enable runtime testing without real I/O.

use super::{ConversationHandle, EngineEvent, EngineSnapshot};
use crate::session::{ConversationId, Session, UserProfile};
use crate::state_machine::ConvContext;
use crate::transport::{ChatReply, ChatRequest, ChatTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Transport
// ============================================================================

/// Mock transport that returns queued results
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<ChatReply, TransportError>>>,
    /// Record of all requests made, with the bearer token presented
    pub requests: Mutex<Vec<(ChatRequest, Option<String>)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply_text: &str, conversation_id: &str, remaining_credits: u32) {
        self.responses.lock().unwrap().push_back(Ok(ChatReply {
            reply_text: reply_text.to_string(),
            conversation_id: ConversationId::new(conversation_id),
            remaining_credits,
        }));
    }

    /// Queue an error
    pub fn queue_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(ChatRequest, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), token.map(str::to_owned)));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock response queued")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Gated Mock Transport (for in-flight testing)
// ============================================================================

/// Mock transport that holds each request until released
pub struct GatedMockTransport {
    inner: MockTransport,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
    /// Notify once to let the pending request complete
    pub release: Arc<Notify>,
}

impl GatedMockTransport {
    pub fn new() -> Self {
        Self {
            inner: MockTransport::new(),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply_text: &str, conversation_id: &str, remaining_credits: u32) {
        self.inner
            .queue_reply(reply_text, conversation_id, remaining_credits);
    }

    pub fn recorded_requests(&self) -> Vec<(ChatRequest, Option<String>)> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl ChatTransport for GatedMockTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.send(request, token).await
    }

    fn name(&self) -> &str {
        "gated-mock"
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

pub fn test_session(credits: u32) -> Session {
    Session::authenticated(
        UserProfile {
            id: Some("user-1".to_string()),
            name: "Tony Stark".to_string(),
            email: "tony@stark.com".to_string(),
            credits,
        },
        "test-token",
    )
}

/// Running conversation plus the transport it talks to
pub struct TestRuntime<T: ChatTransport + 'static> {
    pub handle: ConversationHandle,
    pub events: broadcast::Receiver<EngineEvent>,
    pub transport: Arc<T>,
}

pub struct TestRuntimeBuilder<T> {
    context: ConvContext,
    session: Session,
    transport: T,
}

impl TestRuntime<MockTransport> {
    pub fn new() -> TestRuntimeBuilder<MockTransport> {
        TestRuntimeBuilder::new()
    }
}

impl<T: ChatTransport + Default + 'static> TestRuntimeBuilder<T> {
    pub fn new() -> Self {
        Self {
            context: ConvContext::default(),
            session: test_session(500),
            transport: T::default(),
        }
    }
}

impl<T: ChatTransport + 'static> TestRuntimeBuilder<T> {

    pub fn session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn context(mut self, context: ConvContext) -> Self {
        self.context = context;
        self
    }

    pub fn transport<U: ChatTransport + 'static>(self, transport: U) -> TestRuntimeBuilder<U> {
        TestRuntimeBuilder {
            context: self.context,
            session: self.session,
            transport,
        }
    }

    pub fn build(self) -> TestRuntime<T> {
        let transport = Arc::new(self.transport);
        let handle = ConversationHandle::spawn(self.context, self.session, Arc::clone(&transport));
        let events = handle.subscribe();
        TestRuntime {
            handle,
            events,
            transport,
        }
    }
}

impl Default for GatedMockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ChatTransport + 'static> TestRuntime<T> {
    pub async fn send_message(&self, text: &str) {
        self.handle
            .submit(text)
            .await
            .expect("Failed to send message");
    }

    /// Wait for the runtime to settle with timeout
    pub async fn wait_for_idle(&self, timeout: Duration) -> EngineSnapshot {
        tokio::time::timeout(timeout, self.handle.wait_until_idle())
            .await
            .expect("Timed out waiting for idle")
            .expect("Runtime stopped")
    }

    /// Wait for the first event matching `pred` with timeout
    pub async fn wait_for_event(
        &mut self,
        timeout: Duration,
        pred: impl Fn(&EngineEvent) -> bool,
    ) -> Option<EngineEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(event)) if pred(&event) => return Some(event),
                _ => continue,
            }
        }
        None
    }

    /// Drain events that have already been broadcast
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AccountStore;
    use crate::persona::FALLBACK_REPLY;
    use crate::session::GoogleProfile;
    use crate::state_machine::{EngineStatus, ExchangeOutcome};
    use crate::transcript::Role;
    use crate::transport::{AuthClient, LocalTransport};

    const WAIT: Duration = Duration::from_secs(2);

    fn transcript(snapshot: &EngineSnapshot) -> Vec<(Role, String)> {
        snapshot
            .transcript
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_mock_transport() {
        let mock = MockTransport::new();
        mock.queue_reply("Hello", "c1", 10);

        let request = ChatRequest {
            message: "Hi".to_string(),
            conversation_id: None,
        };
        let reply = mock.send(&request, Some("tok")).await.unwrap();
        assert_eq!(reply.reply_text, "Hello");
        assert_eq!(mock.recorded_requests().len(), 1);

        // Nothing left in the queue
        assert!(mock.send(&request, None).await.is_err());
    }

    /// Successful exchange: both messages, server balance, conversation bound
    #[tokio::test]
    async fn test_successful_exchange() {
        let mock = MockTransport::new();
        mock.queue_reply("Hi sir", "c1", 497);

        let rt = TestRuntime::new().transport(mock).build();
        rt.send_message("Hello").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(
            transcript(&snapshot),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "Hi sir".to_string())
            ]
        );
        assert_eq!(snapshot.credits(), 497);
        assert_eq!(snapshot.conversation_id(), Some(&ConversationId::new("c1")));
        assert_eq!(snapshot.status, EngineStatus::Idle);

        let requests = rt.transport.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0.message, "Hello");
        assert_eq!(requests[0].0.conversation_id, None);
        assert_eq!(requests[0].1.as_deref(), Some("test-token"));
    }

    /// Failed exchange: fallback reply and a local deduction
    #[tokio::test]
    async fn test_failed_exchange_uses_fallback() {
        let mock = MockTransport::new();
        mock.queue_error(TransportError::network("Connection refused"));

        let mut rt = TestRuntime::new().transport(mock).build();
        rt.send_message("Hello").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(
            transcript(&snapshot),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, FALLBACK_REPLY.to_string())
            ]
        );
        assert_eq!(snapshot.credits(), 498);
        assert_eq!(snapshot.conversation_id(), None);

        let events = rt.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::ExchangeDone {
                seq: 1,
                outcome: ExchangeOutcome::FellBack { .. }
            }
        )));
        assert!(events.contains(&EngineEvent::CreditsChanged { credits: 498 }));
    }

    /// A reply body that cannot be decoded is a failed exchange like any other
    #[tokio::test]
    async fn test_decode_error_uses_fallback() {
        let mock = MockTransport::new();
        mock.queue_error(TransportError::decode("expected a string"));

        let rt = TestRuntime::new().transport(mock).build();
        rt.send_message("Hello").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(
            transcript(&snapshot),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, FALLBACK_REPLY.to_string())
            ]
        );
        assert_eq!(snapshot.credits(), 498);
        assert_eq!(snapshot.conversation_id(), None);
    }

    #[tokio::test]
    async fn test_failure_deduction_floors_at_zero() {
        let mock = MockTransport::new();
        mock.queue_error(TransportError::server("boom"));

        let rt = TestRuntime::new()
            .session(test_session(1))
            .transport(mock)
            .build();
        rt.send_message("Hello").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(snapshot.credits(), 0);
    }

    #[tokio::test]
    async fn test_configured_fallback_and_cost() {
        let mock = MockTransport::new();
        mock.queue_error(TransportError::insufficient_credits("Insufficient credits"));

        let rt = TestRuntime::new()
            .context(ConvContext::new("Excuses, meneer", 5))
            .transport(mock)
            .build();
        rt.send_message("Hello").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(
            snapshot.transcript.last().map(|m| m.content.as_str()),
            Some("Excuses, meneer")
        );
        assert_eq!(snapshot.credits(), 495);
    }

    #[tokio::test]
    async fn test_empty_submission_is_ignored() {
        let rt = TestRuntime::new().build();
        rt.send_message("").await;
        rt.send_message("   ").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert!(snapshot.transcript.is_empty());
        assert_eq!(snapshot.status, EngineStatus::Idle);
        assert_eq!(snapshot.submissions_seen, 2);
        assert!(rt.transport.recorded_requests().is_empty());
    }

    /// Submitting while an exchange is in flight is rejected, not queued
    #[tokio::test]
    async fn test_submit_while_busy_rejected() {
        let gated = GatedMockTransport::new();
        gated.queue_reply("At your service", "c1", 497);
        let request_started = gated.request_started.clone();
        let release = gated.release.clone();

        let mut rt = TestRuntime::new().transport(gated).build();
        rt.send_message("First").await;
        tokio::time::timeout(WAIT, request_started.notified())
            .await
            .expect("request never started");

        rt.send_message("Second").await;
        let rejected = rt
            .wait_for_event(WAIT, |e| matches!(e, EngineEvent::Rejected { .. }))
            .await;
        assert!(rejected.is_some());

        let busy = rt.handle.snapshot();
        assert_eq!(busy.status, EngineStatus::Busy);
        assert_eq!(busy.transcript.len(), 1);

        release.notify_one();
        let snapshot = rt.wait_for_idle(WAIT).await;

        assert_eq!(
            transcript(&snapshot),
            vec![
                (Role::User, "First".to_string()),
                (Role::Assistant, "At your service".to_string())
            ]
        );
        assert_eq!(rt.transport.recorded_requests().len(), 1);
    }

    /// Follow-up requests carry the established conversation id
    #[tokio::test]
    async fn test_conversation_id_reused() {
        let mock = MockTransport::new();
        mock.queue_reply("One", "c1", 497);
        mock.queue_reply("Two", "c1", 494);

        let rt = TestRuntime::new().transport(mock).build();
        rt.send_message("First").await;
        rt.wait_for_idle(WAIT).await;
        rt.send_message("Second").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        let requests = rt.transport.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].0.conversation_id, Some(ConversationId::new("c1")));
        assert_eq!(snapshot.transcript.len(), 4);
        assert_eq!(snapshot.credits(), 494);
    }

    /// A different id from the server is reported; the established one stays
    #[tokio::test]
    async fn test_conflicting_conversation_id_reported() {
        let mock = MockTransport::new();
        mock.queue_reply("One", "c1", 497);
        mock.queue_reply("Two", "c2", 494);

        let mut rt = TestRuntime::new().transport(mock).build();
        rt.send_message("First").await;
        rt.wait_for_idle(WAIT).await;
        rt.send_message("Second").await;
        let snapshot = rt.wait_for_idle(WAIT).await;

        let events = rt.drain_events();
        assert!(events.contains(&EngineEvent::ProtocolInconsistency {
            established: ConversationId::new("c1"),
            received: ConversationId::new("c2"),
        }));
        assert_eq!(snapshot.conversation_id(), Some(&ConversationId::new("c1")));
        assert_eq!(snapshot.transcript.len(), 4);
        assert_eq!(snapshot.credits(), 494);
    }

    /// A top-up on the backend shows in the next authoritative balance
    #[tokio::test]
    async fn test_top_up_between_exchanges_raises_credits() {
        let accounts = Arc::new(AccountStore::new());
        let transport = LocalTransport::new(Arc::clone(&accounts));
        let grant = transport
            .login(&GoogleProfile::new("tony@stark.com", "Tony Stark"))
            .await
            .unwrap();
        let user_id = grant.user.id.clone().unwrap();

        let rt = TestRuntime::new()
            .session(Session::authenticated(grant.user, grant.session_token))
            .transport(transport)
            .build();

        rt.send_message("Hello").await;
        let first = rt.wait_for_idle(WAIT).await;
        assert_eq!(first.credits(), 498);

        accounts.upgrade(&user_id, "pro").await.unwrap();

        rt.send_message("Dank je").await;
        let second = rt.wait_for_idle(WAIT).await;
        assert_eq!(second.credits(), 2496);
        assert_eq!(second.transcript.len(), 4);
        assert_eq!(second.conversation_id(), first.conversation_id());
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let mock = MockTransport::new();
        mock.queue_reply("Hi sir", "c1", 497);

        let mut rt = TestRuntime::new().transport(mock).build();
        rt.send_message("Hello").await;
        rt.wait_for_idle(WAIT).await;

        let kinds: Vec<&str> = rt
            .drain_events()
            .iter()
            .map(|e| match e {
                EngineEvent::Message { .. } => "message",
                EngineEvent::StateChange { .. } => "state",
                EngineEvent::CreditsChanged { .. } => "credits",
                EngineEvent::ConversationEstablished { .. } => "conversation",
                EngineEvent::ProtocolInconsistency { .. } => "inconsistency",
                EngineEvent::ExchangeDone { .. } => "done",
                EngineEvent::Rejected { .. } => "rejected",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["message", "state", "message", "conversation", "credits", "done", "state"]
        );
    }
}
