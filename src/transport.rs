//! Transport collaborators
//!
//! The conversation engine talks to the backend only through
//! [`ChatTransport`]; login goes through [`AuthClient`].

mod error;
mod http;
mod local;

pub use error::TransportError;
pub use http::HttpTransport;
pub use local::LocalTransport;

use crate::session::{AuthGrant, ConversationId, GoogleProfile};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Outbound chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

/// Successful chat reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply_text: String,
    pub conversation_id: ConversationId,
    pub remaining_credits: u32,
}

/// Request/response boundary for chat exchanges
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Authentication boundary
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// URL the user would be redirected to for the given anti-forgery state
    async fn authorization_url(&self, state: &str) -> Result<String, TransportError>;

    async fn login(&self, profile: &GoogleProfile) -> Result<AuthGrant, TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        (**self).send(request, token).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: AuthClient + ?Sized> AuthClient for Arc<T> {
    async fn authorization_url(&self, state: &str) -> Result<String, TransportError> {
        (**self).authorization_url(state).await
    }

    async fn login(&self, profile: &GoogleProfile) -> Result<AuthGrant, TransportError> {
        (**self).login(profile).await
    }
}

/// Logging wrapper for chat transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: ChatTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for LoggingTransport<T> {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        let start = Instant::now();
        let result = self.inner.send(request, token).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    transport = %self.inner.name(),
                    conversation_id = %reply.conversation_id,
                    remaining_credits = reply.remaining_credits,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Chat exchange completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    transport = %self.inner.name(),
                    kind = e.kind.as_str(),
                    error = %e,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Chat exchange failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
