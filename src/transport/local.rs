//! In-process transport
//!
//! Loops requests straight into an [`AccountStore`], so the client can run
//! without a server. The randomized reply delay is cosmetic: it only makes
//! the assistant look like it is thinking.

use super::{AuthClient, ChatReply, ChatRequest, ChatTransport, TransportError};
use crate::api::{AccountError, AccountStore};
use crate::session::{AuthGrant, ConversationId, GoogleProfile};
use async_trait::async_trait;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

pub struct LocalTransport {
    accounts: Arc<AccountStore>,
    /// Reply delay bounds in milliseconds
    delay_ms: RangeInclusive<u64>,
}

impl LocalTransport {
    pub fn new(accounts: Arc<AccountStore>) -> Self {
        Self {
            accounts,
            delay_ms: 0..=0,
        }
    }

    pub fn with_delay(mut self, delay_ms: RangeInclusive<u64>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    async fn think(&self) {
        let (min, max) = (*self.delay_ms.start(), *self.delay_ms.end());
        if max == 0 || min > max {
            return;
        }
        let millis = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

fn map_account_error(e: AccountError) -> TransportError {
    let message = e.to_string();
    match e {
        AccountError::Unauthorized | AccountError::TokenExpired => {
            TransportError::unauthorized(message)
        }
        AccountError::InsufficientCredits => TransportError::insufficient_credits(message),
        AccountError::ConversationNotFound => TransportError::not_found(message),
        AccountError::MissingFields
        | AccountError::EmptyMessage
        | AccountError::TextTooShort
        | AccountError::InvalidPackage => TransportError::invalid_request(message),
    }
}

#[async_trait]
impl ChatTransport for LocalTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        let token = token.ok_or_else(|| TransportError::unauthorized("No session token"))?;
        let user = self
            .accounts
            .authenticate(token)
            .await
            .map_err(map_account_error)?;

        self.think().await;

        let outcome = self
            .accounts
            .chat(
                &user.id,
                &request.message,
                request.conversation_id.as_ref().map(ConversationId::as_str),
            )
            .await
            .map_err(map_account_error)?;

        Ok(ChatReply {
            reply_text: outcome.response,
            conversation_id: ConversationId::new(outcome.conversation_id),
            remaining_credits: outcome.remaining_credits,
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[async_trait]
impl AuthClient for LocalTransport {
    async fn authorization_url(&self, state: &str) -> Result<String, TransportError> {
        Ok(format!("local://login?state={state}"))
    }

    async fn login(&self, profile: &GoogleProfile) -> Result<AuthGrant, TransportError> {
        let outcome = self
            .accounts
            .login(profile)
            .await
            .map_err(map_account_error)?;
        Ok(AuthGrant {
            user: outcome.user.to_json().into(),
            session_token: outcome.token,
            is_new_user: outcome.is_new_user,
        })
    }
}
