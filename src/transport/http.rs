//! HTTP transport against the Jarvis backend

use super::{AuthClient, ChatReply, ChatRequest, ChatTransport, TransportError};
use crate::api::types::{AuthResponse, ChatBody, ChatResponse, ErrorResponse, LoginInfoResponse};
use crate::session::{AuthGrant, ConversationId, GoogleProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn classify_send_error(e: &reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            TransportError::network(format!("Connection failed: {e}"))
        } else {
            TransportError::unknown(format!("Request failed: {e}"))
        }
    }

    /// Read the body, map non-success statuses, decode JSON
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(TransportError::from_status(status.as_u16(), &message));
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::decode(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<ChatReply, TransportError> {
        let body = ChatBody {
            message: request.message.clone(),
            conversation_id: request
                .conversation_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
        };

        let mut builder = self.client.post(self.url("/api/ai/chat")).json(&body);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;
        let chat: ChatResponse = Self::decode(response).await?;

        Ok(ChatReply {
            reply_text: chat.response,
            conversation_id: ConversationId::new(chat.conversation_id),
            remaining_credits: chat.remaining_credits,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl AuthClient for HttpTransport {
    async fn authorization_url(&self, state: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(self.url("/api/auth/login"))
            .query(&[("state", state)])
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;
        let info: LoginInfoResponse = Self::decode(response).await?;
        Ok(info.redirect_url)
    }

    async fn login(&self, profile: &GoogleProfile) -> Result<AuthGrant, TransportError> {
        let response = self
            .client
            .post(self.url("/api/auth/google"))
            .json(profile)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;
        let auth: AuthResponse = Self::decode(response).await?;

        Ok(AuthGrant {
            user: auth.user.into(),
            session_token: auth.token,
            is_new_user: auth.is_new_user,
        })
    }
}
