//! Two-step login protocol
//!
//! `begin_login` stands in for the redirect to the identity provider and
//! returns the pending state; `complete_login` verifies the callback
//! against it before asking the auth collaborator for a session.

use super::store::{Session, UserProfile};
use crate::transport::{AuthClient, TransportError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a started login stays valid
pub const DEFAULT_LOGIN_TTL_MINUTES: i64 = 10;

/// Identity returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
}

impl GoogleProfile {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            name: Some(name.into()),
            google_id: None,
        }
    }
}

/// A login that has been started but not completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuth {
    /// Anti-forgery nonce echoed back by the callback
    pub state: String,
    pub authorization_url: String,
    pub expires_at: DateTime<Utc>,
}

/// What the provider redirect hands back
#[derive(Debug, Clone)]
pub struct OAuthCallback {
    pub state: String,
    pub profile: GoogleProfile,
}

/// Successful authentication from the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: UserProfile,
    pub session_token: String,
    pub is_new_user: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login callback state does not match the pending login")]
    StateMismatch,
    #[error("pending login expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("auth request failed: {0}")]
    Transport(#[from] TransportError),
}

/// Drives the login protocol against an auth collaborator
pub struct LoginFlow<A: AuthClient> {
    client: A,
    ttl: Duration,
}

impl<A: AuthClient> LoginFlow<A> {
    pub fn new(client: A) -> Self {
        Self {
            client,
            ttl: Duration::minutes(DEFAULT_LOGIN_TTL_MINUTES),
        }
    }

    #[cfg(test)]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn begin_login(&self) -> Result<PendingAuth, AuthError> {
        let state = uuid::Uuid::new_v4().to_string();
        let authorization_url = self.client.authorization_url(&state).await?;
        tracing::debug!(state = %state, url = %authorization_url, "Login started");
        Ok(PendingAuth {
            state,
            authorization_url,
            expires_at: Utc::now() + self.ttl,
        })
    }

    pub async fn complete_login(
        &self,
        pending: PendingAuth,
        callback: OAuthCallback,
    ) -> Result<Session, AuthError> {
        if callback.state != pending.state {
            tracing::warn!("Rejecting login callback with mismatched state");
            return Err(AuthError::StateMismatch);
        }
        if Utc::now() > pending.expires_at {
            return Err(AuthError::Expired(pending.expires_at));
        }

        let grant = self.client.login(&callback.profile).await?;
        tracing::info!(
            email = %grant.user.email,
            credits = grant.user.credits,
            new_user = grant.is_new_user,
            "Login completed"
        );
        Ok(Session::authenticated(grant.user, grant.session_token))
    }
}
