//! Session store

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Credits granted to the demo fallback profile
pub const DEMO_CREDITS: u32 = 500;

/// Server-assigned conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub credits: u32,
}

/// Client session: authentication status, identity, active conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<UserProfile>,
    pub conversation_id: Option<ConversationId>,
    /// Bearer credential for the transport; never shown to observers
    #[serde(skip)]
    token: Option<String>,
}

impl Session {
    pub fn authenticated(user: UserProfile, token: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
            conversation_id: None,
            token: Some(token.into()),
        }
    }

    /// Offline demo profile used when the login endpoint is unreachable
    pub fn demo() -> Self {
        Self {
            authenticated: true,
            user: Some(UserProfile {
                id: Some("demo_user".to_string()),
                name: "Demo User".to_string(),
                email: "user@example.com".to_string(),
                credits: DEMO_CREDITS,
            }),
            conversation_id: None,
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn credits(&self) -> u32 {
        self.user.as_ref().map_or(0, |u| u.credits)
    }
}

/// A server reported a conversation id that differs from the established one
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server returned conversation {received}, but session is bound to {established}")]
pub struct ProtocolInconsistency {
    pub established: ConversationId,
    pub received: ConversationId,
}

/// Owner of the session; the only place credits and the conversation id change
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    session: Session,
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn current_session(&self) -> &Session {
        &self.session
    }

    pub fn credits(&self) -> u32 {
        self.session.credits()
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.session.conversation_id.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    /// Overwrite the balance with an authoritative value. Returns the new balance.
    pub fn set_credits(&mut self, credits: u32) -> u32 {
        match self.session.user.as_mut() {
            Some(user) => {
                user.credits = credits;
                credits
            }
            None => {
                tracing::warn!(credits, "Ignoring credit update for anonymous session");
                0
            }
        }
    }

    /// Deduct locally, floored at zero. Returns the new balance.
    pub fn deduct_credits(&mut self, amount: u32) -> u32 {
        match self.session.user.as_mut() {
            Some(user) => {
                user.credits = user.credits.saturating_sub(amount);
                user.credits
            }
            None => 0,
        }
    }

    /// Bind the session to a conversation. The first id wins; returns
    /// `Ok(true)` when this call established it.
    pub fn establish_conversation(
        &mut self,
        id: ConversationId,
    ) -> Result<bool, ProtocolInconsistency> {
        match &self.session.conversation_id {
            None => {
                self.session.conversation_id = Some(id);
                Ok(true)
            }
            Some(existing) if *existing == id => Ok(false),
            Some(existing) => Err(ProtocolInconsistency {
                established: existing.clone(),
                received: id,
            }),
        }
    }
}
