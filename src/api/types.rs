//! API request and response types
//!
//! Shared by the server handlers and the HTTP transport.

use crate::session::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Response for a chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub credits_used: u32,
    pub remaining_credits: u32,
    pub message_id: String,
}

/// Query for the login entry point
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub state: Option<String>,
}

/// Response for the login entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInfoResponse {
    pub message: String,
    pub redirect_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// User as exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJson {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub google_id: String,
    pub credits: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<UserJson> for UserProfile {
    fn from(user: UserJson) -> Self {
        UserProfile {
            id: Some(user.id),
            name: user.name,
            email: user.email,
            credits: user.credits,
        }
    }
}

/// Response for a successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserJson,
    pub token: String,
    pub session_id: String,
    pub is_new_user: bool,
    pub expires_in: u64,
}

/// Response for the auth status check
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserJson,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: u32,
    pub usage_today: u32,
    pub usage_this_month: u32,
}

/// Conversation summary
#[derive(Debug, Clone, Serialize)]
pub struct ConversationJson {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub initial_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    pub conversation: ConversationJson,
    pub message: Option<MessageJson>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationJson>,
    pub total: usize,
}

/// Stored message as exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct MessageJson {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub sender: String,
    pub credits_used: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageJson>,
    pub total: usize,
}

fn default_package() -> String {
    "pro".to_string()
}

/// Request to top up credits with a package
#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    #[serde(default = "default_package")]
    pub package: String,
}

#[derive(Debug, Serialize)]
pub struct UpgradeResponse {
    pub message: String,
    pub credits: u32,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
    pub user_id: String,
}

fn default_compose_kind() -> String {
    "email".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SmartComposeRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(rename = "type", default = "default_compose_kind")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct SmartComposeResponse {
    pub composed_text: String,
    pub credits_used: u32,
    pub remaining_credits: u32,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub original_length: usize,
    pub summary_length: usize,
    pub credits_used: u32,
    pub remaining_credits: u32,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_service: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: serde_json::Value,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
