//! In-memory account ledger
//!
//! Users, bearer tokens, conversations and their messages. Credits are
//! spent here; clients only ever see the resulting balance.

use super::types::{ConversationJson, MessageJson, UserJson};
use crate::persona;
use crate::session::GoogleProfile;
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub const STARTING_CREDITS: u32 = 500;
pub const CHAT_CREDIT_COST: u32 = 2;
pub const COMPOSE_CREDIT_COST: u32 = 3;
pub const SUMMARIZE_CREDIT_COST: u32 = 2;
pub const MIN_SUMMARY_SOURCE_CHARS: usize = 50;
pub const TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Credit packages a user can top up with
pub const UPGRADE_PACKAGES: [(&str, u32); 3] =
    [("pro", 2000), ("business", 5000), ("enterprise", 999_999)];

const TITLE_CHARS: usize = 50;
const SUMMARY_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing required fields")]
    MissingFields,
    #[error("Message is required")]
    EmptyMessage,
    #[error("Text too short to summarize")]
    TextTooShort,
    #[error("Insufficient credits")]
    InsufficientCredits,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Invalid package")]
    InvalidPackage,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub google_id: String,
    pub credits: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl UserRecord {
    /// Spend credits if the balance covers them
    fn use_credits(&mut self, amount: u32) -> bool {
        match self.credits.checked_sub(amount) {
            Some(rest) => {
                self.credits = rest;
                true
            }
            None => false,
        }
    }

    pub fn to_json(&self) -> UserJson {
        UserJson {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            google_id: self.google_id.clone(),
            credits: self.credits,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ConversationRecord {
    id: String,
    user_id: String,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<MessageJson>,
}

impl ConversationRecord {
    fn to_json(&self) -> ConversationJson {
        ConversationJson {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub token: String,
    pub is_new_user: bool,
    pub expires_in: u64,
}

/// Result of a successful chat exchange
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub conversation_id: String,
    pub credits_used: u32,
    pub remaining_credits: u32,
    pub message_id: String,
}

/// Credits spent today and in the current calendar month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub today: u32,
    pub this_month: u32,
}

#[derive(Debug, Clone)]
struct SpendRecord {
    user_id: String,
    amount: u32,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Ledger {
    users: HashMap<String, UserRecord>,
    user_by_email: HashMap<String, String>,
    tokens: HashMap<String, TokenRecord>,
    conversations: HashMap<String, ConversationRecord>,
    spending: Vec<SpendRecord>,
}

impl Ledger {
    fn user_mut(&mut self, user_id: &str) -> Result<&mut UserRecord, AccountError> {
        self.users.get_mut(user_id).ok_or(AccountError::Unauthorized)
    }

    /// Spend `amount` and record it. Returns the remaining balance.
    fn charge(
        &mut self,
        user_id: &str,
        amount: u32,
        at: DateTime<Utc>,
    ) -> Result<u32, AccountError> {
        let user = self.user_mut(user_id)?;
        if !user.use_credits(amount) {
            return Err(AccountError::InsufficientCredits);
        }
        let remaining = user.credits;
        self.spending.push(SpendRecord {
            user_id: user_id.to_string(),
            amount,
            at,
        });
        Ok(remaining)
    }
}

/// Shared account store
#[derive(Debug, Default)]
pub struct AccountStore {
    ledger: RwLock<Ledger>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the user and issue a bearer token
    pub async fn login(&self, profile: &GoogleProfile) -> Result<LoginOutcome, AccountError> {
        let email = profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(AccountError::MissingFields)?;
        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(AccountError::MissingFields)?;

        let now = Utc::now();
        let mut ledger = self.ledger.write().await;

        let existing = ledger.user_by_email.get(email).cloned();
        let is_new_user = existing.is_none();
        let user_id = if let Some(id) = existing {
            let user = ledger.user_mut(&id)?;
            user.last_login = now;
            if let Some(google_id) = &profile.google_id {
                user.google_id.clone_from(google_id);
            }
            id
        } else {
            let id = uuid::Uuid::new_v4().to_string();
            let user = UserRecord {
                id: id.clone(),
                email: email.to_string(),
                name: name.to_string(),
                google_id: profile.google_id.clone().unwrap_or_else(|| email.to_string()),
                credits: STARTING_CREDITS,
                is_active: true,
                created_at: now,
                last_login: now,
            };
            ledger.user_by_email.insert(email.to_string(), id.clone());
            ledger.users.insert(id.clone(), user);
            id
        };

        let token = uuid::Uuid::new_v4().to_string();
        ledger.tokens.insert(
            token.clone(),
            TokenRecord {
                user_id: user_id.clone(),
                expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
            },
        );

        let user = ledger.user_mut(&user_id)?.clone();
        tracing::info!(user_id = %user.id, is_new_user, "User authenticated");

        Ok(LoginOutcome {
            user,
            token,
            is_new_user,
            expires_in: u64::try_from(TOKEN_TTL_HOURS * 3600).unwrap_or(0),
        })
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AccountError> {
        let ledger = self.ledger.read().await;
        let record = ledger.tokens.get(token).ok_or(AccountError::Unauthorized)?;
        if Utc::now() > record.expires_at {
            return Err(AccountError::TokenExpired);
        }
        ledger
            .users
            .get(&record.user_id)
            .cloned()
            .ok_or(AccountError::Unauthorized)
    }

    /// Run one chat exchange for `user_id`
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatOutcome, AccountError> {
        if message.is_empty() {
            return Err(AccountError::EmptyMessage);
        }
        let response = persona::reply(message, persona::DEFAULT_ADDRESS, &mut rand::thread_rng());

        let now = Utc::now();
        let mut ledger = self.ledger.write().await;

        if let Some(id) = conversation_id {
            let owned = ledger
                .conversations
                .get(id)
                .is_some_and(|c| c.user_id == user_id);
            if !owned {
                return Err(AccountError::ConversationNotFound);
            }
        }

        let remaining_credits = ledger.charge(user_id, CHAT_CREDIT_COST, now)?;

        let conversation_id = match conversation_id {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                ledger.conversations.insert(
                    id.clone(),
                    ConversationRecord {
                        id: id.clone(),
                        user_id: user_id.to_string(),
                        title: conversation_title(message),
                        created_at: now,
                        updated_at: now,
                        messages: Vec::new(),
                    },
                );
                id
            }
        };

        let conversation = ledger
            .conversations
            .get_mut(&conversation_id)
            .ok_or(AccountError::ConversationNotFound)?;
        conversation.updated_at = now;
        conversation.messages.push(MessageJson {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            content: message.to_string(),
            sender: "user".to_string(),
            credits_used: 0,
            timestamp: now,
        });
        let message_id = uuid::Uuid::new_v4().to_string();
        conversation.messages.push(MessageJson {
            id: message_id.clone(),
            conversation_id: conversation_id.clone(),
            content: response.clone(),
            sender: "jarvis".to_string(),
            credits_used: CHAT_CREDIT_COST,
            timestamp: now,
        });

        tracing::debug!(
            user_id,
            conversation_id = %conversation_id,
            remaining_credits,
            "Chat exchange recorded"
        );

        Ok(ChatOutcome {
            response,
            conversation_id,
            credits_used: CHAT_CREDIT_COST,
            remaining_credits,
            message_id,
        })
    }

    /// Template an email or document around `prompt`. Returns text and balance.
    pub async fn smart_compose(
        &self,
        user_id: &str,
        prompt: &str,
        kind: &str,
    ) -> Result<(String, u32), AccountError> {
        let remaining = self.spend(user_id, COMPOSE_CREDIT_COST).await?;
        let composed = if kind == "email" {
            format!("Geachte heer/mevrouw,\n\n{prompt}\n\nMet vriendelijke groet,\n[Uw naam]")
        } else {
            format!(
                "Betreft: {prompt}\n\nDit document behandelt de volgende punten:\n- Hoofdpunt 1\n- Hoofdpunt 2\n- Conclusie"
            )
        };
        Ok((composed, remaining))
    }

    /// Summarize `text`. Returns the summary and balance.
    pub async fn summarize(&self, user_id: &str, text: &str) -> Result<(String, u32), AccountError> {
        if text.chars().count() < MIN_SUMMARY_SOURCE_CHARS {
            return Err(AccountError::TextTooShort);
        }
        let remaining = self.spend(user_id, SUMMARIZE_CREDIT_COST).await?;
        let preview: String = text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        let summary = format!(
            "Samenvatting: {preview}... (Dit is een demo samenvatting. In productie zou hier AI-gegenereerde content staan.)"
        );
        Ok((summary, remaining))
    }

    /// Conversations of `user_id`, most recently updated first
    pub async fn conversations(&self, user_id: &str) -> Vec<ConversationJson> {
        let ledger = self.ledger.read().await;
        let mut conversations: Vec<_> = ledger
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(ConversationRecord::to_json)
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    pub async fn messages(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<MessageJson>, AccountError> {
        let ledger = self.ledger.read().await;
        ledger
            .conversations
            .get(conversation_id)
            .filter(|c| c.user_id == user_id)
            .map(|c| c.messages.clone())
            .ok_or(AccountError::ConversationNotFound)
    }

    /// Start an empty conversation, optionally seeded with a user message
    pub async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
        initial_message: Option<&str>,
    ) -> (ConversationJson, Option<MessageJson>) {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_TITLE);
        let message = initial_message
            .filter(|m| !m.is_empty())
            .map(|content| MessageJson {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: id.clone(),
                content: content.to_string(),
                sender: "user".to_string(),
                credits_used: 0,
                timestamp: now,
            });

        let conversation = ConversationRecord {
            id: id.clone(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
            messages: message.iter().cloned().collect(),
        };
        let json = conversation.to_json();
        let mut ledger = self.ledger.write().await;
        ledger.conversations.insert(id, conversation);

        tracing::debug!(user_id, conversation_id = %json.id, "Conversation created");
        (json, message)
    }

    /// Add a credit package to the balance. Returns the new balance.
    pub async fn upgrade(&self, user_id: &str, package: &str) -> Result<u32, AccountError> {
        let amount = package_credits(package).ok_or(AccountError::InvalidPackage)?;
        let mut ledger = self.ledger.write().await;
        let user = ledger.user_mut(user_id)?;
        user.credits = user.credits.saturating_add(amount);
        tracing::info!(user_id, package, credits = user.credits, "Credits upgraded");
        Ok(user.credits)
    }

    /// Invalidate a bearer token. Returns the user it belonged to.
    pub async fn logout(&self, token: &str) -> Result<String, AccountError> {
        let record = self
            .ledger
            .write()
            .await
            .tokens
            .remove(token)
            .ok_or(AccountError::Unauthorized)?;
        tracing::info!(user_id = %record.user_id, "User logged out");
        Ok(record.user_id)
    }

    /// Credits `user_id` spent on the day and in the month of `now`
    pub async fn usage(&self, user_id: &str, now: DateTime<Utc>) -> Usage {
        let ledger = self.ledger.read().await;
        let today = now.date_naive();
        let mut usage = Usage::default();
        for spend in ledger.spending.iter().filter(|s| s.user_id == user_id) {
            let day = spend.at.date_naive();
            if day.year() != today.year() || day.month() != today.month() {
                continue;
            }
            usage.this_month = usage.this_month.saturating_add(spend.amount);
            if day == today {
                usage.today = usage.today.saturating_add(spend.amount);
            }
        }
        usage
    }

    async fn spend(&self, user_id: &str, amount: u32) -> Result<u32, AccountError> {
        self.ledger.write().await.charge(user_id, amount, Utc::now())
    }

    #[cfg(test)]
    pub async fn set_credits(&self, user_id: &str, credits: u32) {
        let mut ledger = self.ledger.write().await;
        if let Some(user) = ledger.users.get_mut(user_id) {
            user.credits = credits;
        }
    }
}

fn package_credits(package: &str) -> Option<u32> {
    UPGRADE_PACKAGES
        .iter()
        .find(|(name, _)| *name == package)
        .map(|(_, credits)| *credits)
}

/// First 50 characters of the opening message
fn conversation_title(message: &str) -> String {
    if message.chars().count() > TITLE_CHARS {
        let head: String = message.chars().take(TITLE_CHARS).collect();
        format!("{head}...")
    } else {
        message.to_string()
    }
}
