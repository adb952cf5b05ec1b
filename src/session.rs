//! Session state and login
//!
//! The session is the sole owner of the credit balance and the
//! conversation identifier. Login is a two-step protocol: `begin_login`
//! produces a `PendingAuth`, `complete_login` exchanges it plus the
//! provider callback for an authenticated `Session`.

mod auth;
mod store;

pub use auth::{AuthGrant, GoogleProfile, LoginFlow, OAuthCallback};
pub use store::{ConversationId, Session, SessionStore, UserProfile};
