//! HTTP API for the Jarvis backend
//!
//! In-memory stand-in for the assistant service: login, chat with
//! credit accounting, conversation history.

mod accounts;
mod handlers;
pub mod types;

pub use accounts::{AccountError, AccountStore};
pub use handlers::create_router;

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone, Default)]
pub struct AppState {
    pub accounts: Arc<AccountStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
