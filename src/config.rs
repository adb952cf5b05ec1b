//! Environment-driven configuration

use crate::persona::FALLBACK_REPLY;
use crate::state_machine::{state::DEFAULT_FAILURE_CREDIT_COST, ConvContext};
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REPLY_DELAY_MS: RangeInclusive<u64> = 1000..=3000;

/// Backend server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("JARVIS_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self { port }
    }
}

/// Terminal client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: String,
    pub request_timeout: Duration,
    pub failure_credit_cost: u32,
    /// Cosmetic delay for the offline transport
    pub reply_delay_ms: RangeInclusive<u64>,
    pub fallback_reply: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_base: lookup("JARVIS_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout: Duration::from_secs(
                lookup("JARVIS_REQUEST_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            failure_credit_cost: lookup("JARVIS_FAILURE_CREDIT_COST")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FAILURE_CREDIT_COST),
            reply_delay_ms: lookup("JARVIS_REPLY_DELAY_MS")
                .and_then(|v| parse_delay(&v))
                .unwrap_or(DEFAULT_REPLY_DELAY_MS),
            fallback_reply: lookup("JARVIS_FALLBACK_REPLY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_REPLY.to_string()),
        }
    }

    pub fn conv_context(&self) -> ConvContext {
        ConvContext::new(self.fallback_reply.clone(), self.failure_credit_cost)
    }
}

/// Accepts `"1500"` or `"1000-3000"`
fn parse_delay(value: &str) -> Option<RangeInclusive<u64>> {
    match value.split_once('-') {
        Some((lo, hi)) => {
            let lo = lo.trim().parse().ok()?;
            let hi = hi.trim().parse().ok()?;
            (lo <= hi).then_some(lo..=hi)
        }
        None => {
            let ms = value.trim().parse().ok()?;
            Some(ms..=ms)
        }
    }
}
