//! Transport error types

use thiserror::Error;

/// Transport failure with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unauthorized, message)
    }

    pub fn insufficient_credits(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InsufficientCredits, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Server, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            401 | 403 => Self::unauthorized(format!("Authentication failed: {message}")),
            402 => Self::insufficient_credits(format!("Insufficient credits: {message}")),
            404 => Self::not_found(format!("Not found: {message}")),
            400 | 422 => Self::invalid_request(format!("Invalid request: {message}")),
            500..=599 => Self::server(format!("Server error: {message}")),
            _ => Self::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

/// Failure classification. The conversation engine treats every kind the
/// same way; the distinction exists for logs and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, timed out
    Network,
    /// 401/403
    Unauthorized,
    /// 402
    InsufficientCredits,
    /// 404
    NotFound,
    /// 400
    InvalidRequest,
    /// 5xx
    Server,
    /// Response body was not the expected shape
    Decode,
    Unknown,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::InsufficientCredits => "insufficient_credits",
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::Server => "server",
            Self::Decode => "decode",
            Self::Unknown => "unknown",
        }
    }
}
