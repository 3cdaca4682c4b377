//! Error types for OpenSerp-RS
//!
//! Every failure surfaced by the client is one variant of [`OpenSerpError`].
//! Callers branch on [`OpenSerpError::kind`] or [`OpenSerpError::code`],
//! never on the message text.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, OpenSerpError>;

/// Machine-readable code attached to some errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The server answered 429 Too Many Requests
    RateLimit,
    /// The server answered, but the body was not valid JSON
    InvalidResponse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`OpenSerpError`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Api,
    Validation,
    RateLimit,
    Cache,
}

/// Main error type for the OpenSerp client
#[derive(Debug, Error)]
pub enum OpenSerpError {
    /// DNS failure, refused or reset connection, remote 429, or an
    /// unreadable response
    #[error("{}", with_code(.code, .message))]
    Connection {
        message: String,
        code: Option<ErrorCode>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{message}")]
    Timeout { message: String, timeout: Duration },

    /// The server answered with a status >= 400 other than 429
    #[error("{message}")]
    Api { message: String, status_code: u16 },

    /// Malformed input, detected before any I/O
    #[error("{message}")]
    Validation { message: String },

    /// Local admission control refused the request
    #[error("{message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{message}")]
    Cache { message: String },
}

fn with_code(code: &Option<ErrorCode>, message: &str) -> String {
    match code {
        Some(code) => format!("[{}] {}", code, message),
        None => message.to_string(),
    }
}

impl OpenSerpError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Connection error wrapping an underlying cause
    pub fn connection_caused_by<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            message: message.into(),
            code: None,
            source: Some(Box::new(cause)),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Attach a machine code to a connection error. Other variants are
    /// returned unchanged.
    pub fn with_error_code(self, new_code: ErrorCode) -> Self {
        match self {
            Self::Connection {
                message, source, ..
            } => Self::Connection {
                message,
                code: Some(new_code),
                source,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Api { .. } => ErrorKind::Api,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Cache { .. } => ErrorKind::Cache,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Connection { code, .. } => *code,
            _ => None,
        }
    }

    /// Human-readable message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Timeout { message, .. }
            | Self::Api { message, .. }
            | Self::Validation { message }
            | Self::RateLimit { message, .. }
            | Self::Cache { message } => message,
        }
    }

    /// HTTP status for API errors
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Retry hint for local rate-limit denials
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether the remote server rate limited us (429)
    pub fn is_remote_rate_limit(&self) -> bool {
        self.code() == Some(ErrorCode::RateLimit)
    }
}
