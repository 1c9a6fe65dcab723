//! Unified Error Model
use thiserror::Error;

/// Number of raw response characters kept on a parse failure.
pub const RAW_PREFIX_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmithError {
    #[error("RATE/provider rate limit: {0}")]
    RateLimited(String),

    #[error("RATE/provider overloaded: {0}")]
    Overloaded(String),

    #[error("PROVIDER/{status}: {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP/{0}")]
    Http(String),

    #[error("TIMEOUT/no response within {0}s")]
    Timeout(u64),

    #[error("CANCELLED/run cancelled")]
    Cancelled,

    #[error("PARSE/{message}. Raw (first 500 chars): {raw_prefix}")]
    Parse { message: String, raw_prefix: String },

    #[error("SCHEMA/{0}")]
    Schema(String),

    #[error("STREAM/{0}")]
    Stream(String),

    #[error("TEMPLATE/{0}")]
    Template(String),

    #[error("CONFIG/{0}")]
    Config(String),
}

impl SmithError {
    /// Builds a parse error carrying the head of the offending text.
    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        Self::Parse {
            message: message.into(),
            raw_prefix: raw.chars().take(RAW_PREFIX_CHARS).collect(),
        }
    }

    /// Rate-limit and overload responses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Overloaded(_))
    }
}

pub type Result<T> = std::result::Result<T, SmithError>;
