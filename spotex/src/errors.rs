use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type returned by spotex search and saved-search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Filters or saved-search input failed validation.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Input could not be interpreted at all (wrong JSON shape, bad identifiers).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Saved search was not found for the requesting user.
    #[error("saved search not found")]
    NotFound { saved_search_id: Option<String> },

    /// User already owns the maximum number of saved searches.
    #[error("saved search limit reached ({limit} per user)")]
    LimitExceeded { limit: usize },

    /// Caller exceeded the request budget for the current window.
    #[error("rate limit exceeded for {key}; retry after {retry_after_secs}s")]
    RateLimited { key: String, retry_after_secs: u64 },

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl SearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Collection of validation issues, accumulated so callers can surface all of them at once.
#[derive(Debug, Clone, Error, Serialize)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `Ok(())` when no issues were collected.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Detailed validation failure for a single field or dotted path (`origin.radius`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Issue codes emitted by the filter and saved-search validators.
pub mod codes {
    pub const RANGE: &str = "validation.range";
    pub const ORDER: &str = "validation.order";
    pub const LENGTH: &str = "validation.length";
    pub const ENUM: &str = "validation.enum";
    pub const DATE: &str = "validation.date";
    pub const FORMAT: &str = "validation.format";
    pub const MALFORMED: &str = "validation.malformed";
    pub const REQUIRED: &str = "validation.required";
}
