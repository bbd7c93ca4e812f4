use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Kind of a per-participant fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Malformed,
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Malformed => write!(f, "malformed"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure to fetch one participant's snapshot.
///
/// Closed set so callers branch on the variant rather than the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network trouble, timeouts, rate-limit or 5xx answers. Retried.
    #[error("transient fetch failure: {reason}")]
    Transient { reason: String },

    /// The payload failed schema or invariant validation. Skipped this cycle.
    #[error("malformed payload: {reason}")]
    Malformed { reason: String },

    /// The request can never succeed, e.g. an invalid address. Dropped.
    #[error("permanent fetch failure: {reason}")]
    Permanent { reason: String },
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transient { .. } => FailureKind::Transient,
            FetchError::Malformed { .. } => FailureKind::Malformed,
            FetchError::Permanent { .. } => FailureKind::Permanent,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

impl From<DomainError> for FetchError {
    fn from(err: DomainError) -> Self {
        FetchError::malformed(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::malformed(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 429 || status.is_server_error() => {
                FetchError::transient(err.to_string())
            }
            Some(status) if status.is_client_error() => FetchError::permanent(err.to_string()),
            _ => FetchError::transient(err.to_string()),
        }
    }
}

/// Failures that abort a whole cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("rate budget can never admit a snapshot: cost {cost} exceeds capacity {capacity}")]
    BudgetUnsatisfiable { cost: u32, capacity: u32 },

    #[error("store failure: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("opportunity not found: {0}")]
    OpportunityNotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
