use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MartrelloError>;

/// Kind of entity referenced by a `NotFound` error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Board,
    List,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Board => write!(f, "Board"),
            Self::List => write!(f, "List"),
            Self::Card => write!(f, "Card"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MartrelloError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence failure during {operation}: {reason}")]
    PersistenceFailure { operation: String, reason: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid entity ID: {0}")]
    InvalidEntityId(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Logging setup failed: {0}")]
    LoggingInit(String),

    #[cfg(feature = "http-storage")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl MartrelloError {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn persistence(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PersistenceFailure { .. })
    }
}
