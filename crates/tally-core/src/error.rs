//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    /// Bad input: non-positive amounts, payments on closed loans, premature close, ...
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist or belongs to another owner
    #[error("Not found: {0}")]
    NotFound(String),

    /// The owner's account setup is inconsistent (e.g. a missing system category)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Coarse classification used by callers to decide how to surface a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Configuration,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Configuration(_) => ErrorKind::Configuration,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Configuration("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::Database(rusqlite::Error::QueryReturnedNoRows).kind(),
            ErrorKind::Internal
        );
    }
}
