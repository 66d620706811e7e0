//! Error types for the attendance ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Caller or target identity is malformed
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Display name is empty after trimming
    #[error("Invalid name: display name must not be empty")]
    InvalidName,

    /// Identity already holds an active participant record
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// Identity has no active participant record
    #[error("Not registered: {0}")]
    NotRegistered(String),

    /// Caller is not the administrator
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for rejections caused by the caller's input or role, as opposed
    /// to infrastructure failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::InvalidIdentity(_)
                | Error::InvalidName
                | Error::AlreadyRegistered(_)
                | Error::NotRegistered(_)
                | Error::NotAuthorized(_)
        )
    }

    /// Stable machine-readable code, used as metric label and wire code
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidIdentity(_) => "invalid_identity",
            Error::InvalidName => "invalid_name",
            Error::AlreadyRegistered(_) => "already_registered",
            Error::NotRegistered(_) => "not_registered",
            Error::NotAuthorized(_) => "not_authorized",
            _ => "internal",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_classification() {
        assert!(Error::InvalidName.is_domain());
        assert!(Error::NotAuthorized("0xc".into()).is_domain());
        assert!(!Error::Concurrency("closed".into()).is_domain());
        assert!(!Error::Config("bad".into()).is_domain());
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::AlreadyRegistered("0xb".into()).code(), "already_registered");
        assert_eq!(Error::NotRegistered("0xb".into()).code(), "not_registered");
        assert_eq!(Error::Storage("io".into()).code(), "internal");
    }
}
