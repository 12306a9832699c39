use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the election engine.
#[derive(Debug, Error)]
pub enum Error {
    /// An invalid or missing piece of election/group configuration.
    /// Fatal to the current operation; aborts before any persisted mutation.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A record references another record that does not exist.
    /// Fatal, surfaced to the caller, no partial writes.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    /// Transaction contention on the election/membership set.
    /// Expected under concurrent resolution; the state machine retries
    /// with fresh reads up to a cap before surfacing this.
    #[error("Transaction conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration(what.into())
    }

    pub fn data_integrity(what: impl Into<String>) -> Self {
        Self::DataIntegrity(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Is this a transient conflict that the caller may retry?
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
