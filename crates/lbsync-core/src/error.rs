//! Error types for lbsync

use thiserror::Error;

/// Main error type for lbsync
#[derive(Error, Debug)]
pub enum LbsyncError {
    /// The discovery backend could not be reached or refused the request
    #[error("Discovery backend unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// The discovery backend answered with something that is not the expected JSON document
    #[error("Malformed discovery response: {0}")]
    MalformedResponse(String),

    /// A reconciliation cycle failed
    #[error("Configuration failure: {0}")]
    ConfigurationFailure(#[source] Box<LbsyncError>),

    /// The startup configuration could not be resolved
    #[error("Initial configuration failed: {0}")]
    InitialConfiguration(#[source] Box<LbsyncError>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A change subscriber failed
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// The reconciler task is no longer running
    #[error("Reconciler stopped")]
    ReconcilerStopped,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for lbsync operations
pub type LbsyncResult<T> = Result<T, LbsyncError>;

impl LbsyncError {
    /// Wrap an error raised while running a reconciliation cycle
    pub fn configuration_failure(err: LbsyncError) -> Self {
        match err {
            LbsyncError::ConfigurationFailure(_) => err,
            other => LbsyncError::ConfigurationFailure(Box::new(other)),
        }
    }

    /// Whether the error originates from talking to the discovery backend
    pub fn is_discovery(&self) -> bool {
        match self {
            LbsyncError::DiscoveryUnavailable(_) | LbsyncError::MalformedResponse(_) => true,
            LbsyncError::ConfigurationFailure(inner) | LbsyncError::InitialConfiguration(inner) => {
                inner.is_discovery()
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LbsyncError {
    fn from(err: serde_json::Error) -> Self {
        LbsyncError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LbsyncError {
    fn from(err: toml::de::Error) -> Self {
        LbsyncError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LbsyncError::Config("invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid config");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LbsyncError = io_err.into();
        assert!(matches!(err, LbsyncError::Io(_)));
    }

    #[test]
    fn test_configuration_failure_is_not_nested() {
        let err = LbsyncError::configuration_failure(LbsyncError::DiscoveryUnavailable(
            "connection refused".to_string(),
        ));
        let err = LbsyncError::configuration_failure(err);

        match &err {
            LbsyncError::ConfigurationFailure(inner) => {
                assert!(matches!(**inner, LbsyncError::DiscoveryUnavailable(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_discovery());
        assert_eq!(
            err.to_string(),
            "Configuration failure: Discovery backend unavailable: connection refused"
        );
    }
}
