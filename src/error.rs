//! Error handling for the hoststream collector.

/// A specialized `Result` type for hoststream operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for probing, collection and publishing.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// An external command was missing, exited non-zero or printed nothing usable
    #[error("{0}")]
    Execution(String),

    /// The device identity could not be resolved
    #[error("Could not identify this device: {0}")]
    Identity(String),

    /// Probe output could not be parsed
    #[error("Failed to parse probe output: {0}")]
    Parse(String),

    /// A probe did not finish within its deadline
    #[error("Probe {probe:?} timed out after {timeout_ms}ms")]
    Timeout { probe: String, timeout_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Publishing records failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SystemError {
    /// Create a new execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a new identity error
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new publish error
    pub fn publish_error(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Whether the failure points at a missing binary rather than a bad run.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Execution(msg) | Self::Identity(msg) => msg.contains("not found"),
            _ => false,
        }
    }
}
