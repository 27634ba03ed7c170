use thiserror::Error;

/// Failure taxonomy for the external capability ports. Adapters never let
/// anything else escape past the port boundary.
#[derive(Error, Debug, Clone)]
pub enum CapabilityError {
    #[error("capability unreachable: {0}")]
    Unreachable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No checkpoint found for thread {0}")]
    CheckpointNotFound(String),

    #[error("Checkpoint version {found} is newer than supported version {supported}")]
    CheckpointVersion { found: u32, supported: u32 },

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result type used at the capability port boundary.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
