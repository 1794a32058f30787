//! Error types for the needs RL core library

use thiserror::Error;

/// Core error type for learner operations
///
/// Missing or malformed learning data is never reported through this type.
/// Those conditions degrade to an empty table, see [`crate::LoadStatus`].
#[derive(Error, Debug)]
pub enum RlError {
    /// A configuration value is outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An action ordinal has no matching enumeration member
    #[error("Invalid action ordinal {ordinal} (expected < {count})")]
    InvalidAction {
        /// Ordinal that was requested
        ordinal: usize,
        /// Size of the action enumeration
        count: usize,
    },

    /// Environment or collaborator failure
    #[error("Environment error: {0}")]
    Environment(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration render error
    #[error("Config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for learner operations
pub type Result<T> = std::result::Result<T, RlError>;
