//! Playbook loading and validation errors

use thiserror::Error;

/// Errors raised while reading or validating a playbook
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// Playbook file could not be read
    #[error("Failed to read playbook {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Playbook is not valid YAML for the expected shape
    #[error("Invalid playbook YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Playbook parsed but a value is out of range or missing
    #[error("Invalid playbook: {0}")]
    Invalid(String),
}
