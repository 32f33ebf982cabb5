use std::{io, path::PathBuf};

/// Errors raised while generating queries or the workflow document.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// Malformed arguments handed to the query builder
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown strategy, metric or algorithm, missing column lists,
    /// conflicting options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Destination workflow file exists and overwrite was not requested
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing error
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GenError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        GenError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
