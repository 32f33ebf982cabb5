//! CLI support for molehill
//!
//! Provides programmatic access to the `molehill` command for embedding in
//! other tools.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{GenError, Pipeline, QueryBuilder};

/// Options for the generate command
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Pipeline definition (YAML)
    pub config_file: PathBuf,
    /// Workflow file to write. Default: `<source>.dig`
    pub dest: Option<PathBuf>,
    /// Replace existing queries and workflow
    pub overwrite: bool,
    /// Version stamped on every query file
    pub version: Option<String>,
}

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Pipeline definition does not exist
    MissingConfig(PathBuf),
    /// Generation error
    Generate(GenError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::MissingConfig(path) => {
                write!(f, "No such pipeline definition: '{}'", path.display())
            }
            CliError::Generate(GenError::AlreadyExists(path)) => write!(
                f,
                "{} already exists\nPass --overwrite to replace it.",
                path.display()
            ),
            CliError::Generate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Generate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GenError> for CliError {
    fn from(e: GenError) -> Self {
        CliError::Generate(e)
    }
}

/// Generate queries and the workflow file, returning the workflow path.
pub fn execute_generate(options: &GenerateOptions) -> Result<PathBuf, CliError> {
    let config_file: &Path = &options.config_file;
    if !config_file.is_file() {
        return Err(CliError::MissingConfig(config_file.to_path_buf()));
    }

    let builder = match &options.version {
        Some(version) => QueryBuilder::with_version(version),
        None => QueryBuilder::new(),
    };

    info!(config = %config_file.display(), overwrite = options.overwrite, "generate");
    let mut pipeline = Pipeline::new(builder);
    let path = pipeline.dump_pipeline(config_file, options.dest.as_deref(), options.overwrite)?;
    Ok(path)
}
