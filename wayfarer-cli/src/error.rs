//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use wayfarer::config::ConfigFileError;
use wayfarer::progress::RouteError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Input file is not valid JSON for the expected shape
    Parse { path: PathBuf, error: serde_json::Error },
    /// Route geometry cannot be navigated
    Route(RouteError),
    /// Invalid command-line argument combination
    InvalidArgument(String),
    /// Async runtime could not be started
    Runtime(std::io::Error),
    /// A background task panicked or was aborted
    TaskFailed(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Parse { .. } => {
                eprintln!();
                eprintln!("Expected formats:");
                eprintln!("  route: {{\"geometry\": [{{\"lat\": .., \"lng\": ..}}, ..], \"instructions\": [..]}}");
                eprintln!("  fixes: [{{\"coordinate\": {{..}}, \"accuracy\": 5.0, \"timestamp\": 0}}, ..]");
                eprintln!("         or one fix object per line");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!(
                    "Check {} or pass --config <path>",
                    wayfarer::config::config_file_path().display()
                );
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::Parse { path, error } => {
                write!(f, "Failed to parse '{}': {}", path.display(), error)
            }
            CliError::Route(e) => write!(f, "Unusable route: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::TaskFailed(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Parse { error, .. } => Some(error),
            CliError::Route(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<RouteError> for CliError {
    fn from(e: RouteError) -> Self {
        CliError::Route(e)
    }
}
