use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapeError>;

/// Every failure the locator and lifecycle manager can report.
///
/// `Cancelled` is not a failure: the operator declined a confirmation and the
/// process exits cleanly.
#[derive(Error, Debug)]
pub enum SnapeError {
    #[error("Illegal snape environment name: {0}")]
    IllegalName(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Not a virtual environment: {}", .0.display())]
    InvalidEnvironment(PathBuf),

    #[error(
        "Directory {} exists and is not an environment which could be overwritten",
        .0.display()
    )]
    PathOccupied(PathBuf),

    #[error("Environment '{0}' does already exist")]
    EnvironmentExists(String),

    #[error("Environment '{0}' is currently active, deactivate it first")]
    EnvironmentActive(String),

    #[error("Could not delete virtual environment {}{}", .path.display(), reason_suffix(.reason))]
    DeletionIncomplete {
        path: PathBuf,
        reason: Option<String>,
    },

    #[error("Cannot read package list from {}: {reason}", .env.display())]
    PackageListUnreadable { env: PathBuf, reason: String },

    #[error("Could not install all packages into {}", .0.display())]
    PackageInstallIncomplete(PathBuf),

    #[error("Python interpreter '{0}' not found, set SNAPE_PYTHON or install python3 with venv")]
    InterpreterMissing(String),

    #[error("Failed to create virtual environment at {}", .0.display())]
    CreationFailed(PathBuf),

    #[error("Command failed with exit code {code}")]
    CommandFailed { code: i32 },

    #[error("Snape does not support the shell '{0}' yet")]
    UnsupportedShell(String),

    #[error("Invalid snape configuration: {0}")]
    InvalidConfig(String),

    #[error("Snape root is not a valid directory: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SnapeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SnapeError::Cancelled)
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default()
}
