use std::io;
use thiserror::Error;

use crate::config::settings::ConfigError;

/// Errors that can occur during git operations
///
/// Cloneable so that a single failed task can be observed by every poller
/// holding its handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    #[error("Not a git repository")]
    NotARepository,

    #[error("Failed to launch git: {message}")]
    Launch { kind: io::ErrorKind, message: String },

    #[error("Command 'git {command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to parse git output: {0}")]
    ParseError(String),

    #[error("Invalid command line: {0}")]
    Tokenize(String),

    #[error("Git version {0} is too old")]
    GitVersionTooOld(String),

    #[error("Failed to detect git version: {0}")]
    GitVersionDetectionFailed(String),

    #[error("Task was dropped before it completed")]
    TaskAborted,
}

impl GitError {
    /// Build a launch error from the io error returned by spawn
    pub fn launch(err: &io::Error) -> Self {
        GitError::Launch {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// True when the git executable itself could not be started
    pub fn is_launch_error(&self) -> bool {
        matches!(self, GitError::Launch { .. })
    }
}

impl From<io::Error> for GitError {
    fn from(err: io::Error) -> Self {
        GitError::launch(&err)
    }
}

/// Top-level application error that wraps all module-specific errors
///
/// All module errors convert to AppError via the `From` trait.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for git operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
