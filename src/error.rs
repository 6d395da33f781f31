//! Unified error handling for the pommerge library.
//!
//! This module provides the error hierarchy using `thiserror`, split by the
//! concern that raised the error.
//!
//! ## Error Categories
//!
//! - [`DocumentError`]: a descriptor file could not be read or parsed. The
//!   merge driver recovers from these by treating the value as absent.
//! - [`GitError`]: a git invocation could not be launched or failed. Fatal.
//! - [`EncodingError`]: text could not be represented in the encoding a file
//!   declares. Fatal.
//! - [`ConfigError`]: configuration loading and validation failures.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pommerge::error::{PomMergeError, GitError};
//!
//! fn example() -> Result<(), PomMergeError> {
//!     // Errors are automatically converted via From trait
//!     Err(GitError::Terminated { command: "git merge-file".to_string() })?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the pommerge library.
#[derive(Error, Debug)]
pub enum PomMergeError {
    /// A descriptor document could not be read or parsed.
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// An error occurred during a git operation.
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Text could not be decoded or encoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// An error occurred while loading or validating configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading or writing one of the revision files failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A generic error for cases not covered by specific error types.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised while reading a field out of a descriptor document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The file could not be read from disk.
    #[error("Failed to read {path}: {message}")]
    Unreadable {
        /// Path of the descriptor file.
        path: PathBuf,
        /// Error message from the filesystem.
        message: String,
    },

    /// The file content is not well-formed XML.
    #[error("Failed to parse {path}: {message}")]
    Malformed {
        /// Path of the descriptor file.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },
}

/// Errors that can occur during git operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    /// The git executable could not be started.
    #[error("Failed to launch '{command}': {message}")]
    LaunchFailed {
        /// The git command that was attempted.
        command: String,
        /// Error message from the operating system.
        message: String,
    },

    /// A git command exited with a failure status.
    #[error("Git command failed: {command} - {message}")]
    CommandFailed {
        /// The git command that failed.
        command: String,
        /// Error message from git.
        message: String,
    },

    /// A git command was terminated before reporting an exit code.
    #[error("Git command '{command}' was terminated by a signal")]
    Terminated {
        /// The git command that was terminated.
        command: String,
    },

    /// Git reported an empty branch name.
    #[error("Could not determine the current branch")]
    UnknownBranch,
}

/// Errors raised when converting between text and bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The text contains characters the target encoding cannot represent.
    #[error("Content for {path} cannot be represented in {encoding}")]
    Unmappable {
        /// File being written.
        path: PathBuf,
        /// Name of the target encoding.
        encoding: String,
    },
}

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file at {path}: {message}")]
    FileReadError {
        /// Path to the config file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file at {path}: {message}")]
    ParseError {
        /// Path to the config file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// An invalid value was provided for a configuration field.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Name of the field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// The home directory could not be determined.
    #[error("Could not determine home directory for the config file")]
    NoHomeDirectory,

    /// Failed to create config directory.
    #[error("Failed to create config directory at {path}: {message}")]
    DirectoryCreationError {
        /// Path where directory creation failed.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

/// Type alias for Results using PomMergeError.
///
/// Note: This is not re-exported from the crate root to avoid shadowing `anyhow::Result`.
pub type PomMergeResult<T> = std::result::Result<T, PomMergeError>;
