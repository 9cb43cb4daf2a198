//! Centralized error types for mboxlite.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxlite library.
///
/// Only structural failures that make the whole archive unreadable are fatal;
/// per-message anomalies (undecodable bodies, messages with no retainable
/// content) are absorbed by the pipeline and reported as counters.
#[derive(Error, Debug)]
pub enum LightenError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Mailbox file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file does not begin with a `From ` envelope marker.
    #[error("File does not begin with a 'From ' line, not a valid mbox: {0}")]
    NotAnMbox(PathBuf),

    /// Neither a second envelope marker nor a Content-Length header was found,
    /// or a claimed mboxcl file turned out to have no length-prefixed structure.
    #[error("Could not determine mailbox dialect of '{0}'")]
    IndeterminateFormat(PathBuf),
}

/// Convenience alias for `Result<T, LightenError>`.
pub type Result<T> = std::result::Result<T, LightenError>;

impl LightenError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `LightenError`
/// when no path context is available (rare; prefer `LightenError::io`).
impl From<std::io::Error> for LightenError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
