use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while locating the config blob.
#[derive(Debug, Error)]
pub enum Error {
    /// The step that exposes the candidate sources failed
    #[error("couldn't activate {module}: {message}")]
    Activation { module: String, message: String },

    /// A candidate exists but could not be read
    #[error("couldn't read config source {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns true if the failure happened before any candidate was tried
    pub fn is_activation(&self) -> bool {
        matches!(self, Error::Activation { .. })
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
