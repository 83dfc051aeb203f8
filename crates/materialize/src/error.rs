//! Error types for materialization.
//!
//! Every variant carries the declared or resolved path it concerns so that a
//! failure logged early in boot can still be traced back to its entry.

use crate::transport::TransportError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for materialization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which identity a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// A user name (`passwd`).
    User,
    /// A group name (`group`).
    Group,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Categories of materialization errors.
///
/// None of these are retried inside this crate; the category only shapes
/// how the caller reports the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declared entry itself is malformed.
    Declaration,
    /// Something already occupies the destination.
    Conflict,
    /// The identity directory could not answer.
    Identity,
    /// Filesystem syscall failure.
    Filesystem,
    /// Transport failure after its own retries.
    Transport,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid entry",
            Self::Conflict => "Destination conflict",
            Self::Identity => "Unknown user or group",
            Self::Filesystem => "Filesystem error",
            Self::Transport => "Fetch failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while landing files and links.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A user or group name could not be resolved to a numeric id.
    #[error("no such {kind} {name:?}: {reason}")]
    Lookup {
        /// User or group.
        kind: IdentityKind,
        /// The offending name.
        name: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// `overwrite = false` and something already exists at the path.
    #[error("error creating {path:?}: something else exists at that path")]
    AlreadyExists {
        /// Declared path.
        path: String,
    },

    /// Append target exists but is not a regular file.
    #[error("can only append to files: {path:?}")]
    NotRegularFile {
        /// Declared path.
        path: String,
    },

    /// IO error during file operations.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The transport could not deliver the content.
    #[error("error fetching file {path:?}: {source}")]
    Fetch {
        /// Declared path.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// Custom headers could not be turned into transport headers.
    #[error("error parsing http header {name:?}: {message}")]
    HeaderParse {
        /// Header name as declared.
        name: String,
        /// Parser message.
        message: String,
    },

    /// The verification string is malformed.
    #[error("error parsing verification string {spec:?}: {message}")]
    VerificationSpec {
        /// The declared verification string.
        spec: String,
        /// Parser message.
        message: String,
    },

    /// The source locator has no usable scheme.
    #[error("invalid source {source_url:?}: {message}")]
    InvalidSource {
        /// The declared source.
        source_url: String,
        /// Parser message.
        message: String,
    },

    /// The declared path cannot be confined to the managed root.
    #[error("invalid path {path:?}: {message}")]
    InvalidPath {
        /// Declared path.
        path: String,
        /// Why it was rejected.
        message: String,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Lookup { .. } => ErrorCategory::Identity,
            Error::AlreadyExists { .. } | Error::NotRegularFile { .. } => ErrorCategory::Conflict,
            Error::Io { .. } => ErrorCategory::Filesystem,
            Error::Fetch { .. } => ErrorCategory::Transport,
            Error::HeaderParse { .. }
            | Error::VerificationSpec { .. }
            | Error::InvalidSource { .. }
            | Error::InvalidPath { .. } => ErrorCategory::Declaration,
        }
    }
}
