//! Ordered candidate sources for the config blob.
//!
//! Candidates are tried in order after activation:
//!
//! - missing → try the next one
//! - present → its bytes are the result, even when empty
//! - any other read failure → fatal, later candidates are not tried
//!
//! When every candidate is missing the result is empty bytes, which callers
//! treat as "no config supplied".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::activation::Activator;
use crate::error::{Error, Result};

/// The winning candidate, if any, and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// `None` when no candidate existed.
    pub source: Option<PathBuf>,
    pub data: Vec<u8>,
}

/// An activation step plus the paths to try, newest convention first.
pub struct CandidateSources {
    activator: Box<dyn Activator>,
    paths: Vec<PathBuf>,
}

impl CandidateSources {
    pub fn new<P: Into<PathBuf>>(
        activator: impl Activator + 'static,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        Self {
            activator: Box::new(activator),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Activate, then return the first present candidate.
    ///
    /// # Errors
    ///
    /// - `Error::Activation` if activation fails; no candidate is read
    /// - `Error::Read` if a candidate exists but cannot be read
    pub fn locate(&self) -> Result<Located> {
        self.activator
            .activate()
            .inspect_err(|e| log::error!("{e}"))?;

        for path in &self.paths {
            match read_candidate(path)? {
                Some(data) => {
                    log::info!("using config from {} ({} bytes)", path.display(), data.len());
                    return Ok(Located {
                        source: Some(path.clone()),
                        data,
                    });
                }
                None => log::info!("config source {} was not found, ignoring", path.display()),
            }
        }

        log::info!("no config source found");
        Ok(Located {
            source: None,
            data: Vec::new(),
        })
    }

    /// Like [`CandidateSources::locate`], returning only the bytes.
    pub fn resolve(&self) -> Result<Vec<u8>> {
        self.locate().map(|located| located.data)
    }
}

fn read_candidate(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            let err = Error::Read {
                path: path.to_path_buf(),
                source: e,
            };
            log::error!("{err}");
            Err(err)
        }
    }
}
