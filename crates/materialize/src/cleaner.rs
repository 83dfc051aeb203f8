//! Clearing the way for directory and link creation.

use crate::Materializer;
use crate::error::{Error, Result};
use crate::types::{Node, Overwrite};
use std::fs;
use std::io;
use std::path::Path;

/// Remove whatever is at `path` without following a symlink there.
/// Nothing there is not an error.
pub(crate) fn remove_all(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

impl Materializer {
    /// Remove anything at the node's path when it asks for `overwrite = true`.
    ///
    /// Directory and symlink creation fail when the path is taken, so callers
    /// run this first. Unset and `false` leave the filesystem alone.
    pub fn delete_path_on_overwrite(&self, node: &Node) -> Result<()> {
        if node.overwrite != Overwrite::Allow {
            return Ok(());
        }
        let path = self.root.join(&node.path)?;
        log::debug!("clearing {:?} for overwrite", node.path);
        remove_all(&path).inspect_err(|e| log::error!("failed to clear {:?}: {e}", node.path))
    }

    /// Whether anything, including a dangling symlink, exists at `declared`
    /// under the root.
    pub fn path_exists(&self, declared: &str) -> Result<bool> {
        let path = self.root.join(declared)?;
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}
