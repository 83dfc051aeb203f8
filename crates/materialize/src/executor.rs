//! Stage-then-commit execution of a [`FetchOp`].
//!
//! 1. `overwrite = false`: fail if anything exists at the destination.
//! 2. `overwrite` unset and not appending: remove whatever is there.
//! 3. Create parent directories.
//! 4. Stage into a temp file in the destination's directory. The stage is
//!    removed when it goes out of scope unless it was renamed into place.
//! 5. Fetch into the stage.
//! 6. Commit: append onto the destination, or set owner and mode on the
//!    stage, rename it over the destination and sync the directory.

use crate::Materializer;
use crate::cleaner::remove_all;
use crate::error::{Error, Result};
use crate::ownership::ResolvedOwnership;
use crate::planner::FetchOp;
use crate::root::{DEFAULT_DIRECTORY_PERMISSIONS, DEFAULT_FILE_PERMISSIONS};
use crate::types::{Node, Overwrite};
use std::fs::{self, DirBuilder, OpenOptions, Permissions};
use std::io::{self, Seek, SeekFrom};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tempfile::NamedTempFile;

/// Create the directory components of `path` with default permissions.
pub(crate) fn mkdir_for_file(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    DirBuilder::new()
        .recursive(true)
        .mode(DEFAULT_DIRECTORY_PERMISSIONS)
        .create(parent)
        .map_err(|e| Error::io(parent, e))
}

/// Flush `dir`'s entries so a rename into it survives power loss.
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

impl Materializer {
    /// Fetch and land the file described by `op`.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExists` when `overwrite = false` and the path is taken
    /// - `Error::NotRegularFile` when appending to a non-file
    /// - `Error::Fetch` when the transport fails
    /// - `Error::Lookup` when the owner cannot be resolved
    /// - `Error::Io` for any filesystem failure
    pub fn perform_fetch(&self, op: FetchOp) -> Result<()> {
        let declared = op.path().to_string();
        self.perform_fetch_inner(op)
            .inspect_err(|e| log::error!("failed to write file {declared:?}: {e}"))
    }

    fn perform_fetch_inner(&self, op: FetchOp) -> Result<()> {
        let path = self.root.join(op.path())?;

        match op.overwrite {
            Overwrite::Forbid => match fs::symlink_metadata(&path) {
                Ok(_) => {
                    return Err(Error::AlreadyExists {
                        path: op.node.path.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            },
            Overwrite::Unset if !op.append => remove_all(&path)?,
            Overwrite::Unset | Overwrite::Allow => {}
        }

        mkdir_for_file(&path)?;

        let dir = path.parent().unwrap_or(self.root.path());
        let mut staged = tempfile::Builder::new()
            .prefix("tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir, e))?;

        log::info!("writing file {:?} from {}", op.node.path, op.url);
        let FetchOp {
            url,
            options,
            mode,
            append,
            node,
            ..
        } = op;

        self.fetcher
            .fetch(&url, staged.as_file_mut(), options)
            .map_err(|source| Error::Fetch {
                path: node.path.clone(),
                source,
            })?;

        if append {
            self.append_staged(&path, &node.path, &node, mode, staged)
        } else {
            self.replace_with_staged(&path, &node, mode, staged)
        }
    }

    fn append_staged(
        &self,
        path: &Path,
        declared: &str,
        node: &Node,
        mode: Option<u32>,
        mut staged: NamedTempFile,
    ) -> Result<()> {
        let existing = match fs::symlink_metadata(path) {
            Ok(meta) if !meta.file_type().is_file() => {
                return Err(Error::NotRegularFile {
                    path: declared.to_string(),
                });
            }
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(path, e)),
        };

        // Appending keeps the existing owner and mode unless the entry overrides them.
        let (default_owner, current_mode) = match &existing {
            Some(meta) => (
                ResolvedOwnership::new(meta.uid(), meta.gid()),
                meta.mode() & 0o7777,
            ),
            None => (ResolvedOwnership::ROOT, DEFAULT_FILE_PERMISSIONS),
        };
        let owner = self.resolve_ownership(node, default_owner)?;
        let mode = mode.unwrap_or(current_mode);

        let mut target = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(mode)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let stage_path = staged.path().to_path_buf();
        let stage = staged.as_file_mut();
        stage
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(&stage_path, e))?;
        let appended = io::copy(stage, &mut target).map_err(|e| Error::io(path, e))?;
        target.sync_all().map_err(|e| Error::io(path, e))?;
        drop(target);

        self.chowner
            .chown(path, owner)
            .map_err(|e| Error::io(path, e))?;
        fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))?;

        log::debug!(
            "appended {appended} bytes to {declared:?} (owner {}:{}, mode {mode:o})",
            owner.uid,
            owner.gid
        );
        Ok(())
    }

    fn replace_with_staged(
        &self,
        path: &Path,
        node: &Node,
        mode: Option<u32>,
        staged: NamedTempFile,
    ) -> Result<()> {
        let owner = self.resolve_ownership(node, ResolvedOwnership::ROOT)?;
        let mode = mode.unwrap_or(DEFAULT_FILE_PERMISSIONS);

        // Owner and mode go on the stage so the rename publishes them together with the bytes.
        self.chowner
            .chown(staged.path(), owner)
            .map_err(|e| Error::io(staged.path(), e))?;
        fs::set_permissions(staged.path(), Permissions::from_mode(mode))
            .map_err(|e| Error::io(staged.path(), e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| Error::io(staged.path(), e))?;

        staged
            .persist(path)
            .map_err(|e| Error::io(path, e.error))?;
        if let Some(dir) = path.parent() {
            sync_dir(dir)?;
        }

        log::debug!(
            "replaced {:?} (owner {}:{}, mode {mode:o})",
            node.path,
            owner.uid,
            owner.gid
        );
        Ok(())
    }
}
