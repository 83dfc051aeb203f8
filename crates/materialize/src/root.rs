//! Root confinement.
//!
//! Every destination path is mapped through [`DestRoot::join`] before it
//! touches the filesystem. The mapping is lexical: `.` is dropped and `..`
//! never climbs above the root, so `/../../etc/shadow` lands at
//! `<root>/etc/shadow`.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Directory permissions used for every parent created on the way to a
/// destination.
pub const DEFAULT_DIRECTORY_PERMISSIONS: u32 = 0o755;

/// Permissions for files whose entry does not specify a mode.
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o644;

/// The managed root all declared paths are confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestRoot {
    root: PathBuf,
}

impl DestRoot {
    /// Create a root. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory itself.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Map a declared path onto a concrete path under the root.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for an empty path, one containing NUL, or
    /// one that resolves to the root itself.
    pub fn join(&self, declared: &str) -> Result<PathBuf> {
        if declared.is_empty() {
            return Err(Error::InvalidPath {
                path: declared.to_string(),
                message: "path is empty".to_string(),
            });
        }
        if declared.contains('\0') {
            return Err(Error::InvalidPath {
                path: declared.to_string(),
                message: "path contains a NUL byte".to_string(),
            });
        }

        let mut relative = PathBuf::new();
        for component in Path::new(declared).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    relative.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }

        // Nothing may replace or remove the root directory.
        if relative.as_os_str().is_empty() {
            return Err(Error::InvalidPath {
                path: declared.to_string(),
                message: "path resolves to the root itself".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_absolute() {
        let root = DestRoot::new("/sysroot");
        assert_eq!(
            root.join("/etc/hostname").unwrap(),
            PathBuf::from("/sysroot/etc/hostname")
        );
    }

    #[test]
    fn test_join_relative_is_under_root() {
        let root = DestRoot::new("/sysroot");
        assert_eq!(
            root.join("etc/hostname").unwrap(),
            PathBuf::from("/sysroot/etc/hostname")
        );
    }

    #[test]
    fn test_join_cannot_escape() {
        let root = DestRoot::new("/sysroot");
        for declared in [
            "/../../etc/shadow",
            "../etc/shadow",
            "/etc/../../../etc/shadow",
            "/./etc/./shadow",
        ] {
            let joined = root.join(declared).unwrap();
            assert!(joined.starts_with("/sysroot"), "{declared} -> {joined:?}");
            assert_eq!(joined, PathBuf::from("/sysroot/etc/shadow"));
        }
    }

    #[test]
    fn test_join_rejects_root_itself() {
        let root = DestRoot::new("/sysroot");
        for declared in ["/", "/..", ".", "/etc/.."] {
            assert!(
                matches!(root.join(declared), Err(Error::InvalidPath { .. })),
                "{declared} should be rejected"
            );
        }
    }

    #[test]
    fn test_join_rejects_empty_and_nul() {
        let root = DestRoot::new("/sysroot");
        assert!(matches!(root.join(""), Err(Error::InvalidPath { .. })));
        assert!(matches!(root.join("/etc/a\0b"), Err(Error::InvalidPath { .. })));
    }
}
