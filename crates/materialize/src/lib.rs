//! # materialize
//!
//! Land declared files and links under a managed root, early in boot.
//!
//! This crate provides:
//! - Owner resolution from numeric ids or names
//! - Fetch planning: source, compression, verification and custom headers
//! - Crash-safe file writes: stage in the destination directory, then
//!   rename over it, or append in place
//! - Hard and symbolic link creation
//! - Overwrite pre-cleaning for nodes that cannot be replaced atomically
//!
//! Every declared path is confined under the managed root: `..` never
//! climbs above it.
//!
//! ## Example
//!
//! ```no_run
//! use materialize::{DestRoot, File, Link, Materializer};
//!
//! let materializer = Materializer::new(DestRoot::new("/sysroot"));
//!
//! let mut motd = File::new("/etc/motd", "data:,welcome%0A");
//! motd.mode = Some(0o644);
//! let op = materializer.prepare_fetch(&motd).expect("invalid entry");
//! materializer.perform_fetch(op).expect("write failed");
//!
//! let link = Link::symbolic("/etc/localtime", "/usr/share/zoneinfo/UTC");
//! materializer.delete_path_on_overwrite(&link.node).expect("clean failed");
//! materializer.write_link(&link).expect("link failed");
//! ```
//!
//! ## Overwrite semantics for files
//!
//! | `overwrite` | `append` | Existing destination                       |
//! |-------------|----------|--------------------------------------------|
//! | `false`     | any      | refused with `AlreadyExists`               |
//! | unset       | `false`  | removed, then replaced                     |
//! | unset       | `true`   | appended to                                |
//! | `true`      | `false`  | replaced by rename                         |
//! | `true`      | `true`   | appended to                                |

#![warn(clippy::all)]

mod cleaner;
pub mod error;
mod executor;
pub mod hash;
mod link;
pub mod ownership;
pub mod planner;
pub mod root;
pub mod transport;
pub mod types;

pub use error::{Error, ErrorCategory, IdentityKind, Result};
pub use ownership::{
    Chowner, HostChowner, HostDirectory, IdentityDirectory, ResolvedOwnership, RootDirectory,
};
pub use planner::FetchOp;
pub use root::{DEFAULT_DIRECTORY_PERMISSIONS, DEFAULT_FILE_PERMISSIONS, DestRoot};
pub use transport::{Fetcher, MockFetcher, RetryConfig, SchemeFetcher};
pub use types::{
    Compression, File, FileContents, HttpHeader, Link, Node, NodeOwner, Overwrite, Verification,
};

/// Writes files and links under one managed root.
///
/// Retrieval, identity lookups and ownership changes are capabilities that
/// can be swapped out, which is how tests run without network or privileges:
///
/// ```
/// use materialize::{DestRoot, File, Materializer, MockFetcher};
/// use materialize::ownership::{MockDirectory, RecordingChowner};
///
/// let tmp = tempfile::tempdir().unwrap();
/// let fetcher = MockFetcher::new();
/// fetcher.add("https://example.com/hostname", b"node-1\n".to_vec());
///
/// let materializer = Materializer::new(DestRoot::new(tmp.path()))
///     .with_fetcher(fetcher)
///     .with_identities(MockDirectory::new())
///     .with_chowner(RecordingChowner::new());
///
/// let op = materializer
///     .prepare_fetch(&File::new("/etc/hostname", "https://example.com/hostname"))
///     .unwrap();
/// materializer.perform_fetch(op).unwrap();
///
/// let written = std::fs::read(tmp.path().join("etc/hostname")).unwrap();
/// assert_eq!(written, b"node-1\n");
/// ```
pub struct Materializer {
    root: DestRoot,
    fetcher: Box<dyn Fetcher>,
    identities: Box<dyn IdentityDirectory>,
    chowner: Box<dyn Chowner>,
}

impl Materializer {
    /// Create a materializer for `root` with the default capabilities:
    /// [`SchemeFetcher`], names resolved through the host's passwd and group
    /// databases, and real ownership changes.
    ///
    /// Use [`RootDirectory`] to resolve names the way the provisioned system
    /// will.
    #[must_use]
    pub fn new(root: DestRoot) -> Self {
        Self {
            root,
            fetcher: Box::new(SchemeFetcher::default()),
            identities: Box::new(HostDirectory),
            chowner: Box::new(HostChowner),
        }
    }

    /// Use `fetcher` for retrieval.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Resolve user and group names through `identities`.
    #[must_use]
    pub fn with_identities(mut self, identities: impl IdentityDirectory + 'static) -> Self {
        self.identities = Box::new(identities);
        self
    }

    /// Change ownership through `chowner`.
    #[must_use]
    pub fn with_chowner(mut self, chowner: impl Chowner + 'static) -> Self {
        self.chowner = Box::new(chowner);
        self
    }

    /// The managed root.
    #[must_use]
    pub fn root(&self) -> &DestRoot {
        &self.root
    }

    /// Plan the fetch for `file`. Nothing is touched on disk.
    ///
    /// # Errors
    ///
    /// See [`planner::prepare_fetch`].
    pub fn prepare_fetch(&self, file: &File) -> Result<FetchOp> {
        planner::prepare_fetch(file)
            .inspect_err(|e| log::error!("invalid file entry {:?}: {e}", file.node.path))
    }

    /// Resolve the node's owner, taking each of uid and gid from `default`
    /// when the node does not name one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Lookup` for an unknown or unparsable name.
    pub fn resolve_ownership(
        &self,
        node: &Node,
        default: ResolvedOwnership,
    ) -> Result<ResolvedOwnership> {
        ownership::resolve_node(self.identities.as_ref(), node, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::MockDirectory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_root_directory_reads_target_databases() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("etc")).unwrap();
        fs::write(tmp.path().join("etc/passwd"), "core:x:500:500::/home/core:/bin/sh\n").unwrap();
        fs::write(tmp.path().join("etc/group"), "wheel:x:10:\n").unwrap();

        let root = DestRoot::new(tmp.path());
        let materializer =
            Materializer::new(root.clone()).with_identities(RootDirectory::new(root));
        let node = Node::new("/home/core")
            .user(NodeOwner::name("core"))
            .group(NodeOwner::name("wheel"));
        let owner = materializer
            .resolve_ownership(&node, ResolvedOwnership::ROOT)
            .unwrap();
        assert_eq!(owner, ResolvedOwnership::new(500, 10));
    }

    #[test]
    fn test_resolve_ownership_uses_injected_directory() {
        let tmp = TempDir::new().unwrap();
        let directory = MockDirectory::new().with_group("docker", "233");
        let materializer =
            Materializer::new(DestRoot::new(tmp.path())).with_identities(directory.clone());

        let node = Node::new("/run/docker.sock").group(NodeOwner::name("docker"));
        let owner = materializer
            .resolve_ownership(&node, ResolvedOwnership::new(5, 6))
            .unwrap();
        assert_eq!(owner, ResolvedOwnership::new(5, 233));
        assert_eq!(directory.lookups(), vec!["group:docker"]);
    }

    #[test]
    fn test_prepare_fetch_does_not_touch_disk() {
        let tmp = TempDir::new().unwrap();
        let materializer = Materializer::new(DestRoot::new(tmp.path()));
        let op = materializer
            .prepare_fetch(&File::new("/etc/motd", "data:,hi"))
            .unwrap();
        assert_eq!(op.path(), "/etc/motd");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_end_to_end_data_url() {
        let tmp = TempDir::new().unwrap();
        let materializer = Materializer::new(DestRoot::new(tmp.path()))
            .with_chowner(ownership::RecordingChowner::new());

        let mut file = File::new("/etc/hostname", "data:,node-1%0A");
        file.contents.verification = Some(Verification {
            hash: Some(format!(
                "sha256-{}",
                hex::encode(<sha2::Sha256 as sha2::Digest>::digest(b"node-1\n"))
            )),
        });
        let op = materializer.prepare_fetch(&file).unwrap();
        materializer.perform_fetch(op).unwrap();
        assert_eq!(fs::read(tmp.path().join("etc/hostname")).unwrap(), b"node-1\n");
    }
}
