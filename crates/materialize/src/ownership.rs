//! User and group resolution, and the ownership-change primitives.
//!
//! Resolution order for each of user and group, independently:
//!
//! 1. no reference → the caller's default
//! 2. numeric id → that id, the name is never consulted
//! 3. non-empty name → looked up in an [`IdentityDirectory`], the returned
//!    text parsed as a decimal id
//!
//! Directories return raw text so the parse step (and its failure) is the
//! same for every backing store.

use crate::error::{Error, IdentityKind, Result};
use crate::root::DestRoot;
use crate::types::{Node, NodeOwner};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A concrete `(uid, gid)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedOwnership {
    pub uid: u32,
    pub gid: u32,
}

impl ResolvedOwnership {
    /// `root:root`, the default for new files and symlinks.
    pub const ROOT: Self = Self { uid: 0, gid: 0 };

    #[must_use]
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Source of name → id mappings.
pub trait IdentityDirectory: Send + Sync {
    /// Raw uid text for a user name, `None` if the user does not exist.
    fn lookup_user(&self, name: &str) -> io::Result<Option<String>>;

    /// Raw gid text for a group name, `None` if the group does not exist.
    fn lookup_group(&self, name: &str) -> io::Result<Option<String>>;
}

/// Resolve one owner reference against `default`.
///
/// # Errors
///
/// Returns `Error::Lookup` naming `name` if it is unknown, the directory
/// fails, or the returned id does not parse.
pub fn resolve_id(
    directory: &dyn IdentityDirectory,
    kind: IdentityKind,
    owner: Option<&NodeOwner>,
    default: u32,
) -> Result<u32> {
    let Some(owner) = owner else {
        return Ok(default);
    };
    if let Some(id) = owner.id {
        return Ok(id);
    }
    let name = match owner.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(default),
    };

    let lookup_failed = |reason: String| Error::Lookup {
        kind,
        name: name.to_string(),
        reason,
    };
    let raw = match kind {
        IdentityKind::User => directory.lookup_user(name),
        IdentityKind::Group => directory.lookup_group(name),
    }
    .map_err(|e| lookup_failed(e.to_string()))?
    .ok_or_else(|| lookup_failed("not found".to_string()))?;

    raw.trim()
        .parse::<u32>()
        .map_err(|e| lookup_failed(format!("couldn't parse id {raw:?}: {e}")))
}

/// Resolve a node's user and group, falling back to `default` for each.
pub fn resolve_node(
    directory: &dyn IdentityDirectory,
    node: &Node,
    default: ResolvedOwnership,
) -> Result<ResolvedOwnership> {
    let uid = resolve_id(directory, IdentityKind::User, node.user.as_ref(), default.uid)?;
    let gid = resolve_id(directory, IdentityKind::Group, node.group.as_ref(), default.gid)?;
    Ok(ResolvedOwnership { uid, gid })
}

/// Lookups against the running system's passwd and group databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDirectory;

impl IdentityDirectory for HostDirectory {
    fn lookup_user(&self, name: &str) -> io::Result<Option<String>> {
        nix::unistd::User::from_name(name)
            .map(|user| user.map(|u| u.uid.as_raw().to_string()))
            .map_err(io::Error::from)
    }

    fn lookup_group(&self, name: &str) -> io::Result<Option<String>> {
        nix::unistd::Group::from_name(name)
            .map(|group| group.map(|g| g.gid.as_raw().to_string()))
            .map_err(io::Error::from)
    }
}

/// Lookups against `etc/passwd` and `etc/group` inside a managed root, so
/// names resolve the way the provisioned system will see them.
#[derive(Debug, Clone)]
pub struct RootDirectory {
    root: DestRoot,
}

impl RootDirectory {
    #[must_use]
    pub fn new(root: DestRoot) -> Self {
        Self { root }
    }

    fn lookup(&self, database: &str, name: &str) -> io::Result<Option<String>> {
        let path = self
            .root
            .join(database)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let content = fs::read_to_string(&path)?;
        Ok(find_id(&content, name))
    }
}

impl IdentityDirectory for RootDirectory {
    fn lookup_user(&self, name: &str) -> io::Result<Option<String>> {
        self.lookup("/etc/passwd", name)
    }

    fn lookup_group(&self, name: &str) -> io::Result<Option<String>> {
        self.lookup("/etc/group", name)
    }
}

/// Third field of the first `name:...` line. Both passwd and group keep
/// the id there.
fn find_id(database: &str, name: &str) -> Option<String> {
    database
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split(':');
            (fields.next() == Some(name))
                .then(|| fields.nth(1).map(str::to_string))
                .flatten()
        })
}

/// In-memory directory for tests.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    users: HashMap<String, String>,
    groups: HashMap<String, String>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl MockDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with raw id text.
    #[must_use]
    pub fn with_user(mut self, name: &str, id: &str) -> Self {
        self.users.insert(name.to_string(), id.to_string());
        self
    }

    /// Add a group with raw id text.
    #[must_use]
    pub fn with_group(mut self, name: &str, id: &str) -> Self {
        self.groups.insert(name.to_string(), id.to_string());
        self
    }

    /// Names looked up so far, as `user:<name>` or `group:<name>`.
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl IdentityDirectory for MockDirectory {
    fn lookup_user(&self, name: &str) -> io::Result<Option<String>> {
        self.lookups.lock().unwrap().push(format!("user:{name}"));
        Ok(self.users.get(name).cloned())
    }

    fn lookup_group(&self, name: &str) -> io::Result<Option<String>> {
        self.lookups.lock().unwrap().push(format!("group:{name}"));
        Ok(self.groups.get(name).cloned())
    }
}

/// Ownership-change primitives.
pub trait Chowner: Send + Sync {
    /// Change ownership, following a symlink at `path`.
    fn chown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()>;

    /// Change ownership of `path` itself, never following a symlink.
    fn lchown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()>;
}

/// Real `chown(2)` / `lchown(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostChowner;

impl Chowner for HostChowner {
    fn chown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()> {
        std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid))
    }

    fn lchown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()> {
        std::os::unix::fs::lchown(path, Some(owner.uid), Some(owner.gid))
    }
}

/// A recorded ownership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChownCall {
    Follow(std::path::PathBuf, ResolvedOwnership),
    NoFollow(std::path::PathBuf, ResolvedOwnership),
}

/// Records calls instead of changing anything, so ownership behavior can be
/// tested without privileges.
#[derive(Debug, Clone, Default)]
pub struct RecordingChowner {
    calls: Arc<Mutex<Vec<ChownCall>>>,
}

impl RecordingChowner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ChownCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Chowner for RecordingChowner {
    fn chown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ChownCall::Follow(path.to_path_buf(), owner));
        Ok(())
    }

    fn lchown(&self, path: &Path, owner: ResolvedOwnership) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ChownCall::NoFollow(path.to_path_buf(), owner));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn directory() -> MockDirectory {
        MockDirectory::new()
            .with_user("core", "500")
            .with_user("broken", "five hundred")
            .with_group("wheel", "10")
    }

    #[test]
    fn test_absent_spec_returns_default() {
        let dir = directory();
        let node = Node::new("/etc/motd");
        let owner = resolve_node(&dir, &node, ResolvedOwnership::new(7, 8)).unwrap();
        assert_eq!(owner, ResolvedOwnership::new(7, 8));
        assert!(dir.lookups().is_empty());
    }

    #[test]
    fn test_id_wins_over_name_without_lookup() {
        let dir = directory();
        let node = Node::new("/etc/motd")
            .user(NodeOwner {
                id: Some(42),
                name: Some("core".to_string()),
            })
            .group(NodeOwner {
                id: Some(43),
                name: Some("wheel".to_string()),
            });

        let owner = resolve_node(&dir, &node, ResolvedOwnership::ROOT).unwrap();
        assert_eq!(owner, ResolvedOwnership::new(42, 43));
        assert!(dir.lookups().is_empty());
    }

    #[test]
    fn test_name_only_group_resolves() {
        let dir = directory();
        let node = Node::new("/etc/sudoers.d/wheel").group(NodeOwner::name("wheel"));
        let owner = resolve_node(&dir, &node, ResolvedOwnership::ROOT).unwrap();
        assert_eq!(owner, ResolvedOwnership::new(0, 10));
        assert_eq!(dir.lookups(), vec!["group:wheel"]);
    }

    #[test]
    fn test_empty_name_returns_default() {
        let dir = directory();
        let node = Node::new("/x").user(NodeOwner::name(""));
        let owner = resolve_node(&dir, &node, ResolvedOwnership::new(3, 4)).unwrap();
        assert_eq!(owner, ResolvedOwnership::new(3, 4));
        assert!(dir.lookups().is_empty());
    }

    #[test]
    fn test_unknown_name_is_lookup_error() {
        let dir = directory();
        let node = Node::new("/x").user(NodeOwner::name("nobody-here"));
        let err = resolve_node(&dir, &node, ResolvedOwnership::ROOT).unwrap_err();
        match err {
            Error::Lookup { kind, name, .. } => {
                assert_eq!(kind, IdentityKind::User);
                assert_eq!(name, "nobody-here");
            }
            other => panic!("expected Lookup, got {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_id_is_lookup_error() {
        let dir = directory();
        let node = Node::new("/x").user(NodeOwner::name("broken"));
        let err = resolve_node(&dir, &node, ResolvedOwnership::ROOT).unwrap_err();
        assert!(matches!(err, Error::Lookup { ref name, .. } if name == "broken"));
        assert!(err.to_string().contains("five hundred"));
    }

    #[test]
    fn test_find_id() {
        let passwd = "\
# comment:x:1:1
root:x:0:0:root:/root:/bin/bash
core:x:500:500:CoreOS Admin:/home/core:/bin/bash
";
        assert_eq!(find_id(passwd, "root"), Some("0".to_string()));
        assert_eq!(find_id(passwd, "core"), Some("500".to_string()));
        assert_eq!(find_id(passwd, "cor"), None);
        assert_eq!(find_id("truncated", "truncated"), None);
    }

    #[test]
    fn test_root_directory_reads_target_databases() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("etc")).unwrap();
        fs::write(
            tmp.path().join("etc/passwd"),
            "root:x:0:0::/root:/bin/sh\ncore:x:500:500::/home/core:/bin/sh\n",
        )
        .unwrap();
        fs::write(tmp.path().join("etc/group"), "root:x:0:\nwheel:x:10:core\n").unwrap();

        let dir = RootDirectory::new(DestRoot::new(tmp.path()));
        let node = Node::new("/home/core/.profile")
            .user(NodeOwner::name("core"))
            .group(NodeOwner::name("wheel"));
        let owner = resolve_node(&dir, &node, ResolvedOwnership::ROOT).unwrap();
        assert_eq!(owner, ResolvedOwnership::new(500, 10));
    }

    #[test]
    fn test_root_directory_missing_database() {
        let tmp = TempDir::new().unwrap();
        let dir = RootDirectory::new(DestRoot::new(tmp.path()));
        let node = Node::new("/x").user(NodeOwner::name("core"));
        assert!(matches!(
            resolve_node(&dir, &node, ResolvedOwnership::ROOT),
            Err(Error::Lookup { .. })
        ));
    }

    #[test]
    fn test_host_directory_root_user() {
        let dir = HostDirectory;
        assert_eq!(dir.lookup_user("root").unwrap(), Some("0".to_string()));
        assert_eq!(
            dir.lookup_user("no-such-user-for-materialize-tests").unwrap(),
            None
        );
    }

    #[test]
    fn test_recording_chowner() {
        let chowner = RecordingChowner::new();
        chowner
            .chown(Path::new("/a"), ResolvedOwnership::new(1, 2))
            .unwrap();
        chowner.lchown(Path::new("/b"), ResolvedOwnership::ROOT).unwrap();
        assert_eq!(
            chowner.calls(),
            vec![
                ChownCall::Follow("/a".into(), ResolvedOwnership::new(1, 2)),
                ChownCall::NoFollow("/b".into(), ResolvedOwnership::ROOT),
            ]
        );
    }
}
