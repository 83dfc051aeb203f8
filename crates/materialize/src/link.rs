//! Hard and symbolic link creation under the managed root.

use crate::Materializer;
use crate::error::{Error, Result};
use crate::executor::mkdir_for_file;
use crate::ownership::ResolvedOwnership;
use crate::types::Link;
use std::fs;
use std::os::unix::fs::symlink;

impl Materializer {
    /// Create a hard or symbolic link.
    ///
    /// A hard link's target is confined under the root and the link takes
    /// the target's ownership, so no ownership change is made. A symlink's
    /// target is stored exactly as declared and the link itself (never its
    /// target) is chowned, defaulting to root.
    ///
    /// Fails if something already exists at the link path; run
    /// [`Materializer::delete_path_on_overwrite`] first.
    pub fn write_link(&self, link: &Link) -> Result<()> {
        self.write_link_inner(link)
            .inspect_err(|e| log::error!("failed to create link {:?}: {e}", link.node.path))
    }

    fn write_link_inner(&self, link: &Link) -> Result<()> {
        let path = self.root.join(&link.node.path)?;
        mkdir_for_file(&path)?;

        if link.hard {
            let target = self.root.join(&link.target)?;
            log::info!("hard linking {:?} -> {:?}", link.node.path, link.target);
            return fs::hard_link(&target, &path).map_err(|e| Error::io(&path, e));
        }

        log::info!("symlinking {:?} -> {:?}", link.node.path, link.target);
        symlink(&link.target, &path).map_err(|e| Error::io(&path, e))?;

        let owner = self.resolve_ownership(&link.node, ResolvedOwnership::ROOT)?;
        self.chowner
            .lchown(&path, owner)
            .map_err(|e| Error::io(&path, e))
    }
}
