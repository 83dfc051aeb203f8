//! Declarative entry types.
//!
//! These are the fields of a file or link entry that materialization
//! consumes. Validating the surrounding document is the parser's job; the
//! serde derives only describe the wire shape of the fields used here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an existing node at the destination may be replaced.
///
/// The three states are handled separately everywhere: `Unset` lets a file
/// fetch clear the destination first, `Forbid` fails on any existing node,
/// and `Allow` replaces without a pre-clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Overwrite {
    /// Not specified in the document.
    #[default]
    Unset,
    /// `overwrite: false`
    Forbid,
    /// `overwrite: true`
    Allow,
}

impl From<Option<bool>> for Overwrite {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::Unset,
            Some(false) => Self::Forbid,
            Some(true) => Self::Allow,
        }
    }
}

impl From<Overwrite> for Option<bool> {
    fn from(value: Overwrite) -> Self {
        match value {
            Overwrite::Unset => None,
            Overwrite::Forbid => Some(false),
            Overwrite::Allow => Some(true),
        }
    }
}

/// A user or group reference. The numeric id always wins over the name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOwner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl NodeOwner {
    /// Reference by numeric id.
    pub fn id(id: u32) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    /// Reference by symbolic name.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Fields shared by files and links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute path inside the managed root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<NodeOwner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeOwner>,
    #[serde(default)]
    pub overwrite: Overwrite,
}

impl Node {
    /// Create a node with no ownership and unset overwrite.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the user reference.
    pub fn user(mut self, user: NodeOwner) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the group reference.
    pub fn group(mut self, group: NodeOwner) -> Self {
        self.group = Some(group);
        self
    }

    /// Set the overwrite policy.
    pub fn overwrite(mut self, overwrite: Overwrite) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Compression applied to the fetched bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    #[serde(alias = "")]
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

/// Expected digest, written as `<algorithm>-<hex>` (e.g. `sha512-4a5b...`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A single custom request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Where a file's bytes come from and how to check them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContents {
    /// Source URL. Empty means a zero-length file.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    /// Ordered; repeated names are sent as repeated headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_headers: Vec<HttpHeader>,
}

/// A file entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub contents: FileContents,
    /// Permission bits, e.g. `0o644`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default)]
    pub append: bool,
}

impl File {
    /// A file fetched from `source`.
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            node: Node::new(path),
            contents: FileContents {
                source: source.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// A link entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(flatten)]
    pub node: Node,
    /// Stored verbatim for symlinks; confined to the root for hard links.
    pub target: String,
    #[serde(default)]
    pub hard: bool,
}

impl Link {
    /// A symbolic link at `path` pointing to `target`.
    pub fn symbolic(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            node: Node::new(path),
            target: target.into(),
            hard: false,
        }
    }

    /// A hard link at `path` sharing the inode of `target`.
    pub fn hard(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            node: Node::new(path),
            target: target.into(),
            hard: true,
        }
    }
}
