use anyhow::{Context, Result};
use materialize::{File, Link};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Files and links to land, in order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub files: Vec<File>,
    pub links: Vec<Link>,
}

impl Document {
    /// Parse a JSON document. Empty (or all-whitespace) input is an empty
    /// document: no config was supplied.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).context("Invalid document format")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("Could not parse {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use materialize::{Compression, Overwrite};

    #[test]
    fn test_empty_input_is_empty_document() {
        assert!(Document::parse(b"").unwrap().is_empty());
        assert!(Document::parse(b" \n").unwrap().is_empty());
        assert!(Document::parse(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_files_and_links() {
        let doc = Document::parse(
            br#"{
  "files": [
    {
      "path": "/etc/motd",
      "overwrite": false,
      "user": {"name": "core"},
      "mode": 420,
      "contents": {
        "source": "data:,hi",
        "compression": "gzip",
        "httpHeaders": [{"name": "Accept", "value": "*/*"}]
      }
    }
  ],
  "links": [
    {"path": "/etc/localtime", "target": "/usr/share/zoneinfo/UTC", "overwrite": true}
  ]
}"#,
        )
        .unwrap();

        assert_eq!(doc.files.len(), 1);
        let file = &doc.files[0];
        assert_eq!(file.node.path, "/etc/motd");
        assert_eq!(file.node.overwrite, Overwrite::Forbid);
        assert_eq!(file.mode, Some(0o644));
        assert_eq!(file.contents.compression, Compression::Gzip);
        assert_eq!(file.contents.http_headers.len(), 1);

        assert_eq!(doc.links.len(), 1);
        assert!(!doc.links[0].hard);
        assert_eq!(doc.links[0].node.overwrite, Overwrite::Allow);
    }

    #[test]
    fn test_parse_error() {
        assert!(Document::parse(b"{\"files\": 3}").is_err());
    }
}
