//! Turn a declared file into an immutable fetch plan.

use crate::error::{Error, Result};
use crate::hash::{Hasher, parse_verification};
use crate::transport::{FetchOptions, SourceUrl, VerificationSink};
use crate::types::{File, HttpHeader, Node, Overwrite};
use ureq::http::{HeaderMap, HeaderName, HeaderValue};

/// Everything needed to land one file. Built once by [`prepare_fetch`],
/// consumed by value by the executor.
#[derive(Debug)]
pub struct FetchOp {
    pub(crate) url: SourceUrl,
    pub(crate) options: FetchOptions,
    pub(crate) mode: Option<u32>,
    pub(crate) overwrite: Overwrite,
    pub(crate) append: bool,
    pub(crate) node: Node,
}

impl FetchOp {
    /// Declared destination path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.node.path
    }

    #[must_use]
    pub fn url(&self) -> &SourceUrl {
        &self.url
    }

    #[must_use]
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    #[must_use]
    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    #[must_use]
    pub fn overwrite(&self) -> Overwrite {
        self.overwrite
    }

    #[must_use]
    pub fn append(&self) -> bool {
        self.append
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }
}

/// Build the plan for `file`.
///
/// # Errors
///
/// - `Error::InvalidSource` if the source has no scheme
/// - `Error::VerificationSpec` if the verification string is malformed
/// - `Error::HeaderParse` if a custom header is not a valid HTTP header
pub fn prepare_fetch(file: &File) -> Result<FetchOp> {
    let source = &file.contents.source;
    let url = SourceUrl::parse(source).map_err(|message| Error::InvalidSource {
        source_url: source.clone(),
        message,
    })?;

    let verification = match file
        .contents
        .verification
        .as_ref()
        .and_then(|v| v.hash.as_deref())
    {
        Some(spec) => {
            let (algorithm, expected) = parse_verification(spec)?;
            Some(VerificationSink {
                hasher: Hasher::new(algorithm),
                expected,
            })
        }
        None => None,
    };

    let headers = if file.contents.http_headers.is_empty() {
        None
    } else {
        Some(parse_headers(&file.contents.http_headers)?)
    };

    Ok(FetchOp {
        url,
        options: FetchOptions {
            verification,
            compression: file.contents.compression,
            headers,
        },
        mode: file.mode,
        overwrite: file.node.overwrite,
        append: file.append,
        node: file.node.clone(),
    })
}

/// Convert declared headers into a transport header map, keeping order and
/// repeats. Headers without a value are skipped.
fn parse_headers(headers: &[HttpHeader]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        let fail = |message: String| Error::HeaderParse {
            name: header.name.clone(),
            message,
        };
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| fail(e.to_string()))?;
        let Some(value) = header.value.as_deref() else {
            continue;
        };
        let value = HeaderValue::from_str(value).map_err(|e| fail(e.to_string()))?;
        map.append(name, value);
    }
    Ok(map)
}
