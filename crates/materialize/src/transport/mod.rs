//! The boundary with the retrieval layer.
//!
//! A [`Fetcher`] streams a source into an already-open staging file. It owns
//! retries, decompression and digest comparison; the executor only sees
//! success or a [`TransportError`].
//!
//! # Testing
//!
//! Use [`MockFetcher`] to serve content from memory:
//!
//! ```
//! use materialize::transport::{Fetcher, FetchOptions, MockFetcher, SourceUrl};
//! use std::io::{Read, Seek};
//!
//! let mock = MockFetcher::new();
//! mock.add("https://example.com/motd", b"welcome\n".to_vec());
//!
//! let mut staged = tempfile::tempfile().unwrap();
//! let url = SourceUrl::parse("https://example.com/motd").unwrap();
//! mock.fetch(&url, &mut staged, FetchOptions::default()).unwrap();
//!
//! let mut out = String::new();
//! staged.rewind().unwrap();
//! staged.read_to_string(&mut out).unwrap();
//! assert_eq!(out, "welcome\n");
//! ```

pub mod data;
pub mod http;
pub mod retry;

use crate::hash::Hasher;
use crate::types::Compression;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use ureq::http::HeaderMap;

pub use retry::RetryConfig;

/// Errors reported by a fetcher, after its own retries.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Requested URL.
        url: String,
        /// Response status.
        status: u16,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Compressed stream could not be decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Content did not match the expected digest.
    #[error("{algorithm} digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Algorithm name.
        algorithm: String,
        /// Expected digest, hex.
        expected: String,
        /// Computed digest, hex.
        actual: String,
    },

    /// A `data:` URL is malformed.
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// No fetcher handles this scheme.
    #[error("unsupported source scheme {0:?}")]
    UnsupportedScheme(String),

    /// Content not available from the mock.
    #[error("not found: {0}")]
    NotFound(String),

    /// Writing to the staging file failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// A parsed source locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    scheme: String,
    raw: String,
}

impl SourceUrl {
    /// Parse a source locator. An empty string is a valid, empty source.
    ///
    /// # Errors
    ///
    /// Returns a message when a non-empty locator has no `scheme:` prefix.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Ok(Self {
                scheme: String::new(),
                raw: String::new(),
            });
        }

        let (scheme, _) = raw
            .split_once(':')
            .ok_or_else(|| "missing scheme".to_string())?;
        let valid = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid {
            return Err(format!("invalid scheme {scheme:?}"));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            raw: raw.to_string(),
        })
    }

    /// Lowercase scheme, empty for an empty source.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Digest sink and the bytes it must produce.
#[derive(Debug, Clone)]
pub struct VerificationSink {
    pub hasher: Hasher,
    pub expected: Vec<u8>,
}

/// Everything the retrieval layer needs besides the URL.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// `None` when the entry requests no verification.
    pub verification: Option<VerificationSink>,
    pub compression: Compression,
    /// `None` when the entry declares no custom headers.
    pub headers: Option<HeaderMap>,
}

/// Streams a source into a destination file.
pub trait Fetcher: Send + Sync {
    /// Write the full (decompressed, verified) content of `url` to `dest`.
    ///
    /// `dest` is positioned at its start and is empty.
    fn fetch(
        &self,
        url: &SourceUrl,
        dest: &mut fs::File,
        options: FetchOptions,
    ) -> Result<(), TransportError>;
}

/// Decompress `reader` into `dest`, hashing the decompressed bytes and
/// comparing against the expected digest once the stream ends.
///
/// Read-side failures are reported as `Decompression` for compressed
/// sources and `Network` otherwise; write-side failures are `Io`.
/// Returns the number of bytes written.
pub fn copy_decompressed_verified<R: Read>(
    reader: R,
    dest: &mut impl Write,
    options: FetchOptions,
) -> Result<u64, TransportError> {
    let compressed = options.compression != Compression::None;
    let decoder: Box<dyn Read + '_> = match options.compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(reader)
                .map_err(|e| TransportError::Decompression(e.to_string()))?,
        ),
    };
    let mut source = TrackedReader {
        inner: decoder,
        failed: false,
    };

    let Some(VerificationSink {
        mut hasher,
        expected,
    }) = options.verification
    else {
        return copy_stream(&mut source, dest, compressed);
    };

    let written = {
        let mut tee = TeeWriter {
            inner: dest,
            hasher: &mut hasher,
        };
        copy_stream(&mut source, &mut tee, compressed)?
    };

    let algorithm = hasher.algorithm();
    let actual = hasher.finalize();
    if actual != expected {
        return Err(TransportError::DigestMismatch {
            algorithm: algorithm.to_string(),
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }

    Ok(written)
}

fn copy_stream<R: Read>(
    source: &mut TrackedReader<R>,
    sink: &mut impl Write,
    compressed: bool,
) -> Result<u64, TransportError> {
    match io::copy(source, sink) {
        Ok(n) => Ok(n),
        Err(e) if source.failed && compressed => Err(TransportError::Decompression(e.to_string())),
        Err(e) if source.failed => Err(TransportError::Network(e.to_string())),
        Err(e) => Err(TransportError::Io(e)),
    }
}

/// Remembers whether an error came from the read side of a copy.
struct TrackedReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed = true)
    }
}

struct TeeWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut Hasher,
}

impl<W: Write> Write for TeeWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Default fetcher: dispatches on the source scheme.
///
/// | Scheme            | Handler              |
/// |-------------------|----------------------|
/// | (empty source)    | zero-length content  |
/// | `http`, `https`   | [`http::HttpFetcher`] |
/// | `data`            | [`data::decode`]     |
pub struct SchemeFetcher {
    http: http::HttpFetcher,
}

impl SchemeFetcher {
    /// Create a fetcher with the given HTTP retry policy.
    #[must_use]
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            http: http::HttpFetcher::new(retry),
        }
    }
}

impl Default for SchemeFetcher {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl Fetcher for SchemeFetcher {
    fn fetch(
        &self,
        url: &SourceUrl,
        dest: &mut fs::File,
        options: FetchOptions,
    ) -> Result<(), TransportError> {
        match url.scheme() {
            "" => copy_decompressed_verified(io::empty(), dest, FetchOptions {
                compression: Compression::None,
                ..options
            })
            .map(|_| ()),
            "http" | "https" => self.http.fetch(url, dest, options),
            "data" => {
                let bytes = data::decode(url.as_str())?;
                copy_decompressed_verified(bytes.as_slice(), dest, options).map(|_| ())
            }
            other => Err(TransportError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// In-memory fetcher for tests.
///
/// Content is keyed by the full URL string. Every requested URL is recorded
/// so tests can assert what was (or was not) fetched.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    content: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    /// Create a new empty mock fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    pub fn add(&self, url: impl Into<String>, bytes: Vec<u8>) {
        let mut content = self.content.lock().unwrap();
        content.insert(url.into(), bytes);
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(
        &self,
        url: &SourceUrl,
        dest: &mut fs::File,
        options: FetchOptions,
    ) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        if url.is_empty() {
            return copy_decompressed_verified(io::empty(), dest, options).map(|_| ());
        }

        let bytes = self
            .content
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| TransportError::NotFound(url.to_string()))?;
        copy_decompressed_verified(bytes.as_slice(), dest, options).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use std::io::{Seek, SeekFrom};

    fn sink(algorithm: HashAlgorithm, content: &[u8]) -> VerificationSink {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(content);
        VerificationSink {
            hasher: Hasher::new(algorithm),
            expected: hasher.finalize(),
        }
    }

    fn read_back(file: &mut fs::File) -> Vec<u8> {
        let mut out = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_source_url_parse() {
        let url = SourceUrl::parse("HTTPS://example.com/x").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.as_str(), "HTTPS://example.com/x");

        let empty = SourceUrl::parse("").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.scheme(), "");

        assert!(SourceUrl::parse("/etc/passwd").is_err());
        assert!(SourceUrl::parse("1http://x").is_err());
    }

    #[test]
    fn test_copy_plain() {
        let mut out = Vec::new();
        let n = copy_decompressed_verified(&b"hello"[..], &mut out, FetchOptions::default())
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_copy_gzip_verified_on_decompressed_bytes() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"compressed payload").unwrap();
        let gz = encoder.finish().unwrap();

        let options = FetchOptions {
            verification: Some(sink(HashAlgorithm::Sha512, b"compressed payload")),
            compression: Compression::Gzip,
            headers: None,
        };
        let mut out = Vec::new();
        copy_decompressed_verified(gz.as_slice(), &mut out, options).unwrap();
        assert_eq!(out, b"compressed payload");
    }

    #[test]
    fn test_copy_zstd() {
        let compressed = zstd::encode_all(&b"zstd payload"[..], 3).unwrap();
        let options = FetchOptions {
            compression: Compression::Zstd,
            ..Default::default()
        };
        let mut out = Vec::new();
        copy_decompressed_verified(compressed.as_slice(), &mut out, options).unwrap();
        assert_eq!(out, b"zstd payload");
    }

    #[test]
    fn test_copy_bad_gzip() {
        let options = FetchOptions {
            compression: Compression::Gzip,
            ..Default::default()
        };
        let mut out = Vec::new();
        let result = copy_decompressed_verified(&b"not gzip at all"[..], &mut out, options);
        assert!(matches!(result, Err(TransportError::Decompression(_))));
    }

    #[test]
    fn test_copy_digest_mismatch() {
        let options = FetchOptions {
            verification: Some(sink(HashAlgorithm::Sha256, b"expected")),
            ..Default::default()
        };
        let mut out = Vec::new();
        let result = copy_decompressed_verified(&b"tampered"[..], &mut out, options);
        assert!(matches!(result, Err(TransportError::DigestMismatch { .. })));
    }

    #[test]
    fn test_scheme_fetcher_empty_and_data() {
        let fetcher = SchemeFetcher::default();

        let mut staged = tempfile::tempfile().unwrap();
        fetcher
            .fetch(&SourceUrl::parse("").unwrap(), &mut staged, FetchOptions::default())
            .unwrap();
        assert!(read_back(&mut staged).is_empty());

        let mut staged = tempfile::tempfile().unwrap();
        fetcher
            .fetch(
                &SourceUrl::parse("data:,foo%3Dbar").unwrap(),
                &mut staged,
                FetchOptions::default(),
            )
            .unwrap();
        assert_eq!(read_back(&mut staged), b"foo=bar");
    }

    #[test]
    fn test_scheme_fetcher_unsupported() {
        let fetcher = SchemeFetcher::default();
        let mut staged = tempfile::tempfile().unwrap();
        let result = fetcher.fetch(
            &SourceUrl::parse("tftp://10.0.0.1/motd").unwrap(),
            &mut staged,
            FetchOptions::default(),
        );
        assert!(matches!(result, Err(TransportError::UnsupportedScheme(s)) if s == "tftp"));
    }

    #[test]
    fn test_mock_fetcher_records_requests() {
        let mock = MockFetcher::new();
        mock.add("https://example.com/a", b"a".to_vec());

        let mut staged = tempfile::tempfile().unwrap();
        mock.fetch(
            &SourceUrl::parse("https://example.com/a").unwrap(),
            &mut staged,
            FetchOptions::default(),
        )
        .unwrap();
        let missing = mock.fetch(
            &SourceUrl::parse("https://example.com/b").unwrap(),
            &mut staged,
            FetchOptions::default(),
        );

        assert!(matches!(missing, Err(TransportError::NotFound(_))));
        assert_eq!(
            mock.requests(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(
            TransportError::Http {
                url: "u".into(),
                status: 503
            }
            .is_retryable()
        );
        assert!(
            !TransportError::Http {
                url: "u".into(),
                status: 404
            }
            .is_retryable()
        );
        assert!(!TransportError::Decompression("x".into()).is_retryable());
    }
}
