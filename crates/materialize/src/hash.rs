//! Digest algorithms for content verification.

use crate::error::{Error, Result};
use sha2::Digest;
use std::fmt;
use std::io;
use std::str::FromStr;

/// Supported verification algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    /// Name as written in a verification string.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unrecognized hash function {other:?}")),
        }
    }
}

/// Split `sha512-<hex>` into its algorithm and decoded digest.
///
/// # Errors
///
/// Returns `Error::VerificationSpec` when the separator is missing, the
/// algorithm is unknown, the hex does not decode, or the digest has the
/// wrong length for its algorithm.
pub fn parse_verification(spec: &str) -> Result<(HashAlgorithm, Vec<u8>)> {
    let fail = |message: String| Error::VerificationSpec {
        spec: spec.to_string(),
        message,
    };

    let (name, digest) = spec
        .split_once('-')
        .ok_or_else(|| fail("expected <algorithm>-<digest>".to_string()))?;
    let algorithm: HashAlgorithm = name.parse().map_err(fail)?;
    let expected = hex::decode(digest).map_err(|e| fail(e.to_string()))?;

    if expected.len() != algorithm.digest_len() {
        return Err(fail(format!(
            "{} digest must be {} bytes, got {}",
            algorithm,
            algorithm.digest_len(),
            expected.len()
        )));
    }

    Ok((algorithm, expected))
}

/// A running digest over everything written to it.
#[derive(Clone)]
pub enum Hasher {
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    /// Start a fresh digest.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha256(_) => HashAlgorithm::Sha256,
            Self::Sha512(_) => HashAlgorithm::Sha512,
            Self::Blake3(_) => HashAlgorithm::Blake3,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Consume the hasher and return the raw digest.
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hasher").field(&self.algorithm()).finish()
    }
}

impl io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
