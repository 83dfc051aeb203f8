//! HTTP(S) fetcher.
//!
//! Only obtaining the response is retried. Once the body starts streaming
//! into the staging file a failure is final, because a partial write cannot
//! be resumed without truncating the stage.

use super::retry::{RetryConfig, with_retry};
use super::{FetchOptions, Fetcher, SourceUrl, TransportError, copy_decompressed_verified};
use std::fs;
use ureq::http::{HeaderMap, Response};

/// Blocking HTTP(S) fetcher with retry.
pub struct HttpFetcher {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Create a fetcher with the given retry policy.
    #[must_use]
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            retry,
        }
    }

    fn get(
        &self,
        url: &SourceUrl,
        headers: Option<&HeaderMap>,
    ) -> Result<Response<ureq::Body>, TransportError> {
        let mut request = self.agent.get(url.as_str());
        if let Some(headers) = headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_bytes());
            }
        }

        request.call().map_err(|e| match e {
            ureq::Error::StatusCode(status) => TransportError::Http {
                url: url.to_string(),
                status,
            },
            other => TransportError::Network(other.to_string()),
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &SourceUrl,
        dest: &mut fs::File,
        options: FetchOptions,
    ) -> Result<(), TransportError> {
        let response = with_retry(&self.retry, url.as_str(), || {
            self.get(url, options.headers.as_ref())
        })?;
        log::debug!("fetching {url}: HTTP {}", response.status());

        let reader = response.into_body().into_reader();
        let written = copy_decompressed_verified(reader, dest, options)?;
        log::debug!("fetched {written} bytes from {url}");
        Ok(())
    }
}
