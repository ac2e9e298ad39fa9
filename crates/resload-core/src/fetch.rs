//! Retrieval layer.
//!
//! Reads local files from disk and fetches remote resources over HTTP,
//! revalidating against the [`RevalidationCache`] with conditional GETs.

use crate::cache::{CacheEntry, RevalidationCache};
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::reference::ResolvedReference;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// HTTP and filesystem retrieval.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: Client,
    serialize_revalidation: bool,
}

impl Fetcher {
    /// Create a fetcher from loader configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &LoaderConfig) -> Result<Self, LoadError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| LoadError::Client { source })?;

        Ok(Self {
            http,
            serialize_revalidation: config.serialize_revalidation,
        })
    }

    /// Get the HTTP client.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Retrieve the text of a resolved reference.
    ///
    /// # Errors
    /// `NotFound`/`Read` for local failures; `InvalidUrl`, `Transport`,
    /// `HttpStatus` or `Cache` for remote failures.
    pub async fn fetch(
        &self,
        reference: &ResolvedReference,
        cache: &RevalidationCache,
    ) -> Result<String, LoadError> {
        match reference {
            ResolvedReference::Local(path) => read_local(path).await,
            ResolvedReference::Remote(url) => self.fetch_remote(url, cache).await,
        }
    }

    /// Fetch a remote reference, revalidating any cached copy.
    ///
    /// # Errors
    /// See [`Fetcher::fetch`].
    pub async fn fetch_remote(
        &self,
        url: &str,
        cache: &RevalidationCache,
    ) -> Result<String, LoadError> {
        let parsed = Url::parse(url).map_err(|e| LoadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let _guard = if self.serialize_revalidation {
            Some(cache.lock(url).await)
        } else {
            None
        };

        let conditional = cache.conditional_headers(url);
        let mut request = self.http.get(parsed);
        if let Some(etag) = &conditional.if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &conditional.if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }
        debug!(
            url,
            conditional = !conditional.is_empty(),
            "Fetching remote resource"
        );

        let response = request.send().await.map_err(|source| LoadError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            // Matched against whatever is cached now, not when the request left.
            return match cache.get(url) {
                Some(entry) => {
                    debug!(url, "Not modified, serving cached body");
                    Ok(entry.body)
                }
                None => {
                    warn!(url, "Not modified response without a cache entry");
                    Err(LoadError::Cache {
                        url: url.to_string(),
                    })
                }
            };
        }

        if !status.is_success() {
            return Err(LoadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let header_text = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header_text(ETAG);
        let last_modified = header_text(LAST_MODIFIED);

        // Honours the charset in Content-Type, UTF-8 otherwise.
        let body = response.text().await.map_err(|source| LoadError::Transport {
            url: url.to_string(),
            source,
        })?;

        cache.insert(
            url,
            CacheEntry {
                etag,
                last_modified,
                body: body.clone(),
            },
        );

        Ok(body)
    }
}

/// Read a local file as UTF-8 text.
///
/// # Errors
/// `NotFound` if the path does not exist, `Read` for any other I/O fault
/// (including invalid UTF-8).
pub async fn read_local(path: &Path) -> Result<String, LoadError> {
    debug!(path = %path.display(), "Reading local resource");
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::from_io(path, e))
}

/// Synchronous variant of [`read_local`], for callers inside a running
/// script engine.
///
/// # Errors
/// See [`read_local`].
pub fn read_local_sync(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::from_io(path, e))
}
