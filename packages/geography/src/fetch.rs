//! Resource fetchers.
//!
//! A [`ResourceFetcher`] turns a resource address into its text body. The
//! HTTP fetcher is used against the published dataset; the local fetcher
//! reads a mirrored directory; the static fetcher serves bodies from memory
//! for offline runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::config::ResourceConfig;
use crate::{GeoError, retry};

/// Browser-like User-Agent; some static hosts reject the default one.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; areashift/0.1)";

/// Per-request timeout for resource downloads.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Fetches the text body of a published resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Returns the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the resource cannot be fetched.
    async fn fetch_text(&self, url: &str) -> Result<String, GeoError>;
}

/// Fetches resources over HTTP with retry.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher with its own `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the client cannot be built.
    pub fn new() -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, GeoError> {
        log::info!("Downloading {url}");
        retry::send_text(|| self.client.get(url)).await
    }
}

/// Reads resources from a local mirror of the published layout.
pub struct LocalFetcher;

#[async_trait]
impl ResourceFetcher for LocalFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, GeoError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        log::info!("Reading {path}");
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GeoError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

/// Serves resource bodies from memory and records every request.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: BTreeMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Creates an empty fetcher; every request fails until bodies are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` as the content of `url`.
    #[must_use]
    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Number of requests made for `url` so far.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, GeoError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        self.bodies.get(url).cloned().ok_or_else(|| GeoError::Fetch {
            url: url.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        })
    }
}

/// Picks the fetcher matching the configured base address.
///
/// # Errors
///
/// Returns [`GeoError`] if the HTTP client cannot be built.
pub fn fetcher_for(config: &ResourceConfig) -> Result<Box<dyn ResourceFetcher>, GeoError> {
    if config.is_remote() {
        Ok(Box::new(HttpFetcher::new()?))
    } else {
        Ok(Box::new(LocalFetcher))
    }
}
