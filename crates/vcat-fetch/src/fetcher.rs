//! Image retrieval for template image URLs.
//!
//! Successful downloads are cached by URL for the lifetime of the fetcher.
//! Failures are never cached and resolve to the fallback image.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// A 1×1 transparent PNG used when no fallback image is configured.
pub const BUILTIN_FALLBACK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Result of resolving one image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Fetched(Arc<Vec<u8>>),
    /// The download failed; carries the fallback bytes.
    Fallback(Arc<Vec<u8>>),
}

impl ImageOutcome {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            ImageOutcome::Fetched(b) | ImageOutcome::Fallback(b) => b,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, ImageOutcome::Fallback(_))
    }
}

/// Anything that can turn an image URL into bytes. Resolution never fails:
/// an unreachable image resolves to a fallback.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn resolve(&self, url: &str) -> ImageOutcome;
}

/// HTTP image fetcher with a per-URL success cache.
pub struct ImageFetcher {
    client: Client,
    fallback: Arc<Vec<u8>>,
    cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl ImageFetcher {
    /// Creates a fetcher with a request timeout, `User-Agent` and fallback
    /// image. `None` uses [`BUILTIN_FALLBACK_PNG`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        fallback: Option<Vec<u8>>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            fallback: Arc::new(fallback.unwrap_or_else(|| BUILTIN_FALLBACK_PNG.to_vec())),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Download `url` without consulting the cache.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for transport errors, non-2xx statuses and
    /// empty bodies.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(body.to_vec())
    }

    /// Number of cached successful downloads.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn cache_get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    fn cache_put(&self, url: &str, bytes: Arc<Vec<u8>>) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), bytes);
    }
}

#[async_trait]
impl ImageSource for ImageFetcher {
    async fn resolve(&self, url: &str) -> ImageOutcome {
        if let Some(hit) = self.cache_get(url) {
            return ImageOutcome::Fetched(hit);
        }

        match self.fetch(url).await {
            Ok(bytes) => {
                let bytes = Arc::new(bytes);
                self.cache_put(url, Arc::clone(&bytes));
                ImageOutcome::Fetched(bytes)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "image fetch failed; using fallback");
                ImageOutcome::Fallback(Arc::clone(&self.fallback))
            }
        }
    }
}

/// Read a configured fallback image from disk.
///
/// # Errors
///
/// Returns [`FetchError::FallbackImage`] if the file cannot be read.
pub async fn load_fallback_image(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| FetchError::FallbackImage {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fallback_is_a_png() {
        assert_eq!(&BUILTIN_FALLBACK_PNG[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn outcome_exposes_bytes_and_kind() {
        let outcome = ImageOutcome::Fallback(Arc::new(vec![1, 2, 3]));
        assert!(outcome.is_fallback());
        assert_eq!(outcome.bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn malformed_url_resolves_to_fallback() {
        let fetcher = ImageFetcher::new(5, "vcat-test/0.1", Some(vec![7])).unwrap();
        let outcome = fetcher.resolve("not a url").await;
        assert_eq!(outcome, ImageOutcome::Fallback(Arc::new(vec![7])));
        assert_eq!(fetcher.cached(), 0);
    }
}
