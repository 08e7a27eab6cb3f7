//! Shared HTTP fetch helper for protocol clients.
//!
//! Redirects are never followed by the HTTP client itself: a release URL may
//! redirect to a magnet link, which only the caller knows how to handle.

use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ReleaseDownloadError;

const MAX_REDIRECTS: usize = 5;

/// Raw response of a single GET, redirects not followed.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, ReleaseDownloadError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ReleaseDownloadError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("pezzottify-acquisition/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReleaseDownloadError::fetch("", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, ReleaseDownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReleaseDownloadError::fetch(url, e))?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .bytes()
            .await
            .map_err(|e| ReleaseDownloadError::fetch(url, e))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            location,
            retry_after,
            body: body.to_vec(),
        })
    }
}

/// Outcome of fetching a release file.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRelease {
    File(Vec<u8>),
    /// The URL redirected to a magnet link.
    Magnet(String),
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn resolve_location(base: &str, location: &str) -> String {
    match reqwest::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(url) => url.to_string(),
        Err(_) => location.to_string(),
    }
}

/// Fetches a torrent or NZB file, following redirects by hand.
pub async fn fetch_release_file(
    fetcher: &dyn HttpFetch,
    url: &str,
) -> Result<FetchedRelease, ReleaseDownloadError> {
    let mut current = url.to_string();

    for _ in 0..=MAX_REDIRECTS {
        let response = fetcher.get(&current).await?;

        if is_redirect(response.status) {
            let Some(location) = response.location else {
                return Err(ReleaseDownloadError::fetch(
                    &current,
                    "redirect without location",
                ));
            };
            if location.starts_with("magnet:") {
                debug!("{} redirected to magnet link", current);
                return Ok(FetchedRelease::Magnet(location));
            }
            let next = resolve_location(&current, &location);
            debug!("{} redirected to {}", current, next);
            current = next;
            continue;
        }

        return match response.status {
            404 => Err(ReleaseDownloadError::ReleaseUnavailable(current)),
            429 => {
                warn!("API Grab Limit reached for {}", current);
                Err(ReleaseDownloadError::TooManyRequests {
                    url: current,
                    retry_after: response.retry_after,
                })
            }
            200..=299 => Ok(FetchedRelease::File(response.body)),
            status => Err(ReleaseDownloadError::fetch(
                &current,
                format!("unexpected status {}", status),
            )),
        };
    }

    Err(ReleaseDownloadError::fetch(url, "too many redirects"))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses keyed by URL and records every request.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub responses: HashMap<String, FetchResponse>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, status: u16, body: &[u8]) -> Self {
            self.responses.insert(
                url.to_string(),
                FetchResponse {
                    status,
                    location: None,
                    retry_after: None,
                    body: body.to_vec(),
                },
            );
            self
        }

        pub fn with_redirect(mut self, url: &str, location: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                FetchResponse {
                    status: 302,
                    location: Some(location.to_string()),
                    retry_after: None,
                    body: Vec::new(),
                },
            );
            self
        }

        pub fn with_retry_after(mut self, url: &str, secs: u64) -> Self {
            self.responses.insert(
                url.to_string(),
                FetchResponse {
                    status: 429,
                    location: None,
                    retry_after: Some(Duration::from_secs(secs)),
                    body: Vec::new(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl HttpFetch for FakeFetcher {
        async fn get(&self, url: &str) -> Result<FetchResponse, ReleaseDownloadError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| ReleaseDownloadError::fetch(url, "connection refused"))
        }
    }
}
