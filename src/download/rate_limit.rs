//! Per-host spacing of release fetches.
//!
//! Indexers throttle aggressive grabbers, so consecutive fetches against the
//! same host are spaced by a minimum interval. Callers reserve the next free
//! slot and sleep until it arrives; the lock is never held while sleeping.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct HostRateLimiter {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Default for HostRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRateLimiter {
    pub fn new() -> Self {
        Self {
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Host part of a URL, used as the limiter key.
    pub fn host_key(url: &str) -> Option<String> {
        reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    /// Waits until `host` may be hit again and reserves the following slot.
    pub async fn wait_and_pulse(&self, host: &str, interval: Duration) {
        if interval.is_zero() {
            return;
        }

        let wait_until = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots
                .get(host)
                .copied()
                .filter(|slot| *slot > now)
                .unwrap_or(now);
            slots.insert(host.to_string(), slot + interval);
            slot
        };

        let now = Instant::now();
        if wait_until > now {
            debug!(
                "Delaying request to {} for {:?}",
                host,
                wait_until - now
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key() {
        assert_eq!(
            HostRateLimiter::host_key("https://Indexer.Test/api?t=get"),
            Some("indexer.test".to_string())
        );
        assert_eq!(HostRateLimiter::host_key("magnet:?xt=urn:btih:abc"), None);
        assert_eq!(HostRateLimiter::host_key("not a url"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let limiter = HostRateLimiter::new();
        let interval = Duration::from_secs(2);
        let start = Instant::now();

        limiter.wait_and_pulse("indexer.test", interval).await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.wait_and_pulse("indexer.test", interval).await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        limiter.wait_and_pulse("indexer.test", interval).await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let limiter = HostRateLimiter::new();
        let interval = Duration::from_secs(2);
        let start = Instant::now();

        limiter.wait_and_pulse("a.test", interval).await;
        limiter.wait_and_pulse("b.test", interval).await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
