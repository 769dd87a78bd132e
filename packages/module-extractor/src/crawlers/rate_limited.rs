//! Rate-limited fetcher wrapper.
//!
//! Wraps any Fetcher with a shared request quota using the governor crate.
//! Concurrent fetches from one crawl batch all draw on the same limiter.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use url::Url;

use crate::error::CrawlResult;
use crate::traits::fetcher::{FetchResponse, Fetcher};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that enforces a request rate.
pub struct RateLimitedFetcher<F: Fetcher> {
    inner: F,
    limiter: Arc<DefaultRateLimiter>,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    /// Allow `requests_per_second` sustained requests. Zero is raised to one.
    pub fn new(fetcher: F, requests_per_second: u32) -> Self {
        Self::with_quota(fetcher, Quota::per_second(non_zero(requests_per_second)))
    }

    /// Sustained rate plus a burst allowance.
    pub fn with_burst(fetcher: F, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(non_zero(requests_per_second)).allow_burst(non_zero(burst));
        Self::with_quota(fetcher, quota)
    }

    pub fn with_quota(fetcher: F, quota: Quota) -> Self {
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(nonzero!(1u32))
}

#[async_trait]
impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &Url) -> CrawlResult<FetchResponse> {
        self.limiter.until_ready().await;
        self.inner.fetch(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait FetcherExt: Fetcher + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::new(self, requests_per_second)
    }

    fn rate_limited_with_burst(self, requests_per_second: u32, burst: u32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::with_burst(self, requests_per_second, burst)
    }
}

impl<F: Fetcher + Sized> FetcherExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use std::time::Instant;

    #[tokio::test]
    async fn test_rate_limiting() {
        let mock = MockFetcher::new()
            .with_page("https://docs.test/1", "Page 1")
            .with_page("https://docs.test/2", "Page 2")
            .with_page("https://docs.test/3", "Page 3");

        // 2 requests per second
        let fetcher = mock.clone().rate_limited(2);

        let start = Instant::now();
        for i in 1..=3 {
            let url = Url::parse(&format!("https://docs.test/{}", i)).unwrap();
            let response = fetcher.fetch(&url).await.unwrap();
            assert!(response.is_success());
        }
        let elapsed = start.elapsed();

        // First is immediate, 2nd and 3rd wait
        assert!(elapsed.as_millis() >= 500, "Rate limiting not working: {:?}", elapsed);
        assert_eq!(mock.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_rate_is_clamped() {
        let fetcher = MockFetcher::new().with_page("https://docs.test/", "Home").rate_limited(0);
        let url = Url::parse("https://docs.test/").unwrap();
        assert!(fetcher.fetch(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_with_burst() {
        let mock = MockFetcher::new();
        let fetcher = mock.rate_limited_with_burst(5, 10);
        assert!(fetcher.inner().calls().is_empty());
        assert_eq!(fetcher.name(), "mock");
    }
}
