//! Blocking HTTP transport and the cached, rate-limited client built on it.
//!
//! Request path for [`CachedClient::get`]:
//! cache hit → return stored body (no limiter slot, no network);
//! miss → limiter wait → transport → store if 2xx.
//!
//! Every miss goes out. Error statuses are handed back to the provider, which
//! turns them into a per-symbol failure; nothing here stops later requests.

use super::cache::ResponseCache;
use super::provider::DataError;
use super::rate_limit::SlidingWindowLimiter;
use std::time::Duration;

/// Status and body of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub retry_after_secs: Option<u64>,
    pub from_cache: bool,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after_secs: None,
            from_cache: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking GET. Non-2xx statuses are returned as responses, not errors;
/// only transport-level failures are errors.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError>;
}

/// Production transport over `reqwest::blocking`.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status().as_u16();
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = resp.text().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to read response body: {e}"))
        })?;

        Ok(HttpResponse {
            status,
            body,
            retry_after_secs,
            from_cache: false,
        })
    }
}

/// HTTP client with a persistent response cache and a request-rate limiter.
/// One instance is shared by the whole run.
pub struct CachedClient<T: Transport> {
    transport: T,
    cache: ResponseCache,
    limiter: SlidingWindowLimiter,
}

impl<T: Transport> CachedClient<T> {
    pub fn new(transport: T, cache: ResponseCache, limiter: SlidingWindowLimiter) -> Self {
        Self {
            transport,
            cache,
            limiter,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse, DataError> {
        if let Some(entry) = self.cache.get(url) {
            tracing::debug!(url, "cache hit");
            return Ok(HttpResponse {
                status: entry.status,
                body: entry.body,
                retry_after_secs: None,
                from_cache: true,
            });
        }

        self.limiter.acquire();
        let resp = self.transport.get(url)?;

        if resp.is_success() {
            if let Err(e) = self.cache.put(url, &resp) {
                tracing::warn!(url, "failed to cache response: {e}");
            }
        } else {
            tracing::debug!(url, status = resp.status, "error response, not cached");
        }

        Ok(resp)
    }
}
