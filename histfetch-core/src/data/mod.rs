//! Provider access: HTTP transport, response cache, rate limiting, Yahoo client.

pub mod cache;
pub mod http;
pub mod provider;
pub mod rate_limit;
pub mod yahoo;

pub use cache::{CacheEntry, ResponseCache};
pub use http::{CachedClient, HttpResponse, ReqwestTransport, Transport};
pub use provider::{DataError, DataSource, DateRange, HistoryProvider, HistoryRecord, HistoryTable};
pub use rate_limit::SlidingWindowLimiter;
pub use yahoo::YahooProvider;
