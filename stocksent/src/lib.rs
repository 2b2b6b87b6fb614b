// stocksent/src/lib.rs
// Main entry point for the stocksent library

//! # stocksent
//!
//! Daily news sentiment for stock tickers, built to be gentle on a
//! rate-limited upstream news API:
//!
//! - Dual-window (per-second and per-minute) rate limiting with bounded,
//!   exponentially backed-off retries
//! - Single-flight de-duplication of identical concurrent requests
//! - Process-lifetime caching of completed sentiment windows and the ticker list
//! - Cooperative cancellation of long-running multi-day computations
//! - Local lexicon scoring and keyword extraction, plus an optional advice backend

mod base;
mod http_util;
pub mod advice;
pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod models;
pub mod news;
pub mod news_repository;
pub mod rate_limiter;
pub mod sentiment;
pub mod single_flight;
pub mod ticker;

pub use base::StockSentError;
pub use cancel::CancellationToken;
pub use client::StockSentClient;
pub use config::{AdviceConfig, Config, RateLimiterConfig};
pub use models::{CacheKey, NewsItem, SentimentDay, SentimentLevel, SentimentSummary, Ticker};
pub use news::{NewsService, OfflineNewsService};
pub use news_repository::NewsRepository;
pub use rate_limiter::RateLimiter;
pub use sentiment::{LexiconScorer, SentimentScorer};
pub use single_flight::SingleFlight;
pub use ticker::TickerRepository;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
