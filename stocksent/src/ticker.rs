// stocksent/src/ticker.rs

//! Ticker universe: the Finnhub symbol-list collaborator and the
//! process-lifetime [`TickerRepository`] in front of it.

use crate::base::StockSentError;
use crate::cancel::CancellationToken;
use crate::config::RateLimiterConfig;
use crate::http_util::{build_client, endpoint, send_for_text};
use crate::models::Ticker;
use crate::rate_limiter::RateLimiter;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickerService: Send + Sync {
  async fn fetch_all(&self) -> Result<Vec<Ticker>, StockSentError>;
}

#[derive(Debug, Deserialize)]
struct RawSymbol {
  symbol: String,
  description: String,
  #[serde(rename = "type", default)]
  kind: Option<String>,
}

/// Decode a `stock/symbol` payload, keeping common stock with a usable name.
pub fn parse_symbols(body: &str) -> Result<Vec<Ticker>, StockSentError> {
  let raws: Vec<RawSymbol> = serde_json::from_str(body)?;
  Ok(
    raws
      .into_iter()
      .filter(|raw| raw.kind.as_deref().map_or(true, |k| k.to_lowercase().contains("common")))
      .filter(|raw| !raw.description.trim().is_empty())
      .map(|raw| Ticker::new(raw.symbol, raw.description))
      .collect(),
  )
}

pub struct FinnhubTickerService {
  http: reqwest::Client,
  base_url: String,
  token: String,
}

impl FinnhubTickerService {
  pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, StockSentError> {
    Ok(Self { http: build_client(timeout)?, base_url: base_url.to_string(), token: token.to_string() })
  }
}

#[async_trait]
impl TickerService for FinnhubTickerService {
  async fn fetch_all(&self) -> Result<Vec<Ticker>, StockSentError> {
    let request = self
      .http
      .get(endpoint(&self.base_url, "stock/symbol"))
      .query(&[("exchange", "US"), ("token", self.token.as_str())]);
    let body = send_for_text("stock/symbol", request).await?;
    parse_symbols(&body)
  }
}

/// Small fixed universe for offline runs.
#[derive(Debug, Default, Clone)]
pub struct OfflineTickerService;

#[async_trait]
impl TickerService for OfflineTickerService {
  async fn fetch_all(&self) -> Result<Vec<Ticker>, StockSentError> {
    Ok(vec![
      Ticker::new("AAPL", "APPLE INC"),
      Ticker::new("AMZN", "AMAZON.COM INC"),
      Ticker::new("GOOGL", "ALPHABET INC-CL A"),
      Ticker::new("MSFT", "MICROSOFT CORP"),
      Ticker::new("NVDA", "NVIDIA CORP"),
      Ticker::new("TSLA", "TESLA INC"),
    ])
  }
}

/// Serves the whole ticker universe from one rate-limited fetch, cached after the first success.
pub struct TickerRepository {
  service: Arc<dyn TickerService>,
  limiter: Arc<RateLimiter>,
  cache: Mutex<Option<Arc<Vec<Ticker>>>>,
}

impl TickerRepository {
  pub fn new(service: Arc<dyn TickerService>, limits: RateLimiterConfig) -> Self {
    Self::with_limiter(service, Arc::new(RateLimiter::new("tickers", limits)))
  }

  pub fn with_limiter(service: Arc<dyn TickerService>, limiter: Arc<RateLimiter>) -> Self {
    Self { service, limiter, cache: Mutex::new(None) }
  }

  /// Cached list if present; otherwise fetch (rate limited, retried) and cache on success.
  /// A failure leaves the cache empty so the next call starts over.
  pub async fn all_tickers(&self, cancel: &CancellationToken) -> Result<Arc<Vec<Ticker>>, StockSentError> {
    if let Some(cached) = self.cache.lock().clone() {
      debug!("Ticker cache hit ({} symbols)", cached.len());
      return Ok(cached);
    }
    let service = Arc::clone(&self.service);
    let tickers = self
      .limiter
      .run_with_retry(cancel, || {
        let service = Arc::clone(&service);
        async move { service.fetch_all().await }
      })
      .await?;
    let tickers = Arc::new(tickers);
    info!("Loaded {} tickers", tickers.len());
    *self.cache.lock() = Some(Arc::clone(&tickers));
    Ok(tickers)
  }

  /// Tickers whose symbol or name contains `query`, case-insensitively.
  /// Symbols starting with the query are listed first.
  pub async fn search(&self, query: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Ticker>, StockSentError> {
    let all = self.all_tickers(cancel).await?;
    let q = query.trim().to_uppercase();
    if q.is_empty() {
      return Ok(all.iter().take(limit).cloned().collect());
    }
    let mut hits: Vec<&Ticker> = all
      .iter()
      .filter(|t| t.symbol.to_uppercase().contains(&q) || t.name.to_uppercase().contains(&q))
      .collect();
    // Symbol prefix matches first, then shorter symbols.
    hits.sort_by_key(|t| (!t.symbol.to_uppercase().starts_with(&q), t.symbol.len(), t.symbol.clone()));
    Ok(hits.into_iter().take(limit).cloned().collect())
  }

  pub fn is_cached(&self) -> bool {
    self.cache.lock().is_some()
  }

  pub fn limiter(&self) -> Arc<RateLimiter> {
    Arc::clone(&self.limiter)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_test::{assert_err, assert_ok};

  fn fast_limits() -> RateLimiterConfig {
    RateLimiterConfig { per_second: 100, per_minute: 1000, ..RateLimiterConfig::tickers() }
  }

  #[test]
  fn test_parse_symbols_filters_rows() {
    let body = r#"[
      {"currency":"USD","description":"APPLE INC","displaySymbol":"AAPL","figi":"x","mic":"XNAS","symbol":"AAPL","type":"Common Stock"},
      {"description":"SOME WARRANT","symbol":"ABC.WS","type":"Warrant"},
      {"description":"   ","symbol":"EMPTY","type":"Common Stock"},
      {"description":"NO TYPE CORP","symbol":"NTC"}
    ]"#;
    let tickers = parse_symbols(body).unwrap();
    let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "NTC"]);
    assert_eq!(tickers[0].name, "APPLE INC");
  }

  #[tokio::test(start_paused = true)]
  async fn test_all_tickers_cached_after_success() {
    let mut mock = MockTickerService::new();
    mock.expect_fetch_all().times(1).returning(|| Ok(vec![Ticker::new("AAPL", "APPLE INC")]));
    let repo = TickerRepository::new(Arc::new(mock), fast_limits());
    let token = CancellationToken::new();
    let first = assert_ok!(repo.all_tickers(&token).await);
    let second = assert_ok!(repo.all_tickers(&token).await);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(repo.is_cached());
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_is_not_cached() {
    let mut mock = MockTickerService::new();
    let mut seq = mockall::Sequence::new();
    mock
      .expect_fetch_all()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|| Err(StockSentError::SchemaError("bad payload".into())));
    mock
      .expect_fetch_all()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|| Ok(vec![Ticker::new("MSFT", "MICROSOFT CORP")]));
    let repo = TickerRepository::new(Arc::new(mock), fast_limits());
    let token = CancellationToken::new();
    assert_err!(repo.all_tickers(&token).await);
    assert!(!repo.is_cached());
    let tickers = assert_ok!(repo.all_tickers(&token).await);
    assert_eq!(tickers[0].symbol, "MSFT");
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failure_is_retried() {
    let mut mock = MockTickerService::new();
    let mut seq = mockall::Sequence::new();
    mock
      .expect_fetch_all()
      .times(2)
      .in_sequence(&mut seq)
      .returning(|| Err(StockSentError::NetworkError("reset".into())));
    mock
      .expect_fetch_all()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|| Ok(vec![Ticker::new("AAPL", "APPLE INC")]));
    let repo = TickerRepository::new(Arc::new(mock), fast_limits());
    let tickers = assert_ok!(repo.all_tickers(&CancellationToken::new()).await);
    assert_eq!(tickers.len(), 1);
    assert_eq!(repo.limiter().status().retries, 2);
  }

  #[tokio::test]
  async fn test_search_prefers_symbol_matches() {
    let repo = TickerRepository::new(Arc::new(OfflineTickerService), fast_limits());
    let token = CancellationToken::new();
    let hits = repo.search("a", 10, &token).await.unwrap();
    assert_eq!(hits[0].symbol, "AAPL");
    assert!(hits.iter().any(|t| t.symbol == "GOOGL")); // "ALPHABET" name match
    let hits = repo.search("micro", 10, &token).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol, "MSFT");
  }

  #[tokio::test]
  async fn test_search_matches_inside_symbol() {
    let repo = TickerRepository::new(Arc::new(OfflineTickerService), fast_limits());
    let hits = repo.search("ogl", 10, &CancellationToken::new()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol, "GOOGL");
  }
}
