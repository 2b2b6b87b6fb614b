// stocksent/src/config.rs

//! Runtime configuration.
//!
//! Values come from the environment (see [`Config::from_env`]) and can be
//! overridden field by field by the command-line front end.

use crate::base::StockSentError;
use crate::cache::CachePolicy;

use std::time::Duration;

pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_BACKEND_BASE_URL: &str = "http://127.0.0.1:8000";

/// Admission and retry settings for one upstream collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimiterConfig {
  /// Admissions allowed in any trailing 1-second window (default: 2)
  pub per_second: usize,
  /// Admissions allowed in any trailing 60-second window (default: 30)
  pub per_minute: usize,
  /// How often a blocked `acquire` re-tests the windows (default: 150ms)
  pub poll_interval: Duration,
  /// Retries after the first failed attempt (default: 4)
  pub max_retries: u32,
  /// Backoff is `backoff_base * 2^attempt` (default: 300ms)
  pub backoff_base: Duration,
  /// Upper bound on a single backoff sleep (default: 3s)
  pub backoff_cap: Duration,
}

impl Default for RateLimiterConfig {
  fn default() -> Self {
    Self {
      per_second: 2,
      per_minute: 30,
      poll_interval: Duration::from_millis(150),
      max_retries: 4,
      backoff_base: Duration::from_millis(300),
      backoff_cap: Duration::from_secs(3),
    }
  }
}

impl RateLimiterConfig {
  /// Limits used for the company-news endpoint.
  pub fn news() -> Self {
    Self::default()
  }

  /// The symbol list is one large request; keep it slower.
  pub fn tickers() -> Self {
    Self { per_second: 1, ..Self::default() }
  }

  pub fn validate(&self) -> Result<(), StockSentError> {
    if self.per_second == 0 || self.per_minute == 0 {
      return Err(StockSentError::ConfigurationError(
        "rate limiter windows must allow at least one request".to_string(),
      ));
    }
    if self.poll_interval.is_zero() {
      return Err(StockSentError::ConfigurationError("poll interval must be non-zero".to_string()));
    }
    Ok(())
  }
}

/// Settings for the advice backend.
#[derive(Clone, Debug, PartialEq)]
pub struct AdviceConfig {
  pub base_url: String,
  pub request_timeout: Duration,
  /// Extra attempts after the first failure (default: 1)
  pub retry_count: u32,
  pub retry_delay: Duration,
}

impl Default for AdviceConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BACKEND_BASE_URL.to_string(),
      request_timeout: Duration::from_secs(30),
      retry_count: 1,
      retry_delay: Duration::from_millis(800),
    }
  }
}

#[derive(Clone, Debug)]
pub struct Config {
  pub finnhub_token: Option<String>,
  pub finnhub_base_url: String,
  pub request_timeout: Duration,
  pub use_mock_news: bool,
  pub use_mock_advice: bool,
  pub news_limits: RateLimiterConfig,
  pub ticker_limits: RateLimiterConfig,
  pub cache_policy: CachePolicy,
  pub advice: AdviceConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      finnhub_token: None,
      finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
      request_timeout: Duration::from_secs(30),
      use_mock_news: false,
      use_mock_advice: false,
      news_limits: RateLimiterConfig::news(),
      ticker_limits: RateLimiterConfig::tickers(),
      cache_policy: CachePolicy::default(),
      advice: AdviceConfig::default(),
    }
  }
}

impl Config {
  /// Reads `FINNHUB_TOKEN`, `FINNHUB_BASE_URL`, `BACKEND_BASE_URL`,
  /// `STOCKSENT_USE_MOCK` and `STOCKSENT_USE_ADVICE_MOCK`.
  pub fn from_env() -> Result<Self, StockSentError> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Same as [`Config::from_env`] with an injectable variable source.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, StockSentError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let config = Self::from_lookup_unchecked(lookup);
    config.validate()?;
    Ok(config)
  }

  /// Environment values without validation, for callers that apply overrides first.
  pub fn from_env_unchecked() -> Self {
    Self::from_lookup_unchecked(|name| std::env::var(name).ok())
  }

  fn from_lookup_unchecked<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut config = Config::default();
    config.finnhub_token = non_empty("FINNHUB_TOKEN");
    if let Some(url) = non_empty("FINNHUB_BASE_URL") {
      config.finnhub_base_url = url;
    }
    if let Some(url) = non_empty("BACKEND_BASE_URL") {
      config.advice.base_url = url;
    }
    config.use_mock_news = non_empty("STOCKSENT_USE_MOCK").as_deref() == Some("1");
    config.use_mock_advice = non_empty("STOCKSENT_USE_ADVICE_MOCK").as_deref() == Some("1");
    config
  }

  pub fn validate(&self) -> Result<(), StockSentError> {
    self.news_limits.validate()?;
    self.ticker_limits.validate()?;
    validate_url("Finnhub base URL", &self.finnhub_base_url)?;
    validate_url("backend base URL", &self.advice.base_url)?;
    if !self.use_mock_news && self.finnhub_token.is_none() {
      return Err(StockSentError::ConfigurationError(
        "FINNHUB_TOKEN is not set (set STOCKSENT_USE_MOCK=1 to run offline)".to_string(),
      ));
    }
    Ok(())
  }
}

fn validate_url(what: &str, raw: &str) -> Result<(), StockSentError> {
  match reqwest::Url::parse(raw) {
    Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
    Ok(url) => Err(StockSentError::ConfigurationError(format!("{} has unsupported scheme '{}'", what, url.scheme()))),
    Err(e) => Err(StockSentError::ConfigurationError(format!("Invalid {} '{}': {}", what, raw, e))),
  }
}
