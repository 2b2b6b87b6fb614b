// stocksent/src/advice.rs

//! Investment suggestions from the advice backend.
//!
//! The backend exposes two endpoints taking the same JSON body: one that
//! retrieves recent news as context before asking the model (`advice_rag`)
//! and one that asks it directly (`advice_no_rag`).

use crate::base::StockSentError;
use crate::cancel::CancellationToken;
use crate::config::AdviceConfig;
use crate::http_util::{build_client, endpoint, send_for_text};
use crate::models::{SentimentLevel, SentimentSummary};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdviceMode {
  #[default]
  Rag,
  NoRag,
}

impl AdviceMode {
  pub fn path(&self) -> &'static str {
    match self {
      AdviceMode::Rag => "advice_rag",
      AdviceMode::NoRag => "advice_no_rag",
    }
  }
}

impl fmt::Display for AdviceMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AdviceMode::Rag => f.write_str("rag"),
      AdviceMode::NoRag => f.write_str("no-rag"),
    }
  }
}

impl FromStr for AdviceMode {
  type Err = StockSentError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "rag" => Ok(AdviceMode::Rag),
      "no-rag" | "no_rag" | "norag" => Ok(AdviceMode::NoRag),
      other => Err(StockSentError::InvalidParameter(format!("unknown advice mode '{}'", other))),
    }
  }
}

/// Body sent to both advice endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceRequest {
  pub symbol: String,
  pub level: SentimentLevel,
  pub keywords: Vec<String>,
  pub score: f64,
}

impl AdviceRequest {
  /// Request built from today's entry of a sentiment summary.
  pub fn from_summary(symbol: &str, summary: &SentimentSummary, keywords: Vec<String>) -> Self {
    let score = summary.today().map_or(0.0, |d| d.score);
    Self { symbol: symbol.to_string(), level: SentimentLevel::from_score(score), keywords, score }
  }
}

#[derive(Debug, Deserialize)]
struct AdviceResponse {
  suggestions: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdviceClient: Send + Sync {
  async fn fetch_advice(
    &self,
    mode: AdviceMode,
    request: &AdviceRequest,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, StockSentError>;
}

pub struct HttpAdviceClient {
  http: reqwest::Client,
  base_url: String,
  retry_count: u32,
  retry_delay: Duration,
}

impl HttpAdviceClient {
  pub fn new(config: &AdviceConfig) -> Result<Self, StockSentError> {
    Ok(Self {
      http: build_client(config.request_timeout)?,
      base_url: config.base_url.clone(),
      retry_count: config.retry_count,
      retry_delay: config.retry_delay,
    })
  }

  async fn post_once(&self, mode: AdviceMode, request: &AdviceRequest) -> Result<Vec<String>, StockSentError> {
    let body = send_for_text(
      mode.path(),
      self.http.post(endpoint(&self.base_url, mode.path())).json(request),
    )
    .await?;
    let response: AdviceResponse = serde_json::from_str(&body)?;
    Ok(response.suggestions)
  }
}

#[async_trait]
impl AdviceClient for HttpAdviceClient {
  async fn fetch_advice(
    &self,
    mode: AdviceMode,
    request: &AdviceRequest,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, StockSentError> {
    let mut attempt = 0u32;
    loop {
      cancel.check()?;
      attempt += 1;
      match self.post_once(mode, request).await {
        Ok(suggestions) => {
          debug!("{} for {}: {} suggestions", mode.path(), request.symbol, suggestions.len());
          return Ok(suggestions);
        }
        Err(e) if e.is_retryable() && attempt <= self.retry_count => {
          warn!("{} attempt {} failed ({}), retrying in {:?}", mode.path(), attempt, e, self.retry_delay);
          tokio::select! {
            _ = tokio::time::sleep(self.retry_delay) => {}
            _ = cancel.cancelled() => return Err(StockSentError::Cancelled),
          }
        }
        Err(e) => return Err(e),
      }
    }
  }
}

/// Fixed suggestions for offline runs.
#[derive(Debug, Clone)]
pub struct OfflineAdviceClient {
  suggestions: Vec<String>,
}

impl Default for OfflineAdviceClient {
  fn default() -> Self {
    Self {
      suggestions: vec![
        "Review risk exposure and avoid impulsive trades.".to_string(),
        "Validate news with multiple reputable sources.".to_string(),
        "Prefer gradual adjustments over immediate large moves.".to_string(),
      ],
    }
  }
}

impl OfflineAdviceClient {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl AdviceClient for OfflineAdviceClient {
  async fn fetch_advice(
    &self,
    mode: AdviceMode,
    request: &AdviceRequest,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, StockSentError> {
    cancel.check()?;
    info!("Offline advice ({}) for {}", mode, request.symbol);
    Ok(self.suggestions.clone())
  }
}
