// stocksent/src/news.rs

//! Company news collaborator.
//!
//! [`NewsService`] is the seam the pipeline depends on. [`FinnhubNewsService`]
//! talks to Finnhub's `company-news` endpoint; [`OfflineNewsService`] returns
//! deterministic headlines for offline runs and UI tests.

use crate::base::StockSentError;
use crate::http_util::{build_client, endpoint, send_for_text};
use crate::models::NewsItem;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsService: Send + Sync {
  /// News published for `symbol` between `from` and `to`, both inclusive.
  async fn company_news(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<NewsItem>, StockSentError>;
}

/// Row of Finnhub's `company-news` response. Only the fields we use.
#[derive(Debug, Deserialize)]
struct RawNews {
  headline: String,
  /// Publication time, seconds since the epoch
  datetime: f64,
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  summary: Option<String>,
}

/// Decode a `company-news` payload into domain items.
pub fn parse_company_news(body: &str) -> Result<Vec<NewsItem>, StockSentError> {
  let raws: Vec<RawNews> = serde_json::from_str(body)?;
  raws
    .into_iter()
    .map(|raw| {
      let published_at = Utc
        .timestamp_opt(raw.datetime.trunc() as i64, 0)
        .single()
        .ok_or_else(|| StockSentError::SchemaError(format!("invalid datetime {}", raw.datetime)))?;
      Ok(NewsItem {
        headline: raw.headline,
        published_at,
        url: raw.url.filter(|u| !u.trim().is_empty()),
        summary: raw.summary,
      })
    })
    .collect()
}

pub struct FinnhubNewsService {
  http: reqwest::Client,
  base_url: String,
  token: String,
}

impl FinnhubNewsService {
  pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, StockSentError> {
    Ok(Self { http: build_client(timeout)?, base_url: base_url.to_string(), token: token.to_string() })
  }
}

#[async_trait]
impl NewsService for FinnhubNewsService {
  async fn company_news(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<NewsItem>, StockSentError> {
    let from_s = from.format("%Y-%m-%d").to_string();
    let to_s = to.format("%Y-%m-%d").to_string();
    let request = self.http.get(endpoint(&self.base_url, "company-news")).query(&[
      ("symbol", symbol),
      ("from", from_s.as_str()),
      ("to", to_s.as_str()),
      ("token", self.token.as_str()),
    ]);
    let body = send_for_text("company-news", request).await?;
    let items = parse_company_news(&body)?;
    debug!("company-news {} {}..{}: {} items", symbol, from_s, to_s, items.len());
    Ok(items)
  }
}

/// Offline news source. Headlines depend only on the symbol and the day.
#[derive(Debug, Default, Clone)]
pub struct OfflineNewsService;

impl OfflineNewsService {
  pub fn new() -> Self {
    Self
  }

  fn headlines(symbol: &str, day: NaiveDate) -> [String; 2] {
    match day.num_days_from_ce().rem_euclid(3) {
      0 => [
        format!("{} beats expectations in Q report", symbol),
        format!("Analyst upgrades {} on strong outlook", symbol),
      ],
      1 => [
        format!("{} faces supply chain pressure", symbol),
        format!("Market uncertainty weighs on {}", symbol),
      ],
      _ => [
        format!("{} launches new product line", symbol),
        format!("Customers praise {}'s service improvements", symbol),
      ],
    }
  }
}

#[async_trait]
impl NewsService for OfflineNewsService {
  async fn company_news(&self, symbol: &str, from: NaiveDate, _to: NaiveDate) -> Result<Vec<NewsItem>, StockSentError> {
    let published_at: DateTime<Utc> = from
      .and_hms_opt(12, 0, 0)
      .map(|t| t.and_utc())
      .ok_or_else(|| StockSentError::InternalError(format!("invalid date {}", from)))?;
    Ok(
      Self::headlines(symbol, from)
        .into_iter()
        .map(|headline| NewsItem {
          headline,
          published_at,
          url: None,
          summary: Some("Offline summary for UI tests".to_string()),
        })
        .collect(),
    )
  }
}
