// stocksent/src/models.rs
// Domain types shared by the collaborators and the pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scores strictly above this are optimistic.
pub const OPTIMISTIC_THRESHOLD: f64 = 0.2;
/// Scores strictly below this are pessimistic.
pub const PESSIMISTIC_THRESHOLD: f64 = -0.2;

/// A listed instrument. Two tickers are equal when their symbols are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
  pub symbol: String,
  pub name: String,
}

impl Ticker {
  pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
    Self { symbol: symbol.into(), name: name.into() }
  }
}

impl PartialEq for Ticker {
  fn eq(&self, other: &Self) -> bool {
    self.symbol == other.symbol
  }
}

impl Eq for Ticker {}

impl Hash for Ticker {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.symbol.hash(state);
  }
}

/// One company news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
  pub headline: String,
  pub published_at: DateTime<Utc>,
  pub url: Option<String>,
  pub summary: Option<String>,
}

impl NewsItem {
  /// Headline and summary joined by a space; a missing summary counts as empty.
  pub fn full_text(&self) -> String {
    format!("{} {}", self.headline, self.summary.as_deref().unwrap_or(""))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLevel {
  Optimistic,
  Neutral,
  Pessimistic,
}

impl SentimentLevel {
  pub fn from_score(score: f64) -> Self {
    if score > OPTIMISTIC_THRESHOLD {
      SentimentLevel::Optimistic
    } else if score < PESSIMISTIC_THRESHOLD {
      SentimentLevel::Pessimistic
    } else {
      SentimentLevel::Neutral
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      SentimentLevel::Optimistic => "Optimistic",
      SentimentLevel::Neutral => "Neutral",
      SentimentLevel::Pessimistic => "Pessimistic",
    }
  }
}

impl fmt::Display for SentimentLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Aggregate sentiment for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDay {
  pub date: NaiveDate,
  pub count: usize,
  /// Average score in [-1.0, 1.0]
  pub score: f64,
}

impl SentimentDay {
  pub fn level(&self) -> SentimentLevel {
    SentimentLevel::from_score(self.score)
  }
}

/// Identifies a cached window: `day_count` days ending today for `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub symbol: String,
  pub day_count: u32,
}

impl CacheKey {
  pub fn new(symbol: &str, day_count: u32) -> Self {
    Self { symbol: symbol.to_string(), day_count }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.symbol, self.day_count)
  }
}

/// Multi-day trend: the average over days that had news, plus the days themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
  pub average: f64,
  pub level: SentimentLevel,
  pub days: Vec<SentimentDay>,
}

impl SentimentSummary {
  pub fn from_days(days: Vec<SentimentDay>) -> Self {
    let with_news: Vec<f64> = days.iter().filter(|d| d.count > 0).map(|d| d.score).collect();
    let average = if with_news.is_empty() {
      0.0
    } else {
      with_news.iter().sum::<f64>() / with_news.len() as f64
    };
    Self { average, level: SentimentLevel::from_score(average), days }
  }

  /// The most recent day, i.e. today.
  pub fn today(&self) -> Option<&SentimentDay> {
    self.days.last()
  }
}
