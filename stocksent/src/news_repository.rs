// stocksent/src/news_repository.rs

//! Daily sentiment pipeline.
//!
//! [`NewsRepository::daily_sentiments`] produces one [`SentimentDay`] per
//! calendar day for the `day_count` days ending today, oldest first:
//!
//! 1. A cached result for `(symbol, day_count)` is returned immediately.
//! 2. Otherwise the computation runs under [`SingleFlight`], so concurrent
//!    callers for the same key share one pass over the upstream.
//! 3. Each day is fetched on its own through the shared news [`RateLimiter`]
//!    (with retry). Past days are scored from headlines only; today is
//!    scored from headline plus summary and also yields the top keywords.
//! 4. A complete result is cached for the life of the repository. Failures
//!    and cancellations cache nothing, so the next call starts from scratch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stocksent::{CancellationToken, LexiconScorer, NewsRepository, OfflineNewsService, RateLimiterConfig};
//! use stocksent::cache::CachePolicy;
//!
//! # async fn run() -> Result<(), stocksent::StockSentError> {
//! let repo = NewsRepository::new(
//!   Arc::new(OfflineNewsService::new()),
//!   Arc::new(LexiconScorer::new()),
//!   RateLimiterConfig::news(),
//!   CachePolicy::unbounded(),
//! );
//! let days = repo.daily_sentiments("AAPL", 7, &CancellationToken::new()).await?;
//! for day in &days {
//!   println!("{} {:>3} {:+.2} {}", day.date, day.count, day.score, day.level());
//! }
//! println!("keywords today: {:?}", repo.today_keywords());
//! # Ok(())
//! # }
//! ```

use crate::base::StockSentError;
use crate::cache::{CachePolicy, MemoryCache};
use crate::cancel::CancellationToken;
use crate::config::RateLimiterConfig;
use crate::models::{CacheKey, NewsItem, SentimentDay, SentimentSummary};
use crate::news::NewsService;
use crate::rate_limiter::RateLimiter;
use crate::sentiment::SentimentScorer;
use crate::single_flight::SingleFlight;

use chrono::{Days, Local, NaiveDate};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Number of keywords kept for today.
pub const TODAY_KEYWORD_COUNT: usize = 5;

/// Longest window `daily_sentiments` accepts, in days.
pub const MAX_DAY_COUNT: u32 = 365;

/// Source of "today". Read once per computation.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Today's date on the local calendar.
pub fn local_today() -> NaiveDate {
  Local::now().date_naive()
}

type SharedDays = Arc<Vec<SentimentDay>>;

pub struct NewsRepository {
  service: Arc<dyn NewsService>,
  scorer: Arc<dyn SentimentScorer>,
  limiter: Arc<RateLimiter>,
  flights: SingleFlight<SharedDays>,
  cache: MemoryCache<CacheKey, SharedDays>,
  today_keywords: Mutex<Vec<String>>,
  clock: Clock,
  self_weak: Weak<NewsRepository>,
}

impl NewsRepository {
  pub fn new(
    service: Arc<dyn NewsService>,
    scorer: Arc<dyn SentimentScorer>,
    limits: RateLimiterConfig,
    cache_policy: CachePolicy,
  ) -> Arc<Self> {
    Self::with_parts(
      service,
      scorer,
      Arc::new(RateLimiter::new("news", limits)),
      cache_policy,
      Arc::new(local_today),
    )
  }

  /// Full constructor: share an existing limiter and/or supply the clock.
  pub fn with_parts(
    service: Arc<dyn NewsService>,
    scorer: Arc<dyn SentimentScorer>,
    limiter: Arc<RateLimiter>,
    cache_policy: CachePolicy,
    clock: Clock,
  ) -> Arc<Self> {
    Arc::new_cyclic(|weak_self_ref| NewsRepository {
      service,
      scorer,
      limiter,
      flights: SingleFlight::new(),
      cache: MemoryCache::new(cache_policy),
      today_keywords: Mutex::new(Vec::new()),
      clock,
      self_weak: weak_self_ref.clone(),
    })
  }

  /// Per-day sentiment for the `day_count` days ending today, oldest first.
  ///
  /// `cancel` governs the computation this call starts. A caller that joins
  /// a computation already in flight stops waiting when its own token is
  /// cancelled, leaving the shared computation running for the others.
  pub async fn daily_sentiments(
    &self,
    symbol: &str,
    day_count: u32,
    cancel: &CancellationToken,
  ) -> Result<Vec<SentimentDay>, StockSentError> {
    let symbol = normalize_symbol(symbol)?;
    if day_count == 0 {
      return Ok(Vec::new());
    }
    if day_count > MAX_DAY_COUNT {
      return Err(StockSentError::InvalidParameter(format!(
        "day count {} exceeds the maximum of {}",
        day_count, MAX_DAY_COUNT
      )));
    }
    let key = CacheKey::new(&symbol, day_count);
    if let Some(hit) = self.cache.get(&key) {
      debug!("Sentiment cache hit for {}", key);
      return Ok(hit.as_ref().clone());
    }
    debug!("Sentiment cache miss for {}", key);

    let this = self
      .self_weak
      .upgrade()
      .ok_or_else(|| StockSentError::InternalError("news repository is shutting down".to_string()))?;
    let token = cancel.clone();
    let flight_key = key.to_string();
    let flight = self.flights.run(&flight_key, move || async move { this.compute(key, token).await });

    let days = tokio::select! {
      result = flight => result?,
      _ = cancel.cancelled() => return Err(StockSentError::Cancelled),
    };
    Ok(days.as_ref().clone())
  }

  /// `daily_sentiments` folded into an average and level.
  pub async fn summary(
    &self,
    symbol: &str,
    day_count: u32,
    cancel: &CancellationToken,
  ) -> Result<SentimentSummary, StockSentError> {
    let days = self.daily_sentiments(symbol, day_count, cancel).await?;
    Ok(SentimentSummary::from_days(days))
  }

  /// Keywords extracted from today's news by the most recent computation.
  pub fn today_keywords(&self) -> Vec<String> {
    self.today_keywords.lock().clone()
  }

  pub fn cached_entries(&self) -> usize {
    self.cache.len()
  }

  pub fn clear_cache(&self) {
    info!("Clearing {} cached sentiment windows", self.cache.len());
    self.cache.clear();
  }

  pub fn limiter(&self) -> Arc<RateLimiter> {
    Arc::clone(&self.limiter)
  }

  async fn compute(&self, key: CacheKey, cancel: CancellationToken) -> Result<SharedDays, StockSentError> {
    // A caller that lost the race with a just-finished flight lands here; serve what it stored.
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }
    match self.compute_days(&key, &cancel).await {
      Ok(days) => {
        let days = Arc::new(days);
        self.cache.insert(key.clone(), Arc::clone(&days));
        info!("Cached {} days of sentiment for {}", days.len(), key);
        Ok(days)
      }
      Err(StockSentError::Cancelled) => {
        info!("Sentiment computation for {} cancelled", key);
        Err(StockSentError::Cancelled)
      }
      Err(e) => {
        warn!("Sentiment computation for {} failed: {}", key, e);
        Err(e)
      }
    }
  }

  async fn compute_days(&self, key: &CacheKey, cancel: &CancellationToken) -> Result<Vec<SentimentDay>, StockSentError> {
    self.today_keywords.lock().clear();
    let today = (self.clock)();
    info!("Computing {} days of sentiment for {} ending {}", key.day_count, key.symbol, today);

    let mut days = Vec::new();
    for offset in (0..key.day_count).rev() {
      cancel.check()?;
      let day = today
        .checked_sub_days(Days::new(u64::from(offset)))
        .ok_or_else(|| StockSentError::InvalidParameter(format!("{} days before {} is out of range", offset, today)))?;

      let items = self.fetch_day(&key.symbol, day, cancel).await?;
      let entry = if day == today {
        let texts: Vec<String> = items.iter().map(NewsItem::full_text).collect();
        let score = self.scorer.score_full_texts(&texts);
        let keywords = self.scorer.top_keywords(&texts, TODAY_KEYWORD_COUNT);
        *self.today_keywords.lock() = keywords;
        SentimentDay { date: day, count: texts.len(), score }
      } else {
        let headlines: Vec<String> = items.into_iter().map(|n| n.headline).collect();
        let score = self.scorer.score_headlines(&headlines);
        SentimentDay { date: day, count: headlines.len(), score }
      };
      debug!("{} {}: {} items, score {:.3}", key.symbol, day, entry.count, entry.score);
      days.push(entry);
    }
    Ok(days)
  }

  async fn fetch_day(&self, symbol: &str, day: NaiveDate, cancel: &CancellationToken) -> Result<Vec<NewsItem>, StockSentError> {
    let service = Arc::clone(&self.service);
    self
      .limiter
      .run_with_retry(cancel, || {
        let service = Arc::clone(&service);
        let symbol = symbol.to_string();
        async move { service.company_news(&symbol, day, day).await }
      })
      .await
  }
}

fn normalize_symbol(symbol: &str) -> Result<String, StockSentError> {
  let trimmed = symbol.trim();
  if trimmed.is_empty() {
    return Err(StockSentError::InvalidParameter("symbol must not be empty".to_string()));
  }
  Ok(trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::news::MockNewsService;
  use crate::sentiment::LexiconScorer;
  use async_trait::async_trait;
  use chrono::{TimeZone, Utc};
  use std::collections::{HashMap, VecDeque};
  use std::time::Duration;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
  }

  fn days_ago(n: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(n)).unwrap()
  }

  fn item(headline: &str, summary: Option<&str>) -> NewsItem {
    NewsItem {
      headline: headline.to_string(),
      published_at: Utc.with_ymd_and_hms(2025, 9, 15, 14, 30, 0).unwrap(),
      url: None,
      summary: summary.map(str::to_string),
    }
  }

  /// Counting stand-in for the news API.
  #[derive(Default)]
  struct StubNews {
    news: HashMap<NaiveDate, Vec<NewsItem>>,
    calls: Mutex<Vec<NaiveDate>>,
    delay: Duration,
    failures: Mutex<VecDeque<StockSentError>>,
    cancel_after: Option<(usize, CancellationToken)>,
  }

  impl StubNews {
    fn call_count(&self) -> usize {
      self.calls.lock().len()
    }
  }

  #[async_trait]
  impl NewsService for StubNews {
    async fn company_news(&self, _symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<NewsItem>, StockSentError> {
      assert_eq!(from, to, "pipeline fetches one day at a time");
      let n = {
        let mut calls = self.calls.lock();
        calls.push(from);
        calls.len()
      };
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      if let Some((after, token)) = &self.cancel_after {
        if n == *after {
          token.cancel();
        }
      }
      if let Some(e) = self.failures.lock().pop_front() {
        return Err(e);
      }
      Ok(self.news.get(&from).cloned().unwrap_or_default())
    }
  }

  fn repo_with(service: Arc<dyn NewsService>) -> Arc<NewsRepository> {
    NewsRepository::with_parts(
      service,
      Arc::new(LexiconScorer::new()),
      Arc::new(RateLimiter::new("news", RateLimiterConfig::news())),
      CachePolicy::unbounded(),
      Arc::new(today),
    )
  }

  fn three_day_news() -> HashMap<NaiveDate, Vec<NewsItem>> {
    let mut news = HashMap::new();
    news.insert(days_ago(2), vec![
      item("XYZ shares rally on record profit", Some("Fraud probe and lawsuit concerns.")),
      item("XYZ holds annual meeting", None),
    ]);
    news.insert(days_ago(1), vec![
      item("XYZ faces supply pressure", None),
      item("Analysts downgrade XYZ", Some("Strong growth ahead.")),
    ]);
    news.insert(today(), vec![
      item("XYZ quarterly update", Some("Revenue surged to a record. Margins improved.")),
      item("XYZ investor day", Some("Management expects robust demand for chips.")),
    ]);
    news
  }

  #[tokio::test(start_paused = true)]
  async fn test_three_day_window_scores_today_on_full_text() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let days = repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await.unwrap();

    assert_eq!(days.len(), 3);
    assert_eq!(days.iter().map(|d| d.date).collect::<Vec<_>>(), vec![days_ago(2), days_ago(1), today()]);
    assert!(days.iter().all(|d| d.count == 2));
    assert_eq!(*stub.calls.lock(), vec![days_ago(2), days_ago(1), today()]);

    let scorer = LexiconScorer::new();
    let headlines = |d: NaiveDate| stub.news[&d].iter().map(|n| n.headline.clone()).collect::<Vec<_>>();
    let texts = |d: NaiveDate| stub.news[&d].iter().map(NewsItem::full_text).collect::<Vec<_>>();
    assert_eq!(days[0].score, scorer.score_headlines(&headlines(days_ago(2))));
    assert_eq!(days[1].score, scorer.score_headlines(&headlines(days_ago(1))));
    assert_eq!(days[2].score, scorer.score_full_texts(&texts(today())));
    // Past days ignore summaries: the negative summary on day -2 does not count.
    assert!(days[0].score > 0.0);
    // Today's headlines alone are neutral; the summaries make it positive.
    assert_eq!(scorer.score_headlines(&headlines(today())), 0.0);
    assert!(days[2].score > 0.2);

    let keywords = repo.today_keywords();
    assert!(!keywords.is_empty() && keywords.len() <= TODAY_KEYWORD_COUNT);
    assert_eq!(keywords[0], "xyz");
  }

  #[tokio::test(start_paused = true)]
  async fn test_days_without_news_score_zero() {
    let stub = Arc::new(StubNews::default());
    let repo = repo_with(stub.clone());
    let days = repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await.unwrap();
    assert!(days.iter().all(|d| d.count == 0 && d.score == 0.0));
    assert!(repo.today_keywords().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_second_call_is_served_from_cache() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let token = CancellationToken::new();
    let first = repo.daily_sentiments("AAPL", 7, &token).await.unwrap();
    assert_eq!(stub.call_count(), 7);
    let second = repo.daily_sentiments("aapl ", 7, &token).await.unwrap();
    assert_eq!(stub.call_count(), 7);
    assert_eq!(first, second);
    assert_eq!(repo.cached_entries(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_callers_share_one_computation() {
    let stub = Arc::new(StubNews { news: three_day_news(), delay: Duration::from_millis(200), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let mut handles = Vec::new();
    for _ in 0..6 {
      let repo = repo.clone();
      handles.push(tokio::spawn(async move { repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await }));
    }
    let mut results = Vec::new();
    for h in handles {
      results.push(h.await.unwrap().unwrap());
    }
    assert_eq!(stub.call_count(), 3);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancellation_mid_window_caches_nothing() {
    let token = CancellationToken::new();
    let stub = Arc::new(StubNews {
      news: three_day_news(),
      cancel_after: Some((2, token.clone())),
      ..StubNews::default()
    });
    let repo = repo_with(stub.clone());
    let result = repo.daily_sentiments("XYZ", 5, &token).await;
    assert_eq!(result, Err(StockSentError::Cancelled));
    assert_eq!(stub.call_count(), 2);
    assert_eq!(repo.cached_entries(), 0);

    let days = repo.daily_sentiments("XYZ", 5, &CancellationToken::new()).await.unwrap();
    assert_eq!(days.len(), 5);
    // All five days fetched again from scratch.
    assert_eq!(stub.call_count(), 7);
    assert_eq!(stub.calls.lock()[2..].to_vec(), (0..5).rev().map(days_ago).collect::<Vec<_>>());
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failure_recovers_within_retry_budget() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    stub.failures.lock().extend([
      StockSentError::HttpStatus(503, "unavailable".into()),
      StockSentError::NetworkError("timeout".into()),
    ]);
    let repo = repo_with(stub.clone());
    let days = repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await.unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(stub.call_count(), 5);
    assert_eq!(repo.limiter().status().retries, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhausted_retries_propagate_and_cache_nothing() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    stub.failures.lock().extend((0..5).map(|_| StockSentError::NetworkError("down".into())));
    let repo = repo_with(stub.clone());
    let result = repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await;
    assert_eq!(result, Err(StockSentError::NetworkError("down".into())));
    assert_eq!(stub.call_count(), 5);
    assert_eq!(repo.cached_entries(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_schema_error_is_not_retried_or_cached() {
    let mut mock = MockNewsService::new();
    let mut seq = mockall::Sequence::new();
    mock
      .expect_company_news()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_, _, _| Err(StockSentError::SchemaError("unexpected payload".into())));
    mock
      .expect_company_news()
      .times(2)
      .in_sequence(&mut seq)
      .returning(|_, _, _| Ok(vec![]));
    let repo = repo_with(Arc::new(mock));
    let token = CancellationToken::new();
    let err = repo.daily_sentiments("XYZ", 2, &token).await.unwrap_err();
    assert!(matches!(err, StockSentError::SchemaError(_)));
    assert_eq!(repo.cached_entries(), 0);
    assert_eq!(repo.daily_sentiments("XYZ", 2, &token).await.unwrap().len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_keywords_reset_on_each_run() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let token = CancellationToken::new();
    repo.daily_sentiments("XYZ", 3, &token).await.unwrap();
    assert!(!repo.today_keywords().is_empty());

    stub.failures.lock().push_back(StockSentError::SchemaError("broken".into()));
    assert!(repo.daily_sentiments("XYZ", 4, &token).await.is_err());
    assert!(repo.today_keywords().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_attached_caller_can_stop_waiting() {
    let stub = Arc::new(StubNews { news: three_day_news(), delay: Duration::from_millis(300), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let leader = {
      let repo = repo.clone();
      tokio::spawn(async move { repo.daily_sentiments("XYZ", 3, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let impatient = CancellationToken::new();
    let follower = {
      let repo = repo.clone();
      let impatient = impatient.clone();
      tokio::spawn(async move { repo.daily_sentiments("XYZ", 3, &impatient).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    impatient.cancel();
    assert_eq!(follower.await.unwrap(), Err(StockSentError::Cancelled));
    assert_eq!(leader.await.unwrap().unwrap().len(), 3);
    assert_eq!(stub.call_count(), 3);
    assert_eq!(repo.cached_entries(), 1);
  }

  #[tokio::test]
  async fn test_zero_days_and_bad_symbol() {
    let stub = Arc::new(StubNews::default());
    let repo = repo_with(stub.clone());
    let token = CancellationToken::new();
    assert_eq!(repo.daily_sentiments("XYZ", 0, &token).await, Ok(vec![]));
    assert_eq!(stub.call_count(), 0);
    assert!(matches!(
      repo.daily_sentiments("   ", 3, &token).await,
      Err(StockSentError::InvalidParameter(_))
    ));
  }

  #[tokio::test]
  async fn test_oversized_window_is_rejected() {
    let stub = Arc::new(StubNews::default());
    let repo = repo_with(stub.clone());
    let token = CancellationToken::new();
    for day_count in [MAX_DAY_COUNT + 1, u32::MAX] {
      assert!(matches!(
        repo.daily_sentiments("AAPL", day_count, &token).await,
        Err(StockSentError::InvalidParameter(_))
      ));
    }
    assert_eq!(stub.call_count(), 0);
    assert_eq!(repo.cached_entries(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_flight_started_after_previous_finished_reuses_cache() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    let repo = repo_with(stub.clone());
    let token = CancellationToken::new();
    repo.daily_sentiments("XYZ", 3, &token).await.unwrap();
    assert_eq!(stub.call_count(), 3);
    assert_eq!(repo.flights.in_flight(), 0);

    // A caller that missed the cache just before the previous flight stored its result
    // registers a fresh flight for the same key; its computation must not refetch.
    let key = CacheKey::new("XYZ", 3);
    let this = repo.clone();
    let late_token = token.clone();
    let late_key = key.clone();
    let days = repo
      .flights
      .run(&key.to_string(), move || async move { this.compute(late_key, late_token).await })
      .await
      .unwrap();
    assert_eq!(stub.call_count(), 3);
    assert!(Arc::ptr_eq(&days, &repo.cache.get(&key).unwrap()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_summary_averages_days_with_news() {
    let stub = Arc::new(StubNews { news: three_day_news(), ..StubNews::default() });
    let repo = repo_with(stub);
    let token = CancellationToken::new();
    let summary = repo.summary("XYZ", 5, &token).await.unwrap();
    assert_eq!(summary.days.len(), 5);
    let with_news: Vec<f64> = summary.days.iter().filter(|d| d.count > 0).map(|d| d.score).collect();
    assert_eq!(with_news.len(), 3);
    let expected = with_news.iter().sum::<f64>() / 3.0;
    assert!((summary.average - expected).abs() < 1e-12);
    assert_eq!(summary.today().map(|d| d.date), Some(today()));
  }
}
