// stocksent/src/rate_limiter.rs
//! Dual-window rate limiter shared by all callers of one upstream.
//!
//! Finnhub's free tier rejects bursts, so every request to a collaborator
//! passes through a [`RateLimiter`] that enforces two ceilings jointly:
//! - at most `per_second` admissions in any trailing 1-second window
//! - at most `per_minute` admissions in any trailing 60-second window
//!
//! A blocked [`RateLimiter::acquire`] re-tests the windows every
//! `poll_interval` (150ms by default) instead of computing an exact wake time.
//! Wake-up can therefore lag a freed slot by up to one interval; admission
//! itself is still exact because test-and-record happens under one lock.
//!
//! [`RateLimiter::run_with_retry`] layers bounded exponential backoff on top.

use crate::base::StockSentError;
use crate::cancel::CancellationToken;
use crate::config::RateLimiterConfig;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use log::{debug, error, info, warn};
use tokio::time::{sleep, Instant};

const SECOND_WINDOW: Duration = Duration::from_secs(1);
const MINUTE_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of a limiter's current usage.
#[derive(Clone, Debug)]
pub struct RateLimiterStatus {
  pub name: String,
  pub per_second: usize,
  pub per_minute: usize,
  /// Admissions recorded in the trailing second
  pub admissions_last_second: usize,
  /// Admissions recorded in the trailing minute
  pub admissions_last_minute: usize,
  /// Number of `acquire` calls that had to wait at least once
  pub delayed_acquisitions: u64,
  /// Number of retries issued by `run_with_retry`
  pub retries: u64,
}

/// Admission timestamps, oldest first.
#[derive(Debug, Default)]
struct RateWindows {
  second: VecDeque<Instant>,
  minute: VecDeque<Instant>,
}

impl RateWindows {
  fn prune(&mut self, now: Instant) {
    while let Some(&t) = self.second.front() {
      if now.duration_since(t) >= SECOND_WINDOW { self.second.pop_front(); } else { break; }
    }
    while let Some(&t) = self.minute.front() {
      if now.duration_since(t) >= MINUTE_WINDOW { self.minute.pop_front(); } else { break; }
    }
  }
}

/// Exponential backoff for the given 1-based retry attempt: `min(cap, base * 2^attempt)`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
  let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
  base.checked_mul(factor).map_or(cap, |delay| delay.min(cap))
}

pub struct RateLimiter {
  name: String,
  config: RateLimiterConfig,
  windows: Mutex<RateWindows>,
  delayed_acquisitions: AtomicU64,
  retries: AtomicU64,
}

impl RateLimiter {
  /// Create a limiter for the named upstream.
  pub fn new(name: &str, config: RateLimiterConfig) -> Self {
    info!("Created rate limiter '{}' ({} req/s, {} req/min)", name, config.per_second, config.per_minute);
    Self {
      name: name.to_string(),
      config,
      windows: Mutex::new(RateWindows::default()),
      delayed_acquisitions: AtomicU64::new(0),
      retries: AtomicU64::new(0),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config(&self) -> &RateLimiterConfig {
    &self.config
  }

  /// Try to take a slot without waiting.
  ///
  /// Both windows are pruned, tested and (on success) recorded under a single
  /// lock, so two concurrent callers can never both claim the last slot.
  pub fn try_acquire(&self) -> bool {
    let now = Instant::now();
    let mut windows = self.windows.lock();
    windows.prune(now);
    if windows.second.len() < self.config.per_second && windows.minute.len() < self.config.per_minute {
      windows.second.push_back(now);
      windows.minute.push_back(now);
      true
    } else {
      false
    }
  }

  /// Wait until both windows have headroom, then record one admission.
  pub async fn acquire(&self) {
    if self.try_acquire() {
      return;
    }
    self.delayed_acquisitions.fetch_add(1, Ordering::Relaxed);
    debug!("[{}] Rate limited, polling every {:?}", self.name, self.config.poll_interval);
    loop {
      sleep(self.config.poll_interval).await;
      if self.try_acquire() {
        return;
      }
    }
  }

  /// Run `operation` behind `acquire`, retrying transient failures.
  ///
  /// The token is checked before every attempt. A failed attempt that is
  /// retryable sleeps `backoff_delay(attempt)` and tries again, up to
  /// `max_retries` retries; after that the last failure is returned as is.
  pub async fn run_with_retry<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T, StockSentError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StockSentError>>,
  {
    let mut attempt: u32 = 0;
    loop {
      cancel.check()?;
      self.acquire().await;
      match operation().await {
        Ok(value) => return Ok(value),
        Err(e) if !e.is_retryable() => return Err(e),
        Err(e) => {
          attempt += 1;
          if attempt > self.config.max_retries {
            error!("[{}] Giving up after {} attempts: {}", self.name, attempt, e);
            return Err(e);
          }
          let delay = backoff_delay(attempt, self.config.backoff_base, self.config.backoff_cap);
          warn!("[{}] Attempt {} failed ({}), retrying in {:?}", self.name, attempt, e, delay);
          self.retries.fetch_add(1, Ordering::Relaxed);
          tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => return Err(StockSentError::Cancelled),
          }
        }
      }
    }
  }

  pub fn status(&self) -> RateLimiterStatus {
    let mut windows = self.windows.lock();
    windows.prune(Instant::now());
    RateLimiterStatus {
      name: self.name.clone(),
      per_second: self.config.per_second,
      per_minute: self.config.per_minute,
      admissions_last_second: windows.second.len(),
      admissions_last_minute: windows.minute.len(),
      delayed_acquisitions: self.delayed_acquisitions.load(Ordering::Relaxed),
      retries: self.retries.load(Ordering::Relaxed),
    }
  }
}

impl std::fmt::Debug for RateLimiter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RateLimiter")
      .field("name", &self.name)
      .field("config", &self.config)
      .finish()
  }
}
