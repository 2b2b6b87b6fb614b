// stocksent/src/cancel.rs

//! Cooperative cancellation for long-running pipeline work.
//!
//! A [`CancellationToken`] is a cheap, cloneable flag. Work that honours it
//! checks [`CancellationToken::check`] at well-defined points (top of each
//! day iteration, before each upstream attempt) and may also race a sleep
//! against [`CancellationToken::cancelled`].

use crate::base::StockSentError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TokenState {
  cancelled: AtomicBool,
  notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  inner: Arc<TokenState>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation. Idempotent.
  pub fn cancel(&self) {
    if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
      log::debug!("Cancellation requested");
    }
    self.inner.notify.notify_waiters();
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::SeqCst)
  }

  /// Returns `Err(Cancelled)` once cancellation has been requested.
  pub fn check(&self) -> Result<(), StockSentError> {
    if self.is_cancelled() {
      Err(StockSentError::Cancelled)
    } else {
      Ok(())
    }
  }

  /// Resolves when the token is cancelled.
  pub async fn cancelled(&self) {
    loop {
      // Register interest before testing the flag so a concurrent cancel() is not missed.
      let notified = self.inner.notify.notified();
      if self.is_cancelled() {
        return;
      }
      notified.await;
    }
  }
}
