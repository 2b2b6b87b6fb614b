// stocksent/src/base.rs
// Base error definitions shared by every collaborator and the orchestration layer

use thiserror::Error;

/// Errors that can occur while fetching news, tickers or advice.
///
/// The type is `Clone` because a single-flight execution hands the same
/// outcome to every attached caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StockSentError {
  #[error("Configuration error: {0}")]
  ConfigurationError(String),

  #[error("Network error: {0}")]
  NetworkError(String),

  #[error("Upstream returned HTTP {0}: {1}")]
  HttpStatus(u16, String),

  #[error("Schema error: {0}")]
  SchemaError(String),

  #[error("Operation cancelled")]
  Cancelled,

  #[error("Invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("Internal error: {0}")]
  InternalError(String),
}

impl StockSentError {
  /// Transient upstream failures are worth another attempt; malformed
  /// payloads, bad input and cancellation are not.
  pub fn is_retryable(&self) -> bool {
    matches!(self, StockSentError::NetworkError(_) | StockSentError::HttpStatus(_, _))
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, StockSentError::Cancelled)
  }

  /// Short message suitable for showing to an end user.
  pub fn user_message(&self) -> String {
    match self {
      StockSentError::ConfigurationError(msg) => format!("The application is misconfigured: {}", msg),
      StockSentError::NetworkError(_) => "Could not reach the news service. Check your connection and try again.".to_string(),
      StockSentError::HttpStatus(429, _) => "The news service is busy (rate limited). Please try again shortly.".to_string(),
      StockSentError::HttpStatus(code, _) => format!("The news service returned an error (HTTP {}).", code),
      StockSentError::SchemaError(_) => "The news service sent data we could not read.".to_string(),
      StockSentError::Cancelled => "Request cancelled.".to_string(),
      StockSentError::InvalidParameter(msg) => format!("Invalid input: {}", msg),
      StockSentError::InternalError(_) => "Something went wrong. Please try again.".to_string(),
    }
  }
}

impl From<reqwest::Error> for StockSentError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      StockSentError::SchemaError(e.to_string())
    } else if let Some(status) = e.status() {
      StockSentError::HttpStatus(status.as_u16(), e.to_string())
    } else {
      StockSentError::NetworkError(e.to_string())
    }
  }
}

impl From<serde_json::Error> for StockSentError {
  fn from(e: serde_json::Error) -> Self {
    StockSentError::SchemaError(e.to_string())
  }
}
