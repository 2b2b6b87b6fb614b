// stocksent/src/http_util.rs
// Shared HTTP plumbing for the Finnhub and advice collaborators

use crate::base::StockSentError;

use log::debug;
use std::time::{Duration, Instant};

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, StockSentError> {
  reqwest::Client::builder()
    .timeout(timeout)
    .build()
    .map_err(|e| StockSentError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
}

/// Joins a base URL and an endpoint path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Prefixes the endpoint label onto an error converted from reqwest.
fn labelled(label: &str, e: reqwest::Error) -> StockSentError {
  match StockSentError::from(e) {
    StockSentError::NetworkError(msg) => StockSentError::NetworkError(format!("{}: {}", label, msg)),
    StockSentError::HttpStatus(code, msg) => StockSentError::HttpStatus(code, format!("{}: {}", label, msg)),
    StockSentError::SchemaError(msg) => StockSentError::SchemaError(format!("{}: {}", label, msg)),
    other => other,
  }
}

/// Sends the request and returns the body of a 2xx response.
///
/// Transport failures become `NetworkError`, other statuses `HttpStatus`.
pub(crate) async fn send_for_text(label: &str, request: reqwest::RequestBuilder) -> Result<String, StockSentError> {
  let start = Instant::now();
  let response = request.send().await.map_err(|e| labelled(label, e))?;
  let status = response.status();
  debug!("{} -> HTTP {} in {} ms", label, status.as_u16(), start.elapsed().as_millis());
  if !status.is_success() {
    let reason = status.canonical_reason().unwrap_or("unexpected status").to_string();
    return Err(StockSentError::HttpStatus(status.as_u16(), format!("{}: {}", label, reason)));
  }
  response.text().await.map_err(|e| labelled(label, e))
}
