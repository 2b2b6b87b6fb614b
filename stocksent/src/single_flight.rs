// stocksent/src/single_flight.rs

//! Keyed de-duplication of concurrent identical requests.
//!
//! [`SingleFlight::run`] keeps at most one live execution per key. The first
//! caller registers the execution; callers arriving while it is still running
//! attach to it and receive a clone of the same outcome. The execution is
//! spawned onto the runtime, so it completes even if the caller that started
//! it stops waiting.
//!
//! The registry lock covers both "check or register" and "deregister", and
//! deregistration happens inside the execution once its result exists. A
//! caller that misses the registration therefore always starts after the
//! previous execution has fully finished, including any cache write it made.

use crate::base::StockSentError;

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type Flight<T> = Shared<BoxFuture<'static, Result<T, StockSentError>>>;
type Registry<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Removes a key from the registry when the execution ends, including by panic.
struct Deregister<T> {
  registry: Registry<T>,
  key: String,
}

impl<T> Drop for Deregister<T> {
  fn drop(&mut self) {
    self.registry.lock().remove(&self.key);
  }
}

pub struct SingleFlight<T> {
  flights: Registry<T>,
}

impl<T> Default for SingleFlight<T> {
  fn default() -> Self {
    Self { flights: Arc::new(Mutex::new(HashMap::new())) }
  }
}

impl<T> SingleFlight<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Run `operation` for `key`, or attach to the execution already running for it.
  ///
  /// `operation` is only called when no execution is registered for `key`.
  pub async fn run<F, Fut>(&self, key: &str, operation: F) -> Result<T, StockSentError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StockSentError>> + Send + 'static,
  {
    let flight = {
      let mut flights = self.flights.lock();
      if let Some(existing) = flights.get(key) {
        debug!("Attaching to in-flight request for key '{}'", key);
        existing.clone()
      } else {
        debug!("Starting new flight for key '{}'", key);
        let guard = Deregister { registry: Arc::clone(&self.flights), key: key.to_string() };
        let work = operation();
        // The spawned task cannot deregister before we insert: it needs the lock we hold.
        let handle = tokio::spawn(async move {
          let _guard = guard;
          work.await
        });
        let owned_key = key.to_string();
        let flight: Flight<T> = handle
          .map(move |joined| match joined {
            Ok(result) => result,
            Err(e) => {
              error!("Flight for key '{}' did not complete: {}", owned_key, e);
              Err(StockSentError::InternalError(format!("request for '{}' aborted: {}", owned_key, e)))
            }
          })
          .boxed()
          .shared();
        flights.insert(key.to_string(), flight.clone());
        flight
      }
    };
    flight.await
  }

  /// Number of executions currently registered.
  pub fn in_flight(&self) -> usize {
    self.flights.lock().len()
  }
}
