// stocksent/src/cache.rs

//! In-process key/value cache.
//!
//! The default [`CachePolicy`] keeps entries for the lifetime of the process
//! with no eviction, which suits a single-session client. A size bound or a
//! time-to-live can be switched on through the policy.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use log::debug;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CachePolicy {
  /// Evict the oldest insertion once this many entries are held.
  pub max_entries: Option<usize>,
  /// Entries older than this are treated as missing.
  pub ttl: Option<Duration>,
}

impl CachePolicy {
  pub fn unbounded() -> Self {
    Self::default()
  }
}

#[derive(Debug)]
struct CacheEntry<V> {
  value: V,
  inserted_at: Instant,
  seq: u64,
}

#[derive(Debug)]
struct CacheState<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  next_seq: u64,
}

#[derive(Debug)]
pub struct MemoryCache<K, V> {
  policy: CachePolicy,
  state: RwLock<CacheState<K, V>>,
}

impl<K, V> MemoryCache<K, V>
where
  K: Eq + Hash + Clone + std::fmt::Debug,
  V: Clone,
{
  pub fn new(policy: CachePolicy) -> Self {
    Self {
      policy,
      state: RwLock::new(CacheState { entries: HashMap::new(), next_seq: 0 }),
    }
  }

  pub fn unbounded() -> Self {
    Self::new(CachePolicy::unbounded())
  }

  pub fn get(&self, key: &K) -> Option<V> {
    let state = self.state.read();
    let entry = state.entries.get(key)?;
    if let Some(ttl) = self.policy.ttl {
      if entry.inserted_at.elapsed() >= ttl {
        debug!("Cache entry {:?} expired", key);
        return None;
      }
    }
    Some(entry.value.clone())
  }

  pub fn insert(&self, key: K, value: V) {
    let mut state = self.state.write();
    let seq = state.next_seq;
    state.next_seq += 1;
    state.entries.insert(key, CacheEntry { value, inserted_at: Instant::now(), seq });

    if let Some(ttl) = self.policy.ttl {
      state.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
    }
    if let Some(max) = self.policy.max_entries {
      while state.entries.len() > max {
        let oldest = state.entries.iter().min_by_key(|(_, e)| e.seq).map(|(k, _)| k.clone());
        match oldest {
          Some(k) => {
            debug!("Evicting cache entry {:?}", k);
            state.entries.remove(&k);
          }
          None => break,
        }
      }
    }
  }

  pub fn remove(&self, key: &K) -> Option<V> {
    self.state.write().entries.remove(key).map(|e| e.value)
  }

  pub fn contains(&self, key: &K) -> bool {
    self.get(key).is_some()
  }

  pub fn len(&self) -> usize {
    self.state.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    self.state.write().entries.clear();
  }

  pub fn keys(&self) -> Vec<K> {
    self.state.read().entries.keys().cloned().collect()
  }
}
