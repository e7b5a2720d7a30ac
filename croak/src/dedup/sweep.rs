use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Deduplicator, Worker};
use crate::exchange::{Exchange, KeyId};

/// Deduplicator that keeps every exchange in one sharded map
/// and periodically removes those older than the exchange lifetime.
///
/// The sweep locks one shard at a time, so lookups of keys in other shards proceed during a sweep.
#[derive(Debug)]
pub struct Sweep {
  exchanges: Arc<DashMap<KeyId, Arc<Exchange>>>,
  lifetime: Duration,
  interval: Duration,
  worker: Worker,
}

impl Sweep {
  /// Retain exchanges for `lifetime`, checking for expired ones every `interval`
  pub fn new(lifetime: Duration, interval: Duration) -> Self {
    Self { exchanges: Default::default(),
           lifetime,
           interval,
           worker: Worker::default() }
  }

  /// Remove exchanges older than the lifetime now, yielding how many were removed
  pub fn sweep(&self) -> usize {
    sweep(&self.exchanges, self.lifetime)
  }
}

fn sweep(exchanges: &DashMap<KeyId, Arc<Exchange>>, lifetime: Duration) -> usize {
  let now = Instant::now();
  let before = exchanges.len();
  exchanges.retain(|_, ex| !ex.is_expired(now, lifetime));
  let removed = before.saturating_sub(exchanges.len());

  if removed > 0 {
    log::trace!(target: "croak", "sweep removed {} expired exchanges", removed);
  }

  removed
}

impl Deduplicator for Sweep {
  fn find_previous(&self, key: KeyId, exchange: Arc<Exchange>) -> Option<Arc<Exchange>> {
    match self.exchanges.entry(key) {
      | Entry::Occupied(prev) => Some(prev.get().clone()),
      | Entry::Vacant(slot) => {
        slot.insert(exchange);
        None
      },
    }
  }

  fn find(&self, key: &KeyId) -> Option<Arc<Exchange>> {
    self.exchanges.get(key).map(|ex| ex.value().clone())
  }

  fn start(&self) {
    let (exchanges, lifetime) = (self.exchanges.clone(), self.lifetime);
    self.worker.start("sweep", self.interval, move || {
                 sweep(&exchanges, lifetime);
               });
  }

  fn stop(&self) {
    self.worker.stop();
    self.clear();
  }

  fn clear(&self) {
    self.exchanges.clear();
  }

  fn len(&self) -> usize {
    self.exchanges.len()
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use croak_msg::{Id, Type};

  use super::*;
  use crate::test;

  fn retain(dedup: &Sweep, id: u16) -> KeyId {
    let req = test::req(Type::Con, Id(id), "a");
    let key = KeyId::mid(req.as_ref().map(|r| r.msg()));
    dedup.find_previous(key, Arc::new(Exchange::new(req, None)));
    key
  }

  #[test]
  fn sweep_removes_only_expired() {
    let dedup = Sweep::new(Duration::from_millis(30), Duration::from_secs(60));
    let old = retain(&dedup, 1);
    thread::sleep(Duration::from_millis(50));
    let young = retain(&dedup, 2);

    assert_eq!(dedup.sweep(), 1);
    assert!(dedup.find(&old).is_none());
    assert!(dedup.find(&young).is_some());
  }

  #[test]
  fn worker_expires_exchanges() {
    let dedup = Sweep::new(Duration::from_millis(20), Duration::from_millis(5));
    dedup.start();
    let key = retain(&dedup, 1);
    assert!(dedup.find(&key).is_some());

    thread::sleep(Duration::from_millis(150));
    assert!(dedup.find(&key).is_none());
    dedup.stop();
  }
}
