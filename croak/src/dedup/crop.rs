use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Deduplicator, Worker};
use crate::exchange::{Exchange, KeyId};

type Bucket = DashMap<KeyId, Arc<Exchange>>;

#[derive(Debug, Clone, Copy)]
struct Ring {
  current: usize,
  previous: usize,
}

#[derive(Debug)]
struct Buckets {
  buckets: [Bucket; 3],
  ring: RwLock<Ring>,
}

impl Buckets {
  fn ring(&self) -> Ring {
    *self.ring.read().unwrap_or_else(PoisonError::into_inner)
  }

  /// Advance the ring and recycle the bucket that fell out of the window
  fn rotate(&self) {
    let future = {
      let mut ring = self.ring.write().unwrap_or_else(PoisonError::into_inner);
      ring.previous = ring.current;
      ring.current = (ring.current + 1) % 3;
      (ring.current + 1) % 3
    };

    // only ever written while it is current, so nothing races this
    let dropped = self.buckets[future].len();
    self.buckets[future].clear();
    log::trace!(target: "croak", "crop rotation dropped {} exchanges", dropped);
  }
}

/// Deduplicator keeping exchanges in three buckets rotated every period.
///
/// New exchanges land in the current bucket; lookups also consult the previous one.
/// On rotation the oldest bucket is cleared wholesale, so an exchange is
/// retained for between one and two periods, and eviction is O(1) per rotation.
#[derive(Debug)]
pub struct CropRotation {
  inner: Arc<Buckets>,
  period: Duration,
  worker: Worker,
}

impl CropRotation {
  /// Rotate every `period`
  pub fn new(period: Duration) -> Self {
    Self { inner: Arc::new(Buckets { buckets: Default::default(),
                                     ring: RwLock::new(Ring { current: 0,
                                                              previous: 0 }) }),
           period,
           worker: Worker::default() }
  }

  /// Rotate now
  pub fn rotate(&self) {
    self.inner.rotate()
  }
}

impl Deduplicator for CropRotation {
  fn find_previous(&self, key: KeyId, exchange: Arc<Exchange>) -> Option<Arc<Exchange>> {
    // held for the whole operation so a rotation can't interleave
    let ring = self.inner.ring.read().unwrap_or_else(PoisonError::into_inner);
    let buckets = &self.inner.buckets;

    match buckets[ring.current].entry(key) {
      | Entry::Occupied(prev) => Some(prev.get().clone()),
      | Entry::Vacant(slot) => {
        let promoted = Some(ring.previous).filter(|p| *p != ring.current)
                                          .and_then(|p| buckets[p].get(&key))
                                          .map(|prev| prev.value().clone());

        match promoted {
          | Some(prev) => {
            slot.insert(prev.clone());
            Some(prev)
          },
          | None => {
            slot.insert(exchange);
            None
          },
        }
      },
    }
  }

  fn find(&self, key: &KeyId) -> Option<Arc<Exchange>> {
    let Ring { current, previous } = self.inner.ring();
    self.inner.buckets[current].get(key)
                               .or_else(|| self.inner.buckets[previous].get(key))
                               .map(|ex| ex.value().clone())
  }

  fn start(&self) {
    let inner = self.inner.clone();
    self.worker
        .start("crop-rotation", self.period, move || inner.rotate());
  }

  fn stop(&self) {
    self.worker.stop();
    self.clear();
  }

  fn clear(&self) {
    self.inner.buckets.iter().for_each(|b| b.clear());
  }

  fn len(&self) -> usize {
    let ring = self.inner.ring.read().unwrap_or_else(PoisonError::into_inner);
    let current = &self.inner.buckets[ring.current];
    if ring.current == ring.previous {
      current.len()
    } else {
      // promoted exchanges live in both
      let only_previous = self.inner.buckets[ring.previous].iter()
                                                           .filter(|e| !current.contains_key(e.key()))
                                                           .count();
      current.len() + only_previous
    }
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use croak_msg::{Id, Type};

  use super::*;
  use crate::test;

  fn exchange(id: u16) -> (KeyId, Arc<Exchange>) {
    let req = test::req(Type::Con, Id(id), "a");
    (KeyId::mid(req.as_ref().map(|r| r.msg())), Arc::new(Exchange::new(req, None)))
  }

  #[test]
  fn survives_one_rotation_and_expires_after_two() {
    let dedup = CropRotation::new(Duration::from_secs(60));
    let (key, ex) = exchange(1);
    assert!(dedup.find_previous(key, ex.clone()).is_none());

    dedup.rotate();
    assert!(Arc::ptr_eq(&dedup.find(&key).unwrap(), &ex));

    dedup.rotate();
    assert!(dedup.find(&key).is_none());
    assert!(dedup.is_empty());
  }

  #[test]
  fn previous_is_promoted_into_current() {
    let dedup = CropRotation::new(Duration::from_secs(60));
    let (key, ex) = exchange(1);
    dedup.find_previous(key, ex.clone());

    dedup.rotate();
    let (_, dup) = exchange(1);
    let found = dedup.find_previous(key, dup).unwrap();
    assert!(Arc::ptr_eq(&found, &ex));
    assert_eq!(dedup.len(), 1);

    // promoted, so it outlives the bucket it was created in
    dedup.rotate();
    assert!(Arc::ptr_eq(&dedup.find(&key).unwrap(), &ex));
  }

  #[test]
  fn len_stays_consistent_while_rotating() {
    let dedup = Arc::new(CropRotation::new(Duration::from_secs(60)));
    (0..64).for_each(|id| {
             let (key, ex) = exchange(id);
             dedup.find_previous(key, ex);
           });

    let rotator = {
      let dedup = dedup.clone();
      thread::spawn(move || {
        (64..128).for_each(|id| {
                   let (key, ex) = exchange(id);
                   dedup.find_previous(key, ex);
                   dedup.rotate();
                 })
      })
    };

    while !rotator.is_finished() {
      assert!(dedup.len() <= 128);
    }
    rotator.join().unwrap();

    // last two rotations keep only the final exchange
    assert_eq!(dedup.len(), 1);
  }

  #[test]
  fn worker_expires_exchanges() {
    let dedup = CropRotation::new(Duration::from_millis(10));
    dedup.start();
    let (key, ex) = exchange(1);
    dedup.find_previous(key, ex);

    thread::sleep(Duration::from_millis(150));
    assert!(dedup.find(&key).is_none());
    dedup.stop();
  }
}
