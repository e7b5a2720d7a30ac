use std::fmt::Debug;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{Config, DedupStrategy};
use crate::exchange::{Exchange, KeyId};

mod crop;
mod sweep;

pub use crop::CropRotation;
pub use sweep::Sweep;

/// Retains recent exchanges so that retransmitted requests
/// resolve to the exchange they duplicate instead of being processed again.
pub trait Deduplicator: Send + Sync + Debug {
  /// Atomic find-or-insert.
  ///
  /// If an exchange is retained for `key`, yields it and `exchange` is discarded.
  /// Otherwise `exchange` is retained and `None` is yielded.
  ///
  /// Of any number of concurrent callers with the same key, exactly one sees `None`.
  fn find_previous(&self, key: KeyId, exchange: Arc<Exchange>) -> Option<Arc<Exchange>>;

  /// Read-only lookup
  fn find(&self, key: &KeyId) -> Option<Arc<Exchange>>;

  /// Start the background eviction worker
  fn start(&self);

  /// Stop the background eviction worker and forget everything.
  ///
  /// Stopping a stopped deduplicator does nothing.
  fn stop(&self);

  /// Forget everything
  fn clear(&self);

  /// Number of retained exchanges
  fn len(&self) -> usize;

  /// Is nothing retained?
  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Create the deduplicator `config` asks for
///
/// ```
/// use croak::config::{Config, DedupStrategy};
///
/// let mut config = Config::default();
/// config.dedup.strategy = DedupStrategy::CropRotation;
///
/// let dedup = croak::dedup::from_config(&config);
/// assert!(dedup.is_empty());
/// ```
pub fn from_config(config: &Config) -> Arc<dyn Deduplicator> {
  match config.dedup.strategy {
    | DedupStrategy::Sweep => {
      Arc::new(Sweep::new(config.exchange_lifetime(), config.dedup.sweep_interval))
    },
    | DedupStrategy::CropRotation => Arc::new(CropRotation::new(config.rotation_period())),
  }
}

/// A thread invoking a task every `period` until stopped
#[derive(Debug, Default)]
pub(crate) struct Worker {
  running: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl Worker {
  /// Spawn the thread, unless it is already running
  pub(crate) fn start<F>(&self, name: &str, period: Duration, task: F)
    where F: Fn() + Send + 'static
  {
    let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
    if running.is_some() {
      log::debug!(target: "croak", "{} worker already running", name);
      return;
    }

    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = thread::Builder::new().name(format!("croak-{}", name))
                                        .spawn(move || loop {
                                          match stopped.recv_timeout(period) {
                                            | Err(RecvTimeoutError::Timeout) => task(),
                                            | Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                                              break
                                            },
                                          }
                                        });

    match spawned {
      | Ok(handle) => {
        log::debug!(target: "croak", "{} worker started, period {:?}", name, period);
        *running = Some((stop, handle));
      },
      | Err(e) => log::error!(target: "croak", "failed to spawn {} worker: {}", name, e),
    }
  }

  /// Stop the thread and wait for it to exit
  pub(crate) fn stop(&self) {
    let running = self.running
                      .lock()
                      .unwrap_or_else(PoisonError::into_inner)
                      .take();

    if let Some((stop, handle)) = running {
      stop.send(()).ok();
      if handle.join().is_err() {
        log::error!(target: "croak", "dedup worker panicked");
      }
    }
  }

  pub(crate) fn is_running(&self) -> bool {
    self.running
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
  }
}
