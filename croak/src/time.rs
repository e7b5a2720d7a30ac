use std::time::Instant;

/// Data associated with the instant it was created / received / completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamped<T>(pub T, pub Instant);

impl<T> Stamped<T> {
  /// Stamp `t` with [`Instant::now`]
  pub fn now(t: T) -> Self {
    Self(t, Instant::now())
  }

  /// Borrow the stamped data
  pub fn as_ref(&self) -> Stamped<&T> {
    Stamped(&self.0, self.1)
  }

  /// Borrow the stamped data
  pub fn data(&self) -> &T {
    &self.0
  }

  /// When the data was stamped
  pub fn time(&self) -> Instant {
    self.1
  }

  /// Throw away the timestamp
  pub fn discard_timestamp(self) -> T {
    self.0
  }

  /// Map the stamped data, keeping the timestamp
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Stamped<R> {
    Stamped(f(self.0), self.1)
  }

  /// Fold function picking the most recent of two stamped values
  pub fn find_latest(winner: Option<Stamped<T>>, cur: Stamped<T>) -> Option<Stamped<T>> {
    Some(winner.filter(|winner| winner.time() > cur.time())
               .unwrap_or(cur))
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[test]
  fn find_latest() {
    let t0 = Instant::now();
    let a = Stamped("a", t0);
    let b = Stamped("b", t0 + Duration::from_millis(1));
    let c = Stamped("c", t0 + Duration::from_millis(2));

    let latest = [b, c, a].into_iter().fold(None, Stamped::find_latest);
    assert_eq!(latest.map(Stamped::discard_timestamp), Some("c"));
  }
}
