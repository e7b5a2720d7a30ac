/// Value of the Observe option in a GET request
/// ([RFC7641 section 2](https://datatracker.ietf.org/doc/html/rfc7641#section-2)).
///
/// In notifications the same option carries a sequence number instead.
#[derive(Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Action {
  /// `0`; add `(peer, token)` to the resource's observers
  Register,
  /// `1`; remove `(peer, token)` from the resource's observers
  Deregister,
}

impl Action {
  /// Interpret an Observe value sent in a request
  pub fn from_uint(n: u32) -> Option<Self> {
    Some(match n {
      | 0 => Action::Register,
      | 1 => Action::Deregister,
      | _ => return None,
    })
  }
}

impl From<Action> for u32 {
  fn from(a: Action) -> Self {
    a as u32
  }
}
