use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use croak_msg::observe::Action;
use croak_msg::{no_repeat, CodeKind, Message, Token};

use crate::exchange::{Exchange, KeyId, ObserveState};
use crate::req::Req;
use crate::resource::{ResourceId, ResourceTree};
use crate::time::Stamped;

/// Observe sequence numbers are 24 bits wide (RFC7641 section 4.4)
const SEQUENCE_MASK: u32 = 0x00FF_FFFF;

/// A client's interest in the state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
  /// The observer
  pub peer: SocketAddr,
  /// Token notifications must carry
  pub token: Token,
  /// The registering request, stamped with when it was accepted
  pub request: Stamped<Req>,
}

impl Relation {
  /// Key identifying this relation among a resource's relations
  pub fn key(&self) -> KeyId {
    KeyId::Token { peer: self.peer,
                   token: self.token }
  }
}

#[derive(Debug, Default)]
struct Observed {
  sequence: u32,
  relations: BTreeMap<KeyId, Relation>,
}

/// Observe relations of every resource in a tree
#[derive(Debug, Default)]
pub struct Observers {
  resources: Mutex<HashMap<ResourceId, Observed>>,
}

impl Observers {
  fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, Observed>> {
    self.resources.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Add (or refresh) a relation, yielding the resource's current sequence number
  pub fn register(&self, resource: ResourceId, relation: Relation) -> u32 {
    let mut resources = self.lock();
    let observed = resources.entry(resource).or_default();
    log::debug!(target: "croak", "{} now observing {:?}", relation.peer, resource);
    observed.relations.insert(relation.key(), relation);
    observed.sequence
  }

  /// Remove a relation, yielding whether it existed
  pub fn cancel(&self, resource: ResourceId, key: &KeyId) -> bool {
    let mut resources = self.lock();
    let removed = resources.get_mut(&resource)
                           .and_then(|observed| observed.relations.remove(key))
                           .is_some();
    if removed {
      log::debug!(target: "croak", "{} stopped observing {:?}", key.peer(), resource);
    }
    removed
  }

  /// Relations on a resource
  pub fn relations(&self, resource: ResourceId) -> Vec<Relation> {
    self.lock()
        .get(&resource)
        .map(|observed| observed.relations.values().cloned().collect())
        .unwrap_or_default()
  }

  /// The resource's current notification sequence number
  pub fn sequence(&self, resource: ResourceId) -> u32 {
    self.lock()
        .get(&resource)
        .map(|observed| observed.sequence)
        .unwrap_or(0)
  }

  /// Record that a resource's state changed, yielding the new sequence number
  /// and the relations that should be notified.
  pub fn changed(&self, resource: ResourceId) -> (u32, Vec<Relation>) {
    let mut resources = self.lock();
    let observed = resources.entry(resource).or_default();
    observed.sequence = (observed.sequence + 1) & SEQUENCE_MASK;
    (observed.sequence, observed.relations.values().cloned().collect())
  }

  /// Drop every relation on a resource
  pub fn forget(&self, resource: ResourceId) {
    self.lock().remove(&resource);
  }

  /// Number of relations across all resources
  pub fn len(&self) -> usize {
    self.lock()
        .values()
        .map(|observed| observed.relations.len())
        .sum()
  }

  /// Are there no relations at all?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Establish, cancel or refuse an observe relation based on a response about to be sent,
  /// shaping the response's Observe option accordingly.
  pub(crate) fn check(&self, tree: &ResourceTree, exchange: &Exchange, resp: &mut Message) {
    let resource = match exchange.resource() {
      | Some(resource) => resource,
      | None => {
        resp.remove(no_repeat::OBSERVE);
        return;
      },
    };

    let req = exchange.request();
    let key = KeyId::token(req.as_ref().map(|r| r.msg()));
    let is_error = matches!(resp.code.kind(), CodeKind::Response) && resp.code.class >= 4;

    match req.data().msg().observe_action() {
      | Some(Action::Register)
        if resp.code.is_success() && tree.is_observable(resource) =>
      {
        let relation = Relation { peer: req.addr(),
                                  token: req.data().msg_token(),
                                  request: Stamped::now(req.data().clone()) };
        let sequence = self.register(resource, relation);
        exchange.set_observe(ObserveState::Established);
        resp.set_observe(sequence);
      },
      | Some(Action::Deregister) => {
        self.cancel(resource, &key);
        exchange.set_observe(ObserveState::Canceled);
        resp.remove(no_repeat::OBSERVE);
      },
      | _ => {
        if is_error && self.cancel(resource, &key) {
          exchange.set_observe(ObserveState::Canceled);
        }
        resp.remove(no_repeat::OBSERVE);
      },
    }
  }
}
