use std::net::SocketAddr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use croak_msg::{Id, Message, Token};

use crate::net::{Addrd, Session};
use crate::req::Req;
use crate::resp::Resp;
use crate::resource::ResourceId;
use crate::time::Stamped;

/// Identity of an exchange for correlation & deduplication.
///
/// Message-layer duplicates are detected by `(peer, message id)`,
/// request/response correlation (e.g. observe, separate responses) by `(peer, token)`.
/// Two keys are equal iff all of their fields are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
  /// `(peer, message id)`
  Mid {
    /// Remote endpoint (address & port)
    peer: SocketAddr,
    /// Message ID
    id: Id,
  },
  /// `(peer, token)`
  Token {
    /// Remote endpoint (address & port)
    peer: SocketAddr,
    /// Message token
    token: Token,
  },
}

impl KeyId {
  /// Message-layer key of an addressed message
  pub fn mid(msg: Addrd<&Message>) -> Self {
    KeyId::Mid { peer: msg.addr(),
                 id: msg.data().id }
  }

  /// Request/response-layer key of an addressed message
  pub fn token(msg: Addrd<&Message>) -> Self {
    KeyId::Token { peer: msg.addr(),
                   token: msg.data().token }
  }

  /// The remote endpoint this key belongs to
  pub fn peer(&self) -> SocketAddr {
    match self {
      | KeyId::Mid { peer, .. } | KeyId::Token { peer, .. } => *peer,
    }
  }
}

/// Where an exchange is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
  /// Being processed; no response deposited yet
  Received,
  /// The handler announced a separate response (and for CON requests, an empty ACK was deposited)
  Accepted,
  /// A final response was deposited
  Responded,
  /// The request was rejected with RST
  Rejected,
}

/// Observe relation marker of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveState {
  /// Not an observe exchange (or the resource declined the relation)
  None,
  /// The exchange established an observe relation
  Established,
  /// The exchange canceled an observe relation
  Canceled,
}

#[derive(Debug)]
struct Inner {
  responses: Vec<Stamped<Addrd<Resp>>>,
  state: ExchangeState,
  observe: ObserveState,
  resource: Option<ResourceId>,
}

/// A request and everything sent in answer to it.
///
/// Exchanges are shared as `Arc<Exchange>`; the deduplicator owns the canonical one
/// for the length of the retention window, and the dispatcher & handler facade
/// borrow it while a request is being processed.
#[derive(Debug)]
pub struct Exchange {
  request: Addrd<Req>,
  session: Option<Session>,
  created: Instant,
  inner: Mutex<Inner>,
  responded: Condvar,
}

impl Exchange {
  /// Start a new exchange for an inbound request
  pub fn new(request: Addrd<Req>, session: Option<Session>) -> Self {
    Self { request,
           session,
           created: Instant::now(),
           inner: Mutex::new(Inner { responses: Vec::new(),
                                     state: ExchangeState::Received,
                                     observe: ObserveState::None,
                                     resource: None }),
           responded: Condvar::new() }
  }

  fn inner(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Message-layer key of this exchange's request
  pub fn key(&self) -> KeyId {
    KeyId::mid(self.request.as_ref().map(|r| r.msg()))
  }

  /// The request that started this exchange
  pub fn request(&self) -> &Addrd<Req> {
    &self.request
  }

  /// The remote endpoint that sent the request
  pub fn peer(&self) -> SocketAddr {
    self.request.addr()
  }

  /// Security session the request arrived in
  pub fn session(&self) -> Option<&Session> {
    self.session.as_ref()
  }

  /// Address `resp` to the requesting peer, under the request's session
  pub fn reply(&self, resp: impl Into<Resp>) -> Addrd<Resp> {
    let mut resp = resp.into();
    resp.set_session(self.session.clone());
    Addrd(resp, self.peer())
  }

  /// When the exchange was created
  pub fn created(&self) -> Instant {
    self.created
  }

  /// Has this exchange outlived `lifetime`?
  pub fn is_expired(&self, now: Instant, lifetime: Duration) -> bool {
    now.saturating_duration_since(self.created) > lifetime
  }

  /// Lifecycle state
  pub fn state(&self) -> ExchangeState {
    self.inner().state
  }

  /// Observe relation marker
  pub fn observe(&self) -> ObserveState {
    self.inner().observe
  }

  /// Update the observe relation marker
  pub fn set_observe(&self, observe: ObserveState) {
    self.inner().observe = observe;
  }

  /// The resource the request was dispatched to
  pub fn resource(&self) -> Option<ResourceId> {
    self.inner().resource
  }

  /// Record the resource the request was dispatched to
  pub fn set_resource(&self, id: ResourceId) {
    self.inner().resource = Some(id);
  }

  /// Deposit an interim message (the empty ACK of a separate response).
  ///
  /// Does nothing if the exchange already reached a final state.
  pub fn accept(&self, ack: Option<Addrd<Resp>>) -> bool {
    let mut inner = self.inner();
    match inner.state {
      | ExchangeState::Received => {
        inner.state = ExchangeState::Accepted;
        if let Some(ack) = ack {
          inner.responses.push(Stamped::now(ack));
          self.responded.notify_all();
        }
        true
      },
      | _ => false,
    }
  }

  /// Deposit the final message of this exchange (a response, or RST when `rejected`).
  ///
  /// Yields `false` and deposits nothing if a final message was already deposited.
  pub fn complete(&self, resp: Addrd<Resp>, rejected: bool) -> bool {
    let mut inner = self.inner();
    match inner.state {
      | ExchangeState::Responded | ExchangeState::Rejected => false,
      | ExchangeState::Received | ExchangeState::Accepted => {
        inner.state = if rejected {
          ExchangeState::Rejected
        } else {
          ExchangeState::Responded
        };
        inner.responses.push(Stamped::now(resp));
        self.responded.notify_all();
        true
      },
    }
  }

  /// Has a final message been deposited?
  pub fn is_complete(&self) -> bool {
    matches!(self.state(),
             ExchangeState::Responded | ExchangeState::Rejected)
  }

  /// Everything deposited so far, oldest first
  pub fn responses(&self) -> Vec<Addrd<Resp>> {
    self.inner()
        .responses
        .iter()
        .map(|s| s.data().clone())
        .collect()
  }

  /// The first message deposited; what answered the request at the message layer
  /// (piggybacked response, empty ACK, NON response or RST).
  pub fn first_response(&self) -> Option<Addrd<Resp>> {
    self.inner()
        .responses
        .first()
        .map(|s| s.data().clone())
  }

  /// The most recently deposited message
  pub fn latest_response(&self) -> Option<Addrd<Resp>> {
    self.inner()
        .responses
        .iter()
        .cloned()
        .fold(None, Stamped::find_latest)
        .map(Stamped::discard_timestamp)
  }

  /// Block until something has been deposited, or `timeout` elapses.
  ///
  /// Yields [`Exchange::first_response`].
  pub fn await_response(&self, timeout: Duration) -> Option<Addrd<Resp>> {
    let inner = self.inner();
    let (inner, _) = self.responded
                         .wait_timeout_while(inner, timeout, |inner| inner.responses.is_empty())
                         .unwrap_or_else(PoisonError::into_inner);
    inner.responses.first().map(|s| s.data().clone())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::thread;

  use croak_msg::Type;

  use super::*;
  use crate::test;

  #[test]
  fn keys_equal_iff_fields_equal() {
    let req = test::req(Type::Con, Id(1), "a");
    let a = KeyId::mid(req.as_ref().map(|r| r.msg()));
    let b = KeyId::mid(req.as_ref().map(|r| r.msg()));
    assert_eq!(a, b);

    let other_port = Addrd(req.data().msg().clone(), test::addr(9999));
    assert_ne!(a, KeyId::mid(other_port.as_ref()));
    assert_ne!(a, KeyId::token(req.as_ref().map(|r| r.msg())));
  }

  #[test]
  fn second_completion_is_refused() {
    let req = test::req(Type::Con, Id(1), "a");
    let ex = Exchange::new(req.clone(), None);
    let resp = ex.reply(req.data().msg().ack(req.data().msg_id()));

    assert!(ex.complete(resp.clone(), false));
    assert!(!ex.complete(resp, false));
    assert_eq!(ex.responses().len(), 1);
    assert_eq!(ex.state(), ExchangeState::Responded);
  }

  #[test]
  fn accept_then_complete() {
    let req = test::req(Type::Con, Id(1), "a");
    let ex = Exchange::new(req.clone(), None);
    let ack = ex.reply(req.data().msg().ack(req.data().msg_id()));

    assert!(ex.accept(Some(ack.clone())));
    assert!(!ex.accept(None));
    let mut resp = ack.clone();
    resp.data_mut().msg_mut().ty = Type::Con;
    assert!(ex.complete(resp.clone(), false));

    assert_eq!(ex.first_response(), Some(ack));
    assert_eq!(ex.latest_response(), Some(resp));
  }

  #[test]
  fn await_response_wakes_on_deposit() {
    let req = test::req(Type::Con, Id(1), "a");
    let ex = Arc::new(Exchange::new(req.clone(), None));

    let waiter = {
      let ex = ex.clone();
      thread::spawn(move || ex.await_response(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    let resp = ex.reply(req.data().msg().ack(req.data().msg_id()));
    ex.complete(resp.clone(), false);

    assert_eq!(waiter.join().unwrap(), Some(resp));
  }

  #[test]
  fn replies_carry_the_request_session() {
    let req = test::req(Type::Con, Id(1), "a");
    let session = Session { id: 7,
                            peer_identity: Some("frog".into()) };
    let ex = Exchange::new(req.clone(), Some(session.clone()));

    let resp = ex.reply(req.data().msg().ack(req.data().msg_id()));
    assert_eq!(resp.addr(), req.addr());
    assert_eq!(resp.data().session(), Some(&session));

    ex.complete(resp, false);
    assert_eq!(ex.latest_response().unwrap().data().session(),
               Some(&session));
  }

  #[test]
  fn await_response_times_out() {
    let ex = Exchange::new(test::req(Type::Non, Id(1), "a"), None);
    assert_eq!(ex.await_response(Duration::from_millis(10)), None);
  }
}
