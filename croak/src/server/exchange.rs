use std::sync::Arc;

use croak_msg::{no_repeat, repeat, CodeKind, Code, ContentFormat, Id, Message, OptValue, Type};
use serde::Serialize;

use crate::exchange::{Exchange, ExchangeState};
use crate::net::{Addrd, Outbox};
use crate::observe::Observers;
use crate::req::Req;
use crate::resource::{ResourceId, ResourceTree};
use crate::resp::{code, Resp};

/// Max-Age a response carries when none is given (RFC7252 section 5.10.5)
pub const DEFAULT_MAX_AGE: u32 = 60;

/// Errors encounterable responding to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
  /// The exchange already has a final response (or was rejected)
  #[error("exchange already responded to")]
  AlreadyResponded,
  /// The message passed as a response has a request or empty code
  #[error("{0} is not a response code")]
  NotAResponse(Code),
}

/// What a [`Resource`](crate::resource::Resource) handler gets to inspect the request
/// and answer it.
///
/// A handler must finish with exactly one of [`CoapExchange::reject`] or one of the
/// `respond` family. [`CoapExchange::accept`] may precede the response when producing it takes a while.
///
/// ```
/// use std::sync::Arc;
///
/// use croak::resource::Resource;
/// use croak::resp::code;
/// use croak::server::CoapExchange;
///
/// #[derive(Debug)]
/// struct Things;
///
/// impl Resource for Things {
///   fn name(&self) -> &str {
///     "things"
///   }
///
///   fn handle_post(&self, ex: &mut CoapExchange) {
///     ex.set_location_path("things/12");
///     ex.respond(code::CREATED).ok();
///   }
/// }
/// ```
pub struct CoapExchange<'a> {
  exchange: Arc<Exchange>,
  tree: &'a ResourceTree,
  observers: &'a Observers,
  outbox: &'a dyn Outbox,
  location_path: Option<String>,
  location_query: Option<String>,
  max_age: u32,
  etag: Option<Vec<u8>>,
}

impl<'a> std::fmt::Debug for CoapExchange<'a> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CoapExchange")
     .field("exchange", &self.exchange)
     .field("location_path", &self.location_path)
     .field("location_query", &self.location_query)
     .field("max_age", &self.max_age)
     .field("etag", &self.etag)
     .finish()
  }
}

impl<'a> CoapExchange<'a> {
  pub(crate) fn new(exchange: Arc<Exchange>,
                    tree: &'a ResourceTree,
                    observers: &'a Observers,
                    outbox: &'a dyn Outbox)
                    -> Self {
    Self { exchange,
           tree,
           observers,
           outbox,
           location_path: None,
           location_query: None,
           max_age: DEFAULT_MAX_AGE,
           etag: None }
  }

  /// The request being handled
  pub fn request(&self) -> &Addrd<Req> {
    self.exchange.request()
  }

  /// The underlying exchange
  pub fn exchange(&self) -> &Arc<Exchange> {
    &self.exchange
  }

  /// The resource the request was dispatched to
  pub fn resource(&self) -> Option<ResourceId> {
    self.exchange.resource()
  }

  /// The tree the resource lives in
  pub fn resources(&self) -> &ResourceTree {
    self.tree
  }

  /// Observe relations of the tree
  pub fn observers(&self) -> &Observers {
    self.observers
  }

  /// Location-Path of the response (e.g. the resource a POST created)
  pub fn set_location_path(&mut self, path: impl ToString) {
    self.location_path = Some(path.to_string());
  }

  /// Location-Query of the response
  pub fn set_location_query(&mut self, query: impl ToString) {
    self.location_query = Some(query.to_string());
  }

  /// Max-Age of the response in seconds
  pub fn set_max_age(&mut self, seconds: u32) {
    self.max_age = seconds;
  }

  /// ETag of the response
  pub fn set_etag(&mut self, etag: impl AsRef<[u8]>) {
    self.etag = Some(etag.as_ref().to_vec());
  }

  /// Announce that the response will follow separately.
  ///
  /// CONfirmable requests are acknowledged with an empty ACK right away.
  /// Does nothing if the request was already accepted or answered.
  pub fn accept(&mut self) {
    let req = self.exchange.request();
    let ack = match req.data().msg_type() {
      | Type::Con => Some(self.exchange.reply(req.data().msg().ack(req.data().msg_id()))),
      | _ => None,
    };

    if self.exchange.accept(ack.clone()) {
      if let Some(ack) = ack {
        log::trace!(target: "croak", "accepted; sending {}", crate::logging::msg_summary(ack.data().msg()));
        self.outbox.send(ack.map(Message::from));
      }
    }
  }

  /// Reject the request with RST
  pub fn reject(&mut self) -> Result<(), ExchangeError> {
    let rst = self.exchange.reply(self.request().data().msg().reset());
    if self.exchange.complete(rst, true) {
      Ok(())
    } else {
      log::error!(target: "croak", "rejecting an exchange that was already responded to");
      Err(ExchangeError::AlreadyResponded)
    }
  }

  /// Respond with a code and no payload
  pub fn respond(&mut self, code: Code) -> Result<(), ExchangeError> {
    self.respond_payload(code, b"")
  }

  /// Respond with a code and payload
  pub fn respond_payload(&mut self, code: Code, payload: impl AsRef<[u8]>) -> Result<(), ExchangeError> {
    let mut resp = Resp::from(Message::new(Type::Non, code, Id(0), self.request().data().msg_token()));
    resp.set_payload(payload.as_ref().iter().copied());
    self.respond_with(resp)
  }

  /// Respond with a code and payload of a given content format
  pub fn respond_content(&mut self,
                         code: Code,
                         payload: impl AsRef<[u8]>,
                         format: ContentFormat)
                         -> Result<(), ExchangeError> {
    let mut resp = Resp::from(Message::new(Type::Non, code, Id(0), self.request().data().msg_token()));
    resp.set_payload(payload.as_ref().iter().copied());
    resp.msg_mut().set_content_format(format);
    self.respond_with(resp)
  }

  /// Respond with a value serialized as JSON.
  ///
  /// Serialization failures are answered with `5.00 Internal Server Error`.
  pub fn respond_json<T>(&mut self, code: Code, value: &T) -> Result<(), ExchangeError>
    where T: Serialize
  {
    match serde_json::to_vec(value) {
      | Ok(json) => self.respond_content(code, json, ContentFormat::Json),
      | Err(e) => {
        log::error!(target: "croak", "failed to serialize response: {}", e);
        self.respond(code::INTERNAL_SERVER_ERROR)
      },
    }
  }

  /// Respond with a prebuilt response.
  ///
  /// The response's code, options & payload are kept; its type, id & token
  /// are replaced to fit the request, and its session by the request's.
  pub fn respond_with(&mut self, mut resp: Resp) -> Result<(), ExchangeError> {
    let code = resp.code();
    if code.kind() != CodeKind::Response {
      log::error!(target: "croak", "refusing to respond with non-response code {}", code);
      return Err(ExchangeError::NotAResponse(code));
    }

    if self.exchange.is_complete() {
      log::error!(target: "croak",
                  "handler responded more than once to {}",
                  crate::logging::msg_summary(self.request().data().msg()));
      return Err(ExchangeError::AlreadyResponded);
    }

    self.fit_to_request(resp.msg_mut());
    self.shape(resp.msg_mut());
    self.observers.check(self.tree, &self.exchange, resp.msg_mut());

    log::trace!(target: "croak", "responding {}", crate::logging::msg_summary(resp.msg()));
    if self.exchange.complete(self.exchange.reply(resp), false) {
      Ok(())
    } else {
      Err(ExchangeError::AlreadyResponded)
    }
  }

  /// Has a final response been deposited?
  pub fn is_responded(&self) -> bool {
    self.exchange.is_complete()
  }

  /// Pick the type, id & token of a response to this request
  fn fit_to_request(&self, msg: &mut Message) {
    let req = self.request().data();
    msg.token = req.msg_token();

    match (self.exchange.state(), req.msg_type()) {
      | (ExchangeState::Accepted, Type::Con) => {
        msg.ty = Type::Con;
        msg.id = Id(0);
      },
      | (_, Type::Con) => {
        msg.ty = Type::Ack;
        msg.id = req.msg_id();
      },
      | _ => {
        msg.ty = Type::Non;
        msg.id = Id(0);
      },
    }
  }

  /// Apply shaping fields that differ from their defaults to options the response doesn't already carry
  fn shape(&self, msg: &mut Message) {
    if let Some(path) = self.location_path.as_deref() {
      if !msg.has(repeat::LOCATION_PATH) {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .for_each(|seg| msg.add(repeat::LOCATION_PATH, OptValue::from(seg)));
      }
    }

    if let Some(query) = self.location_query.as_deref() {
      if !msg.has(repeat::LOCATION_QUERY) {
        query.split('&')
             .filter(|seg| !seg.is_empty())
             .for_each(|seg| msg.add(repeat::LOCATION_QUERY, OptValue::from(seg)));
      }
    }

    if self.max_age != DEFAULT_MAX_AGE && !msg.has(no_repeat::MAX_AGE) {
      msg.set_uint(no_repeat::MAX_AGE, self.max_age);
    }

    if let Some(etag) = self.etag.as_ref() {
      if !msg.has(repeat::ETAG) {
        msg.set(repeat::ETAG, OptValue(etag.clone()));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::net::Session;
  use crate::test;

  struct Fixture {
    tree: ResourceTree,
    observers: Observers,
    sent: test::Sent,
  }

  impl Fixture {
    fn new() -> Self {
      Self { tree: ResourceTree::new(),
             observers: Observers::default(),
             sent: test::Sent::default() }
    }

    fn exchange(&self, ty: Type) -> (Arc<Exchange>, CoapExchange<'_>) {
      self.exchange_in(ty, None)
    }

    fn exchange_in(&self, ty: Type, session: Option<Session>) -> (Arc<Exchange>, CoapExchange<'_>) {
      let ex = Arc::new(Exchange::new(test::req(ty, Id(7), "a"), session));
      let coap = CoapExchange::new(ex.clone(), &self.tree, &self.observers, &self.sent);
      (ex, coap)
    }
  }

  #[test]
  fn con_request_gets_piggybacked_ack() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);

    coap.respond_payload(code::CONTENT, "hi").unwrap();

    let resp = ex.latest_response().unwrap();
    assert_eq!(resp.data().msg_type(), Type::Ack);
    assert_eq!(resp.data().msg_id(), Id(7));
    assert_eq!(resp.data().token(), test::token());
    assert_eq!(resp.data().payload(), b"hi");
    assert_eq!(resp.data().session(), None);
    assert_eq!(resp.addr(), test::addr(1234));
  }

  #[test]
  fn non_request_gets_non_response() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Non);
    coap.respond(code::CONTENT).unwrap();

    let resp = ex.latest_response().unwrap();
    assert_eq!(resp.data().msg_type(), Type::Non);
    assert_eq!(resp.data().msg_id(), Id(0));
  }

  #[test]
  fn accept_sends_empty_ack_then_separate_con() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);

    coap.accept();
    coap.respond(code::CONTENT).unwrap();

    let sent = f.sent.all();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data().ty, Type::Ack);
    assert_eq!(sent[0].data().code, Code::EMPTY);
    assert_eq!(sent[0].data().id, Id(7));

    let resp = ex.latest_response().unwrap();
    assert_eq!(resp.data().msg_type(), Type::Con);
    assert_eq!(resp.data().msg_id(), Id(0));
    assert_eq!(ex.first_response().map(|r| r.map(Message::from)),
               Some(sent[0].clone()));
  }

  #[test]
  fn every_deposit_carries_the_request_session() {
    let f = Fixture::new();
    let session = Session { id: 7,
                            peer_identity: Some("frog".into()) };
    let (ex, mut coap) = f.exchange_in(Type::Con, Some(session.clone()));

    coap.accept();
    coap.respond_with(Resp::from(Message::new(Type::Non, code::CONTENT, Id(0), Default::default())))
        .unwrap();

    let deposited = ex.responses();
    assert_eq!(deposited.len(), 2);
    assert!(deposited.iter()
                     .all(|r| r.data().session() == Some(&session)));

    let (ex, mut coap) = f.exchange_in(Type::Con, Some(session.clone()));
    coap.reject().unwrap();
    assert_eq!(ex.latest_response().unwrap().data().session(),
               Some(&session));
  }

  #[test]
  fn second_respond_is_refused() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);

    coap.respond(code::CONTENT).unwrap();
    assert_eq!(coap.respond(code::CHANGED),
               Err(ExchangeError::AlreadyResponded));
    assert_eq!(coap.reject(), Err(ExchangeError::AlreadyResponded));
    assert_eq!(ex.responses().len(), 1);
    assert_eq!(ex.latest_response().unwrap().data().code(), code::CONTENT);
  }

  #[test]
  fn non_response_code_is_refused() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);

    assert_eq!(coap.respond(Code::GET),
               Err(ExchangeError::NotAResponse(Code::GET)));
    assert!(ex.responses().is_empty());
    assert!(!coap.is_responded());
  }

  #[test]
  fn reject_deposits_rst() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);
    coap.reject().unwrap();

    assert_eq!(ex.state(), ExchangeState::Rejected);
    assert_eq!(ex.latest_response().unwrap().data().msg_type(), Type::Reset);
  }

  #[test]
  fn shaping_applies_only_non_defaults() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);
    coap.respond(code::CONTENT).unwrap();

    let resp = Message::from(ex.latest_response().unwrap().unwrap());
    assert!(!resp.has(no_repeat::MAX_AGE));
    assert!(!resp.has(repeat::LOCATION_PATH));
    assert!(!resp.has(repeat::ETAG));

    let (ex, mut coap) = f.exchange(Type::Con);
    coap.set_max_age(10);
    coap.set_etag([1, 2, 3]);
    coap.set_location_path("/things/12");
    coap.set_location_query("a=b&c");
    coap.respond(code::CREATED).unwrap();

    let resp = Message::from(ex.latest_response().unwrap().unwrap());
    assert_eq!(resp.get_uint(no_repeat::MAX_AGE), Some(10));
    assert_eq!(resp.get_first(repeat::ETAG), Some(&OptValue(vec![1, 2, 3])));
    assert_eq!(resp.get(repeat::LOCATION_PATH).map(|v| v.len()), Some(2));
    assert_eq!(resp.get(repeat::LOCATION_QUERY).map(|v| v.len()), Some(2));
  }

  #[test]
  fn shaping_never_overrides_existing_options() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);
    coap.set_max_age(10);

    let mut resp = Resp::from(Message::new(Type::Ack, code::CONTENT, Id(0), Default::default()));
    resp.msg_mut().set_uint(no_repeat::MAX_AGE, 99);
    coap.respond_with(resp).unwrap();

    let resp = Message::from(ex.latest_response().unwrap().unwrap());
    assert_eq!(resp.get_uint(no_repeat::MAX_AGE), Some(99));
  }

  #[test]
  fn respond_json() {
    let f = Fixture::new();
    let (ex, mut coap) = f.exchange(Type::Con);
    coap.respond_json(code::CONTENT, &vec!["a", "b"]).unwrap();

    let resp = Message::from(ex.await_response(Duration::from_millis(10)).unwrap().unwrap());
    assert_eq!(resp.content_format(), Some(ContentFormat::Json));
    assert_eq!(resp.payload.0, br#"["a","b"]"#.to_vec());
  }
}
