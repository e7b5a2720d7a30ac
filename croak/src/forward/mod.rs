use std::fmt::Debug;
use std::sync::Arc;

use croak_msg::{no_repeat, repeat, Code, Message};
use url::Url;

use crate::net::Addrd;
use crate::req::Req;
use crate::resource::{Attributes, Resource};
use crate::resp::{code, Resp};
use crate::server::CoapExchange;

mod coap2coap;
mod coap2http;
#[cfg(feature = "http")]
mod reqwest_client;

/// Mappings between CoAP and HTTP (RFC8075)
pub mod translate;

pub use coap2coap::{CoapClient, CoapForwarder};
pub use coap2http::{HttpClient, HttpError, HttpForwarder};
#[cfg(feature = "http")]
pub use reqwest_client::ReqwestClient;

/// Where a forwarded request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardState {
  /// The request arrived at the forwarding resource
  Received,
  /// The request was acknowledged; a separate response will follow
  Accepted,
  /// The second hop is in flight
  Forwarding,
  /// The origin's response was translated back
  Completed,
  /// The request's proxy target was missing or unusable
  BadOption,
  /// The origin's response couldn't be obtained or translated
  BadGateway,
  /// The origin didn't respond in time
  GatewayTimeout,
  /// The second hop failed locally
  InternalError,
}

/// Errors encounterable forwarding a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
  /// The request's proxy target was missing or unusable
  #[error("bad proxy target: {0}")]
  BadOption(String),
  /// The origin's response couldn't be obtained or translated
  #[error("bad gateway: {0}")]
  BadGateway(String),
  /// The origin didn't respond in time
  #[error("gateway timeout")]
  GatewayTimeout,
  /// The second hop failed locally
  #[error("internal error: {0}")]
  InternalError(String),
}

impl ForwardError {
  /// Response code the client should get
  ///
  /// ```
  /// use croak::forward::ForwardError;
  /// use croak::resp::code;
  ///
  /// assert_eq!(ForwardError::GatewayTimeout.code(), code::GATEWAY_TIMEOUT);
  /// ```
  pub fn code(&self) -> Code {
    match self {
      | ForwardError::BadOption(_) => code::BAD_OPTION,
      | ForwardError::BadGateway(_) => code::BAD_GATEWAY,
      | ForwardError::GatewayTimeout => code::GATEWAY_TIMEOUT,
      | ForwardError::InternalError(_) => code::INTERNAL_SERVER_ERROR,
    }
  }

  /// Terminal state of a forward failing with this error
  pub fn state(&self) -> ForwardState {
    match self {
      | ForwardError::BadOption(_) => ForwardState::BadOption,
      | ForwardError::BadGateway(_) => ForwardState::BadGateway,
      | ForwardError::GatewayTimeout => ForwardState::GatewayTimeout,
      | ForwardError::InternalError(_) => ForwardState::InternalError,
    }
  }
}

/// Something that can carry a request to another origin and bring back the response
pub trait Forward: Send + Sync + Debug {
  /// Perform the second hop.
  ///
  /// Blocks until the origin responds or the forwarder's deadline passes.
  fn forward(&self, req: &Addrd<Req>) -> Result<Resp, ForwardError>;
}

/// Either kind of forwarder
#[derive(Debug, Clone)]
pub enum Forwarder {
  /// CoAP to CoAP
  Coap(CoapForwarder),
  /// CoAP to HTTP
  Http(HttpForwarder),
}

impl Forward for Forwarder {
  fn forward(&self, req: &Addrd<Req>) -> Result<Resp, ForwardError> {
    match self {
      | Forwarder::Coap(f) => f.forward(req),
      | Forwarder::Http(f) => f.forward(req),
    }
  }
}

impl<F> Forward for Arc<F> where F: Forward + ?Sized
{
  fn forward(&self, req: &Addrd<Req>) -> Result<Resp, ForwardError> {
    (**self).forward(req)
  }
}

/// The URI a proxied request targets.
///
/// Taken from Proxy-Uri, or assembled from Proxy-Scheme, Uri-Host, Uri-Port, Uri-Path & Uri-Query.
///
/// ```
/// use croak::forward::proxy_target;
/// use croak::msg::{no_repeat, OptValue};
/// use croak::req::Req;
///
/// let mut req = Req::get("");
/// req.msg_mut().set(no_repeat::PROXY_SCHEME, OptValue::from("http"));
/// req.msg_mut().set(no_repeat::HOST, OptValue::from("example.com"));
/// req.msg_mut().set_path("a/b");
///
/// assert_eq!(proxy_target(req.msg()).unwrap().as_str(), "http://example.com/a/b");
/// ```
pub fn proxy_target(msg: &Message) -> Result<Url, ForwardError> {
  if let Some(uri) = msg.get_first(no_repeat::PROXY_URI) {
    let uri = uri.as_str()
                 .ok_or_else(|| ForwardError::BadOption("Proxy-Uri is not UTF-8".into()))?;
    return Url::parse(uri).map_err(|e| ForwardError::BadOption(format!("Proxy-Uri {:?}: {}", uri, e)));
  }

  let scheme = match msg.get_first(no_repeat::PROXY_SCHEME) {
    | Some(scheme) => {
      scheme.as_str()
            .ok_or_else(|| ForwardError::BadOption("Proxy-Scheme is not UTF-8".into()))?
    },
    | None => return Err(ForwardError::BadOption("no Proxy-Uri or Proxy-Scheme".into())),
  };

  let host = msg.get_str(no_repeat::HOST)
                .ok_or_else(|| ForwardError::BadOption("Proxy-Scheme without Uri-Host".into()))?;

  let mut uri = format!("{}://{}", scheme, host);
  if let Some(port) = msg.get_uint(no_repeat::PORT) {
    uri.push_str(&format!(":{}", port));
  }
  uri.push('/');
  uri.push_str(&msg.path_string());

  let query = msg.query().collect::<Vec<_>>();
  if !query.is_empty() {
    uri.push('?');
    uri.push_str(&query.join("&"));
  }

  Url::parse(&uri).map_err(|e| ForwardError::BadOption(format!("{:?}: {}", uri, e)))
}

/// Remove the leading Uri-Path segments that addressed the forwarding resource itself
///
/// The remaining segments are left untouched, whether or not they are UTF-8.
pub fn strip_placeholder_path(msg: &mut Message, resource_path: &str) {
  let prefix = resource_path.split('/')
                            .filter(|seg| !seg.is_empty())
                            .collect::<Vec<_>>();
  if prefix.is_empty() {
    return;
  }

  let path = match msg.opts.get_mut(&repeat::PATH) {
    | Some(path) => path,
    | None => return,
  };

  let matches = path.len() >= prefix.len()
                && path.iter()
                       .zip(&prefix)
                       .all(|(seg, own)| seg.0 == own.as_bytes());
  if matches {
    path.drain(..prefix.len());
    if path.is_empty() {
      msg.remove(repeat::PATH);
    }
  }
}

/// A leaf resource forwarding every request it receives
///
/// ```no_run
/// use std::sync::Arc;
///
/// use croak::config::Config;
/// use croak::forward::{CoapForwarder, ForwardingResource};
/// use croak::server::CoapServer;
///
/// let config = Config::default();
/// let server = CoapServer::new(config);
/// server.add(Arc::new(ForwardingResource::new("coap2coap", CoapForwarder::from_config(&config))))
///       .unwrap();
/// server.start().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ForwardingResource<F> {
  name: String,
  forwarder: F,
  attributes: Attributes,
}

impl<F> ForwardingResource<F> where F: Forward
{
  /// Create a forwarding resource
  pub fn new(name: impl ToString, forwarder: F) -> Self {
    Self { name: name.to_string(),
           forwarder,
           attributes: Attributes::default() }
  }

  /// Advertise these attributes in discovery
  pub fn with_attributes(mut self, attributes: Attributes) -> Self {
    self.attributes = attributes;
    self
  }

  /// The forwarder
  pub fn forwarder(&self) -> &F {
    &self.forwarder
  }
}

impl<F> Resource for ForwardingResource<F> where F: Forward
{
  fn name(&self) -> &str {
    &self.name
  }

  fn attributes(&self) -> Attributes {
    self.attributes.clone()
  }

  fn handle_request(&self, ex: &mut CoapExchange) {
    log::trace!(target: "croak", "{}: {:?}", self.name, ForwardState::Received);
    ex.accept();
    log::trace!(target: "croak", "{}: {:?}", self.name, ForwardState::Accepted);

    let mut req = ex.request().clone();
    if let Some(own_path) = ex.resource().and_then(|id| ex.resources().path_of(id)) {
      strip_placeholder_path(req.data_mut().msg_mut(), &own_path);
    }

    log::trace!(target: "croak", "{}: {:?}", self.name, ForwardState::Forwarding);
    let responded = match self.forwarder.forward(&req) {
      | Ok(resp) => {
        log::trace!(target: "croak", "{}: {:?}", self.name, ForwardState::Completed);
        ex.respond_with(resp).or_else(|e| {
                                log::warn!(target: "croak", "origin response unusable: {}", e);
                                ex.respond(code::BAD_GATEWAY)
                              })
      },
      | Err(e) => {
        log::warn!(target: "croak", "{}: {:?}; {}", self.name, e.state(), e);
        ex.respond_payload(e.code(), e.to_string())
      },
    };

    responded.ok();
  }
}

#[cfg(test)]
mod tests {
  use croak_msg::{Id, OptValue, Token, Type};

  use super::*;

  fn with_path(segments: &[&[u8]]) -> Message {
    let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    segments.iter()
            .for_each(|seg| msg.add(repeat::PATH, OptValue(seg.to_vec())));
    msg
  }

  #[test]
  fn strips_own_prefix_and_keeps_the_rest_verbatim() {
    let mut msg = with_path(&[b"proxy", b"coap", &[0xFF, 0x00], b""]);
    strip_placeholder_path(&mut msg, "/proxy");

    assert_eq!(msg.get(repeat::PATH),
               Some(&vec![OptValue::from("coap"), OptValue(vec![0xFF, 0x00]), OptValue(vec![])]));
  }

  #[test]
  fn prefix_covering_the_whole_path_removes_uri_path() {
    let mut msg = with_path(&[b"gw", b"proxy"]);
    strip_placeholder_path(&mut msg, "gw/proxy");
    assert!(!msg.has(repeat::PATH));
  }

  #[test]
  fn other_paths_are_untouched() {
    let mut msg = with_path(&[b"elsewhere", b"x"]);
    let before = msg.clone();
    strip_placeholder_path(&mut msg, "/proxy");
    assert_eq!(msg, before);

    let mut msg = with_path(&[b"proxy"]);
    strip_placeholder_path(&mut msg, "/proxy/deeper");
    assert_eq!(msg.path(), Ok(vec!["proxy"]));
  }
}
