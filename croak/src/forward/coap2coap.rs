use std::fmt::Debug;
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use croak_msg::{Id, Token};
use rand::Rng;

use super::{proxy_target, translate, Forward, ForwardError, ForwardState};
use crate::config::Config;
use crate::net::Addrd;
use crate::req::Req;
use crate::resp::Resp;

/// Sends CoAP requests to origin servers
pub trait CoapClient: Send + Sync + Debug {
  /// Send a request, yielding a channel the response will arrive on.
  ///
  /// The sender is dropped without sending if the exchange fails (e.g. the origin resets it).
  fn send(&self, req: Addrd<Req>) -> io::Result<Receiver<Resp>>;
}

/// Forwards requests to CoAP origin servers
#[derive(Debug, Clone)]
pub struct CoapForwarder {
  client: Arc<dyn CoapClient>,
  timeout: Duration,
}

impl CoapForwarder {
  /// Forward through `client`, giving up on origins that take longer than `timeout` to respond
  pub fn new(client: Arc<dyn CoapClient>, timeout: Duration) -> Self {
    Self { client, timeout }
  }

  /// Forward through a [`UdpCoapClient`](crate::std::UdpCoapClient)
  /// with the timeout in [`Config::forward`]
  pub fn from_config(config: &Config) -> Self {
    let timeout = config.forward.coap_timeout;
    Self::new(Arc::new(crate::std::UdpCoapClient::new(timeout)), timeout)
  }

  /// How long to wait for origin servers
  pub fn timeout(&self) -> Duration {
    self.timeout
  }
}

impl Forward for CoapForwarder {
  fn forward(&self, req: &Addrd<Req>) -> Result<Resp, ForwardError> {
    let target = proxy_target(req.data().msg())?;
    if target.scheme() != "coap" {
      return Err(ForwardError::BadOption(format!("can't forward to {} over CoAP", target.scheme())));
    }

    let origin = target.socket_addrs(|| Some(5683))
                       .ok()
                       .and_then(|addrs| addrs.into_iter().next())
                       .ok_or_else(|| ForwardError::BadOption(format!("can't resolve {}", target)))?;

    let mut rng = rand::thread_rng();
    let token = Token::from_bytes(&rng.gen::<[u8; 4]>()).unwrap_or_default();
    let outbound = translate::coap_request(req.data(), &target, Id(rng.gen()), token);

    log::trace!(target: "croak", "{:?} {} to {}", ForwardState::Forwarding, target, origin);
    let pending = self.client
                      .send(Addrd(outbound, origin))
                      .map_err(|e| ForwardError::InternalError(e.to_string()))?;

    let resp = pending.recv_timeout(self.timeout).map_err(|e| match e {
                                                    | RecvTimeoutError::Timeout => ForwardError::GatewayTimeout,
                                                    | RecvTimeoutError::Disconnected => {
                                                      ForwardError::InternalError("origin exchange failed".into())
                                                    },
                                                  })?;

    let mut resp = translate::relay_response(resp).map_err(|e| ForwardError::BadGateway(e.to_string()))?;
    resp.stamp_completed();
    Ok(resp)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::mpsc::{self, Sender};
  use std::sync::Mutex;
  use std::time::Instant;

  use croak_msg::{no_repeat, Message, OptValue, Type};

  use super::*;
  use crate::resp::code;
  use crate::test;

  #[derive(Debug, Clone, Copy, PartialEq)]
  enum Behavior {
    Respond,
    Hang,
    Drop,
    Fail,
  }

  #[derive(Debug)]
  struct Mock {
    behavior: Behavior,
    calls: AtomicUsize,
    sent: Mutex<Vec<Addrd<Req>>>,
    hanging: Mutex<Vec<Sender<Resp>>>,
  }

  impl Mock {
    fn new(behavior: Behavior) -> Arc<Self> {
      Arc::new(Self { behavior,
                      calls: AtomicUsize::new(0),
                      sent: Default::default(),
                      hanging: Default::default() })
    }
  }

  impl CoapClient for Mock {
    fn send(&self, req: Addrd<Req>) -> io::Result<Receiver<Resp>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let (tx, rx) = mpsc::channel();
      let token = req.data().msg_token();
      self.sent.lock().unwrap().push(req);

      match self.behavior {
        | Behavior::Respond => {
          let mut msg = Message::new(Type::Ack, code::CONTENT, Id(1), token);
          msg.payload.0 = b"22.5".to_vec();
          tx.send(Resp::from(msg)).unwrap();
        },
        | Behavior::Hang => self.hanging.lock().unwrap().push(tx),
        | Behavior::Drop => drop(tx),
        | Behavior::Fail => return Err(io::Error::new(io::ErrorKind::Other, "no route")),
      }

      Ok(rx)
    }
  }

  fn proxied(uri: &str) -> Addrd<Req> {
    let mut req = test::req(Type::Con, Id(1), "proxy");
    req.data_mut()
       .msg_mut()
       .set(no_repeat::PROXY_URI, OptValue::from(uri));
    req
  }

  #[test]
  fn missing_target_is_bad_option_without_second_hop() {
    let client = Mock::new(Behavior::Respond);
    let fwd = CoapForwarder::new(client.clone(), Duration::from_secs(1));

    let err = fwd.forward(&test::req(Type::Con, Id(1), "proxy")).unwrap_err();
    assert_eq!(err.state(), ForwardState::BadOption);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn wrong_scheme_is_bad_option() {
    let client = Mock::new(Behavior::Respond);
    let fwd = CoapForwarder::new(client.clone(), Duration::from_secs(1));

    let err = fwd.forward(&proxied("http://127.0.0.1/a")).unwrap_err();
    assert!(matches!(err, ForwardError::BadOption(_)));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn forwards_and_relays_response() {
    let client = Mock::new(Behavior::Respond);
    let fwd = CoapForwarder::new(client.clone(), Duration::from_secs(1));

    let resp = fwd.forward(&proxied("coap://127.0.0.1:5699/temp")).unwrap();
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.payload(), b"22.5");
    assert!(resp.completed_at().is_some());

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent[0].addr(), test::addr(5699));
    assert_eq!(sent[0].data().msg().path_string(), "temp");
    assert!(!sent[0].data().msg().has(no_repeat::PROXY_URI));
  }

  #[test]
  fn wait_is_bounded() {
    let client = Mock::new(Behavior::Hang);
    let fwd = CoapForwarder::new(client, Duration::from_millis(30));

    let start = Instant::now();
    let err = fwd.forward(&proxied("coap://127.0.0.1/a")).unwrap_err();
    assert_eq!(err, ForwardError::GatewayTimeout);
    assert_eq!(err.code(), code::GATEWAY_TIMEOUT);
    assert!(start.elapsed() < Duration::from_secs(5));
  }

  #[test]
  fn failed_exchange_is_internal_error() {
    let fwd = CoapForwarder::new(Mock::new(Behavior::Drop), Duration::from_secs(1));
    let err = fwd.forward(&proxied("coap://127.0.0.1/a")).unwrap_err();
    assert_eq!(err.state(), ForwardState::InternalError);

    let fwd = CoapForwarder::new(Mock::new(Behavior::Fail), Duration::from_secs(1));
    let err = fwd.forward(&proxied("coap://127.0.0.1/a")).unwrap_err();
    assert_eq!(err.code(), code::INTERNAL_SERVER_ERROR);
  }
}
