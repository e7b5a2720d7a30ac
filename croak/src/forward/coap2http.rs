use std::fmt::Debug;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use croak_msg::{no_repeat, repeat};

use super::{proxy_target, translate, Forward, ForwardError, ForwardState};
use crate::net::Addrd;
use crate::req::Req;
use crate::resp::Resp;

/// Errors encounterable executing an HTTP request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
  /// The deadline passed before the response arrived
  #[error("timed out")]
  Timeout,
  /// The origin couldn't be reached
  #[error("connection failed: {0}")]
  Connect(String),
  /// Anything else
  #[error("{0}")]
  Other(String),
}

/// Executes HTTP requests
pub trait HttpClient: Send + Sync + Debug {
  /// Execute a request, giving up after `timeout`.
  ///
  /// [`HttpForwarder`] stops waiting at the deadline whether or not the client honours it.
  fn execute(&self,
             req: http::Request<Vec<u8>>,
             timeout: Duration)
             -> Result<http::Response<Vec<u8>>, HttpError>;
}

/// Forwards requests to HTTP origin servers
#[derive(Debug, Clone)]
pub struct HttpForwarder {
  client: Arc<dyn HttpClient>,
  timeout: Duration,
}

impl HttpForwarder {
  /// Forward through `client`, giving up on requests that take longer than `timeout`
  pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
    Self { client, timeout }
  }

  /// Forward through a [`ReqwestClient`](super::ReqwestClient)
  /// with the timeout in [`Config::forward`](crate::config::Config::forward)
  #[cfg(feature = "http")]
  pub fn from_config(config: &crate::config::Config) -> Result<Self, HttpError> {
    let client = super::ReqwestClient::new()?;
    Ok(Self::new(Arc::new(client), config.forward.http_timeout))
  }

  /// Deadline of forwarded requests
  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  /// Run the client on its own thread and wait for it no longer than the deadline
  fn execute(&self, req: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, HttpError> {
    let (tx, rx) = mpsc::channel();
    let client = self.client.clone();
    let timeout = self.timeout;
    thread::Builder::new().name("croak-http-forward".into())
                          .spawn(move || tx.send(client.execute(req, timeout)).ok())
                          .map_err(|e| HttpError::Other(e.to_string()))?;

    match rx.recv_timeout(timeout) {
      | Ok(resp) => resp,
      | Err(RecvTimeoutError::Timeout) => {
        log::debug!(target: "croak", "http origin didn't answer within {:?}", timeout);
        Err(HttpError::Timeout)
      },
      | Err(RecvTimeoutError::Disconnected) => Err(HttpError::Other("http client gave up".into())),
    }
  }
}

impl Forward for HttpForwarder {
  fn forward(&self, req: &Addrd<Req>) -> Result<Resp, ForwardError> {
    let mut msg = req.data().msg().clone();
    if msg.has(no_repeat::PROXY_URI) {
      msg.remove(repeat::PATH);
    }

    let target = proxy_target(&msg)?;
    if !matches!(target.scheme(), "http" | "https") {
      return Err(ForwardError::BadOption(format!("can't forward to {} over HTTP", target.scheme())));
    }

    let http_req = translate::http_request(&msg, &target).map_err(|e| ForwardError::BadGateway(e.to_string()))?;

    log::trace!(target: "croak", "{:?} {} {}", ForwardState::Forwarding, http_req.method(), target);
    let http_resp = self.execute(http_req).map_err(|e| match e {
                                            | HttpError::Timeout => ForwardError::GatewayTimeout,
                                            | e => ForwardError::BadGateway(e.to_string()),
                                          })?;

    let mut resp = translate::coap_response(http_resp, req.data().method())
      .map_err(|e| ForwardError::BadGateway(e.to_string()))?;
    resp.stamp_completed();
    Ok(resp)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::thread;
  use std::time::Instant;

  use croak_msg::{ContentFormat, Id, OptValue, Type};

  use super::*;
  use crate::resp::code;
  use crate::test;

  #[derive(Debug)]
  struct Mock {
    delay: Duration,
    status: u16,
    calls: AtomicUsize,
    seen: Mutex<Option<http::Request<Vec<u8>>>>,
  }

  impl Mock {
    fn new(delay: Duration, status: u16) -> Arc<Self> {
      Arc::new(Self { delay,
                      status,
                      calls: AtomicUsize::new(0),
                      seen: Mutex::new(None) })
    }
  }

  impl HttpClient for Mock {
    fn execute(&self,
               req: http::Request<Vec<u8>>,
               _: Duration)
               -> Result<http::Response<Vec<u8>>, HttpError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      *self.seen.lock().unwrap() = Some(req);

      thread::sleep(self.delay);
      http::Response::builder().status(self.status)
                               .header(http::header::CONTENT_TYPE, "application/json")
                               .body(br#"{"ok":true}"#.to_vec())
                               .map_err(|e| HttpError::Other(e.to_string()))
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
  fn forwards_and_translates_response() {
    let client = Mock::new(Duration::ZERO, 200);
    let fwd = HttpForwarder::new(client.clone(), Duration::from_secs(1));

    let resp = fwd.forward(&proxied("http://example.com/things?x=1")).unwrap();
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.msg().content_format(), Some(ContentFormat::Json));
    assert_eq!(resp.payload(), br#"{"ok":true}"#);
    assert!(resp.completed_at().is_some());

    let seen = client.seen.lock().unwrap();
    let seen = seen.as_ref().unwrap();
    assert_eq!(seen.method(), http::Method::GET);
    assert_eq!(seen.uri(), "http://example.com/things?x=1");
  }

  #[test]
  fn missing_target_is_bad_option_without_call() {
    let client = Mock::new(Duration::ZERO, 200);
    let fwd = HttpForwarder::new(client.clone(), Duration::from_secs(1));

    let err = fwd.forward(&test::req(Type::Con, Id(1), "proxy")).unwrap_err();
    assert_eq!(err.code(), code::BAD_OPTION);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn malformed_uri_is_bad_option_without_call() {
    let client = Mock::new(Duration::ZERO, 200);
    let fwd = HttpForwarder::new(client.clone(), Duration::from_secs(1));

    for uri in ["not a uri", "http://", "ftp://example.com/file"] {
      let err = fwd.forward(&proxied(uri)).unwrap_err();
      assert_eq!(err.state(), ForwardState::BadOption, "{}", uri);
    }
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn past_deadline_is_gateway_timeout_even_if_client_hangs() {
    let fwd = HttpForwarder::new(Mock::new(Duration::from_secs(5), 200), Duration::from_millis(20));

    let started = Instant::now();
    let err = fwd.forward(&proxied("http://example.com/slow")).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(err, ForwardError::GatewayTimeout);
    assert_eq!(err.code(), code::GATEWAY_TIMEOUT);
  }

  #[test]
  fn client_within_deadline_is_waited_for() {
    let fwd = HttpForwarder::new(Mock::new(Duration::from_millis(30), 200), Duration::from_secs(2));
    let resp = fwd.forward(&proxied("http://example.com/slowish")).unwrap();
    assert_eq!(resp.code(), code::CONTENT);
  }

  #[test]
  fn untranslatable_status_is_bad_gateway() {
    let fwd = HttpForwarder::new(Mock::new(Duration::ZERO, 302), Duration::from_secs(1));
    let err = fwd.forward(&proxied("http://example.com/moved")).unwrap_err();
    assert_eq!(err.state(), ForwardState::BadGateway);
  }
}
