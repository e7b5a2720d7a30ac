use std::net::IpAddr;

use croak_msg::{no_repeat, repeat, Code, CodeKind, ContentFormat, Id, Message, OptNumber, OptValue, Token, Type};
use http::header::{self, HeaderValue};
use http::{Method as HttpMethod, StatusCode};
use url::Url;

use crate::req::{Method, Req};
use crate::resp::{code, Resp};

/// Errors encounterable translating between CoAP & HTTP
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
  /// The CoAP method has no HTTP equivalent
  #[error("no HTTP equivalent of method {0}")]
  UnsupportedMethod(Code),
  /// The HTTP status has no CoAP equivalent
  #[error("no CoAP equivalent of HTTP status {0}")]
  UnsupportedStatus(u16),
  /// The request's Content-Format has no media type
  #[error("no media type for content format {0}")]
  UnsupportedContentFormat(u16),
  /// The origin answered with a code that isn't a response code
  #[error("origin answered with non-response code {0}")]
  NotAResponse(Code),
  /// The HTTP message couldn't be built
  #[error("{0}")]
  Http(String),
}

/// HTTP method of a CoAP request method
///
/// ```
/// use croak::forward::translate::method;
/// use croak::req::Method;
///
/// assert_eq!(method(Method::GET.code()).unwrap(), http::Method::GET);
/// assert_eq!(method(Method::IPATCH.code()).unwrap(), http::Method::PATCH);
/// assert_eq!(method(Method::FETCH.code()).unwrap().as_str(), "FETCH");
/// ```
pub fn method(code: Code) -> Result<HttpMethod, TranslateError> {
  match Method::from_code(code) {
    | Some(Method::GET) => Ok(HttpMethod::GET),
    | Some(Method::POST) => Ok(HttpMethod::POST),
    | Some(Method::PUT) => Ok(HttpMethod::PUT),
    | Some(Method::DELETE) => Ok(HttpMethod::DELETE),
    | Some(Method::FETCH) => {
      HttpMethod::from_bytes(b"FETCH").map_err(|e| TranslateError::Http(e.to_string()))
    },
    | Some(Method::PATCH) | Some(Method::IPATCH) => Ok(HttpMethod::PATCH),
    | _ => Err(TranslateError::UnsupportedMethod(code)),
  }
}

/// CoAP response code of an HTTP status (RFC8075 section 7)
///
/// `200 OK` depends on the request: `2.05 Content` for safe methods, `2.04 Changed` otherwise.
/// Statuses without a specific mapping map by class; informational
/// and redirection statuses (other than `304 Not Modified`) have no CoAP equivalent.
pub fn status(status: StatusCode, request: Method) -> Result<Code, TranslateError> {
  let safe = request == Method::GET || request == Method::FETCH;
  let code = match status.as_u16() {
    | 200 if safe => code::CONTENT,
    | 200 => code::CHANGED,
    | 201 => code::CREATED,
    | 204 if request == Method::DELETE => code::DELETED,
    | 204 => code::CHANGED,
    | 203 | 205 | 206 => code::CONTENT,
    | 304 => code::VALID,
    | 400 => code::BAD_REQUEST,
    | 401 => code::UNAUTHORIZED,
    | 403 => code::FORBIDDEN,
    | 404 | 410 => code::NOT_FOUND,
    | 405 => code::METHOD_NOT_ALLOWED,
    | 406 => code::NOT_ACCEPTABLE,
    | 412 => code::PRECONDITION_FAILED,
    | 413 => code::REQUEST_ENTITY_TOO_LARGE,
    | 415 => code::UNSUPPORTED_CONTENT_FORMAT,
    | 501 => code::NOT_IMPLEMENTED,
    | 502 => code::BAD_GATEWAY,
    | 503 => code::SERVICE_UNAVAILABLE,
    | 504 => code::GATEWAY_TIMEOUT,
    | 200..=299 => code::CONTENT,
    | 400..=499 => code::BAD_REQUEST,
    | 500..=599 => code::INTERNAL_SERVER_ERROR,
    | other => return Err(TranslateError::UnsupportedStatus(other)),
  };

  Ok(code)
}

/// Content-Format of an HTTP Content-Type, if it has one
fn content_format(content_type: &str) -> Option<ContentFormat> {
  ContentFormat::from_media_type(content_type)
}

/// Is this an HTTP Content-Type we can relay without knowing its CoAP equivalent?
fn is_generic(content_type: &str) -> bool {
  content_type.trim().to_ascii_lowercase().starts_with("text/")
}

/// Build the HTTP request a CoAP request translates to
pub fn http_request(msg: &Message, target: &Url) -> Result<http::Request<Vec<u8>>, TranslateError> {
  let mut req = http::Request::builder().method(method(msg.code)?)
                                        .uri(target.as_str());

  if let Some(format) = msg.content_format() {
    let media_type = format.media_type()
                           .ok_or_else(|| TranslateError::UnsupportedContentFormat(format.into()))?;
    req = req.header(header::CONTENT_TYPE, media_type);
  }

  if let Some(media_type) = msg.accept().and_then(|f| f.media_type()) {
    req = req.header(header::ACCEPT, media_type);
  }

  for etag in msg.get(repeat::ETAG).into_iter().flatten() {
    let value = format!("\"{}\"", hex(&etag.0));
    req = req.header(header::IF_NONE_MATCH, value);
  }

  req.body(msg.payload.0.clone())
     .map_err(|e| TranslateError::Http(e.to_string()))
}

fn hex(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn unhex(s: &str) -> Option<Vec<u8>> {
  if s.len() % 2 != 0 || s.len() > 16 {
    return None;
  }

  (0..s.len()).step_by(2)
              .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
              .collect()
}

fn max_age(cache_control: &HeaderValue) -> Option<u32> {
  cache_control.to_str()
               .ok()?
               .split(',')
               .filter_map(|directive| directive.trim().strip_prefix("max-age="))
               .find_map(|n| n.trim().parse::<u32>().ok())
}

/// Build the CoAP response an HTTP response translates to.
///
/// A body whose Content-Type has no CoAP equivalent (and isn't `text/*`)
/// becomes `4.15 Unsupported Content-Format`.
pub fn coap_response(resp: http::Response<Vec<u8>>, request: Method) -> Result<Resp, TranslateError> {
  let (parts, body) = resp.into_parts();
  let code = status(parts.status, request)?;
  let mut msg = Message::new(Type::Ack, code, Id(0), Token::default());

  let content_type = parts.headers
                          .get(header::CONTENT_TYPE)
                          .and_then(|v| v.to_str().ok());

  match content_type {
    | Some(ct) if !body.is_empty() => match content_format(ct) {
      | Some(format) => {
        msg.set_content_format(format);
        msg.payload.0 = body;
      },
      | None if is_generic(ct) => {
        msg.set_content_format(ContentFormat::Text);
        msg.payload.0 = body;
      },
      | None => {
        log::debug!(target: "croak", "no content format for {:?}", ct);
        msg.code = code::UNSUPPORTED_CONTENT_FORMAT;
      },
    },
    | _ => msg.payload.0 = body,
  }

  if let Some(age) = parts.headers.get(header::CACHE_CONTROL).and_then(max_age) {
    msg.set_uint(no_repeat::MAX_AGE, age);
  }

  if let Some(etag) = parts.headers
                           .get(header::ETAG)
                           .and_then(|v| v.to_str().ok())
                           .map(|v| v.trim_start_matches("W/").trim_matches('"'))
  {
    let value = unhex(etag).unwrap_or_else(|| etag.bytes().take(8).collect());
    msg.set(repeat::ETAG, OptValue(value));
  }

  Ok(Resp::from(msg))
}

/// Options that only make sense on the first hop
const HOP_BY_HOP: [OptNumber; 6] = [no_repeat::PROXY_URI,
                                    no_repeat::PROXY_SCHEME,
                                    no_repeat::HOST,
                                    no_repeat::PORT,
                                    repeat::PATH,
                                    repeat::QUERY];

/// Build the CoAP request to send to `target` on behalf of `req`
pub fn coap_request(req: &Req, target: &Url, id: Id, token: Token) -> Req {
  let src = req.msg();
  let mut msg = Message::new(Type::Con, src.code, id, token);

  msg.opts = src.opts
                .iter()
                .filter(|(n, _)| !HOP_BY_HOP.contains(*n))
                .map(|(n, v)| (*n, v.clone()))
                .collect();

  if let Some(domain) = target.domain().filter(|d| d.parse::<IpAddr>().is_err()) {
    msg.set(no_repeat::HOST, OptValue::from(domain));
  }
  msg.set_path(target.path());
  if let Some(query) = target.query() {
    msg.set_query(query);
  }
  msg.payload = src.payload.clone();

  Req::from(msg)
}

/// Strip an origin server's CoAP response down to what gets relayed to the client
pub fn relay_response(resp: Resp) -> Result<Resp, TranslateError> {
  let src = Message::from(resp);
  if src.code.kind() != CodeKind::Response {
    return Err(TranslateError::NotAResponse(src.code));
  }

  let mut msg = Message::new(Type::Ack, src.code, Id(0), Token::default());
  msg.opts = src.opts;
  msg.remove(no_repeat::OBSERVE);
  msg.payload = src.payload;

  Ok(Resp::from(msg))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses() {
    let cases = [(200, Method::GET, code::CONTENT),
                 (200, Method::POST, code::CHANGED),
                 (201, Method::POST, code::CREATED),
                 (204, Method::DELETE, code::DELETED),
                 (204, Method::PUT, code::CHANGED),
                 (304, Method::GET, code::VALID),
                 (404, Method::GET, code::NOT_FOUND),
                 (418, Method::GET, code::BAD_REQUEST),
                 (415, Method::POST, code::UNSUPPORTED_CONTENT_FORMAT),
                 (504, Method::GET, code::GATEWAY_TIMEOUT),
                 (599, Method::GET, code::INTERNAL_SERVER_ERROR)];

    for (http, method, coap) in cases {
      assert_eq!(status(StatusCode::from_u16(http).unwrap(), method), Ok(coap), "{}", http);
    }

    assert_eq!(status(StatusCode::MOVED_PERMANENTLY, Method::GET),
               Err(TranslateError::UnsupportedStatus(301)));
    assert_eq!(status(StatusCode::CONTINUE, Method::GET),
               Err(TranslateError::UnsupportedStatus(100)));
  }

  #[test]
  fn request_headers() {
    let mut req = Req::post("");
    req.msg_mut().set_content_format(ContentFormat::Json);
    req.msg_mut().set_uint(no_repeat::ACCEPT, 60);
    req.msg_mut().add(repeat::ETAG, OptValue(vec![0xab, 0x01]));
    req.set_payload(b"{}".iter().copied());

    let target = Url::parse("http://example.com/a?b=c").unwrap();
    let http = http_request(req.msg(), &target).unwrap();

    assert_eq!(http.method(), HttpMethod::POST);
    assert_eq!(http.uri(), "http://example.com/a?b=c");
    assert_eq!(http.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(http.headers()[header::ACCEPT], "application/cbor");
    assert_eq!(http.headers()[header::IF_NONE_MATCH], "\"ab01\"");
    assert_eq!(http.body(), b"{}");
  }

  #[test]
  fn unknown_content_format_is_untranslatable() {
    let mut req = Req::post("");
    req.msg_mut().set_content_format(ContentFormat::Other(9999));
    let target = Url::parse("http://example.com").unwrap();

    assert_eq!(http_request(req.msg(), &target).unwrap_err(),
               TranslateError::UnsupportedContentFormat(9999));
  }

  #[test]
  fn response_headers() {
    let resp = http::Response::builder().status(200)
                                        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                                        .header(header::CACHE_CONTROL, "public, max-age=30")
                                        .header(header::ETAG, "\"ab01\"")
                                        .body(b"{}".to_vec())
                                        .unwrap();
    let resp = coap_response(resp, Method::GET).unwrap();
    let msg = resp.msg();

    assert_eq!(msg.code, code::CONTENT);
    assert_eq!(msg.content_format(), Some(ContentFormat::Json));
    assert_eq!(msg.get_uint(no_repeat::MAX_AGE), Some(30));
    assert_eq!(msg.get_first(repeat::ETAG), Some(&OptValue(vec![0xab, 0x01])));
    assert_eq!(resp.payload(), b"{}");
  }

  #[test]
  fn unknown_content_types() {
    let text = http::Response::builder().status(200)
                                        .header(header::CONTENT_TYPE, "text/html")
                                        .body(b"<p>".to_vec())
                                        .unwrap();
    let text = coap_response(text, Method::GET).unwrap();
    assert_eq!(text.msg().content_format(), Some(ContentFormat::Text));
    assert_eq!(text.payload(), b"<p>");

    let blob = http::Response::builder().status(200)
                                        .header(header::CONTENT_TYPE, "image/png")
                                        .body(vec![1, 2, 3])
                                        .unwrap();
    let blob = coap_response(blob, Method::GET).unwrap();
    assert_eq!(blob.code(), code::UNSUPPORTED_CONTENT_FORMAT);
    assert!(blob.payload().is_empty());
  }

  #[test]
  fn coap_request_targets_uri() {
    let mut req = Req::get("proxy");
    req.msg_mut().set(no_repeat::PROXY_URI, OptValue::from("coap://example.com:5684/a/b?c=d"));
    req.msg_mut().set_content_format(ContentFormat::Cbor);

    let target = Url::parse("coap://example.com:5684/a/b?c=d").unwrap();
    let out = coap_request(&req, &target, Id(9), Token::default());
    let msg = out.msg();

    assert_eq!(msg.ty, Type::Con);
    assert_eq!(msg.id, Id(9));
    assert!(!msg.has(no_repeat::PROXY_URI));
    assert_eq!(msg.get_str(no_repeat::HOST), Some("example.com"));
    assert_eq!(msg.path_string(), "a/b");
    assert_eq!(msg.query().collect::<Vec<_>>(), vec!["c=d"]);
    assert_eq!(msg.content_format(), Some(ContentFormat::Cbor));
  }
}
