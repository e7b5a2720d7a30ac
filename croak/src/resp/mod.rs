use std::string::FromUtf8Error;
use std::time::Instant;

use croak_msg::{Code, Id, Message, Token, Type};

use crate::net::Session;
use crate::req::Req;

/// Response codes
pub mod code;

/// A CoAP response
///
/// Besides the message, a response carries the security [`Session`] of the
/// exchange it answers and (for forwarded responses) the instant the second hop completed.
///
/// ```
/// use croak::req::Req;
/// use croak::resp::{code, Resp};
///
/// let req = Req::get("/hello");
///
/// let mut resp = Resp::for_request(&req).unwrap();
/// resp.set_code(code::CONTENT);
/// resp.msg_mut()
///     .set_content_format(croak::msg::ContentFormat::Json);
/// resp.set_payload(r#"{"foo": "bar"}"#.bytes());
///
/// assert_eq!(resp.payload_string().unwrap(), r#"{"foo": "bar"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resp {
  msg: Message,
  session: Option<Session>,
  completed_at: Option<Instant>,
}

impl Resp {
  /// Obtain a reference to the inner message
  pub fn msg(&self) -> &Message {
    &self.msg
  }

  /// Obtain a mutable reference to the inner message
  pub fn msg_mut(&mut self) -> &mut Message {
    &mut self.msg
  }

  /// Create a new response for a given request.
  ///
  /// If the request is CONfirmable, this will return Some(ACK).
  ///
  /// If the request is NONconfirmable, this will return Some(NON).
  ///
  /// If the request is ACK or RESET, this will return None.
  ///
  /// ```
  /// use croak::req::Req;
  /// use croak::resp::Resp;
  ///
  /// // pretend this is an incoming request
  /// let mut req = Req::get("/hello");
  /// req.set_msg_id(croak::msg::Id(0));
  ///
  /// let resp = Resp::for_request(&req).unwrap();
  ///
  /// // note that Req's default type is CON, so the response will be an ACK.
  /// // this means that the token and id of the response will be the same
  /// // as the incoming request.
  /// assert_eq!(resp.msg_type(), croak::msg::Type::Ack);
  /// assert_eq!(req.msg_id(), resp.msg_id());
  /// assert_eq!(req.msg_token(), resp.token());
  /// ```
  pub fn for_request(req: &Req) -> Option<Self> {
    match req.msg_type() {
      | Type::Con => Some(Self::ack(req)),
      | Type::Non => Some(Self::non(req)),
      | _ => None,
    }
  }

  /// Create a piggybacked response ACKnowledging an incoming request.
  pub fn ack(req: &Req) -> Self {
    Self::from(Message::new(Type::Ack, code::CONTENT, req.msg_id(), req.msg_token()))
  }

  /// Create a CONfirmable (separate) response for an incoming request.
  ///
  /// The message id is left as `Id(0)`; the transport provisions a fresh one.
  pub fn con(req: &Req) -> Self {
    Self::from(Message::new(Type::Con, code::CONTENT, Id(0), req.msg_token()))
  }

  /// Create a NONconfirmable response for an incoming request.
  ///
  /// The message id is left as `Id(0)`; the transport provisions a fresh one.
  pub fn non(req: &Req) -> Self {
    Self::from(Message::new(Type::Non, code::CONTENT, Id(0), req.msg_token()))
  }

  /// Get the payload's raw bytes
  pub fn payload(&self) -> &[u8] {
    &self.msg.payload.0
  }

  /// Get the payload and attempt to interpret it as a UTF-8 string
  pub fn payload_string(&self) -> Result<String, FromUtf8Error> {
    String::from_utf8(self.payload().to_vec())
  }

  /// Get the message type
  pub fn msg_type(&self) -> Type {
    self.msg.ty
  }

  /// Get the message id
  pub fn msg_id(&self) -> Id {
    self.msg.id
  }

  /// Get the message token
  pub fn token(&self) -> Token {
    self.msg.token
  }

  /// Get the response code
  pub fn code(&self) -> Code {
    self.msg.code
  }

  /// Change the response code
  ///
  /// ```
  /// use croak::req::Req;
  /// use croak::resp::{code, Resp};
  ///
  /// let req = Req::get("/hello");
  /// let mut resp = Resp::for_request(&req).unwrap();
  ///
  /// resp.set_code(code::INTERNAL_SERVER_ERROR);
  /// assert_eq!(resp.code(), code::INTERNAL_SERVER_ERROR);
  /// ```
  pub fn set_code(&mut self, code: Code) {
    self.msg.code = code;
  }

  /// Add a payload to this response
  pub fn set_payload<Bytes: IntoIterator<Item = u8>>(&mut self, payload: Bytes) {
    self.msg.payload.0 = payload.into_iter().collect();
  }

  /// Security session this response will be sent under
  pub fn session(&self) -> Option<&Session> {
    self.session.as_ref()
  }

  /// Attach a security session
  pub fn set_session(&mut self, session: Option<Session>) {
    self.session = session;
  }

  /// When the exchange producing this response completed, if recorded
  pub fn completed_at(&self) -> Option<Instant> {
    self.completed_at
  }

  /// Record that this response's exchange completed now
  pub fn stamp_completed(&mut self) {
    self.completed_at = Some(Instant::now());
  }
}

impl From<Resp> for Message {
  fn from(rep: Resp) -> Self {
    rep.msg
  }
}

impl From<Message> for Resp {
  fn from(msg: Message) -> Self {
    Self { msg,
           session: None,
           completed_at: None }
  }
}
