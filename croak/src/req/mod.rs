use std::str::Utf8Error;

use croak_msg::{Code, Id, Message, OptNumber, OptValue, Token, Type};

/// Request methods
pub mod method;

#[doc(inline)]
pub use method::Method;

/// A CoAP request
///
/// ```
/// use croak::req::{Method, Req};
///
/// let mut req = Req::post("hello");
/// req.set_payload("john".bytes());
///
/// assert_eq!(req.method(), Method::POST);
/// assert_eq!(req.path(), "hello");
/// assert_eq!(req.payload_str(), Ok("john"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Req(Message);

impl Req {
  /// Create a CONfirmable request
  pub fn new(method: Method, path: impl AsRef<str>) -> Self {
    let mut msg = Message::new(Type::Con, method.0, Id(0), Token::default());
    msg.set_path(path.as_ref());
    Self(msg)
  }

  /// Create a new GET request
  pub fn get(path: impl AsRef<str>) -> Self {
    Self::new(Method::GET, path)
  }

  /// Create a new POST request
  pub fn post(path: impl AsRef<str>) -> Self {
    Self::new(Method::POST, path)
  }

  /// Create a new PUT request
  pub fn put(path: impl AsRef<str>) -> Self {
    Self::new(Method::PUT, path)
  }

  /// Create a new DELETE request
  pub fn delete(path: impl AsRef<str>) -> Self {
    Self::new(Method::DELETE, path)
  }

  /// Obtain a reference to the inner message
  pub fn msg(&self) -> &Message {
    &self.0
  }

  /// Obtain a mutable reference to the inner message
  pub fn msg_mut(&mut self) -> &mut Message {
    &mut self.0
  }

  /// Get the request method
  ///
  /// Codes outside of `0.01..=0.07` are still carried as a [`Method`]; see [`Method::from_code`].
  pub fn method(&self) -> Method {
    Method(self.0.code)
  }

  /// Get the request code
  pub fn code(&self) -> Code {
    self.0.code
  }

  /// Get the request path (Uri-Path segments joined with `/`)
  pub fn path(&self) -> String {
    self.0.path_string()
  }

  /// Get the request type (confirmable, non-confirmable)
  pub fn msg_type(&self) -> Type {
    self.0.ty
  }

  /// Set this request to be non-confirmable
  ///
  /// Some messages do not require an acknowledgement.
  ///
  /// This is particularly true for messages that are repeated regularly for
  /// application requirements, such as repeated readings from a sensor.
  pub fn non(&mut self) {
    self.0.ty = Type::Non;
  }

  /// Get a copy of the message id for this request
  pub fn msg_id(&self) -> Id {
    self.0.id
  }

  /// Get a copy of the message token for this request
  pub fn msg_token(&self) -> Token {
    self.0.token
  }

  /// Updates the Message ID for this request
  pub fn set_msg_id(&mut self, id: Id) {
    self.0.id = id;
  }

  /// Updates the Message Token for this request
  pub fn set_msg_token(&mut self, token: Token) {
    self.0.token = token;
  }

  /// First value of an option
  pub fn get_option(&self, n: OptNumber) -> Option<&OptValue> {
    self.0.get_first(n)
  }

  /// Add a payload to this request
  pub fn set_payload<Bytes: IntoIterator<Item = u8>>(&mut self, payload: Bytes) {
    self.0.payload.0 = payload.into_iter().collect();
  }

  /// Get the payload's raw bytes
  pub fn payload(&self) -> &[u8] {
    &self.0.payload.0
  }

  /// Get the payload and attempt to interpret it as a UTF-8 string
  pub fn payload_str(&self) -> Result<&str, Utf8Error> {
    std::str::from_utf8(self.payload())
  }
}

impl From<Req> for Message {
  fn from(req: Req) -> Self {
    req.0
  }
}

impl From<Message> for Req {
  fn from(msg: Message) -> Self {
    Self(msg)
  }
}

impl AsRef<Message> for Req {
  fn as_ref(&self) -> &Message {
    &self.0
  }
}
