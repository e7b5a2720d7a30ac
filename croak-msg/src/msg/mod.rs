/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::known::{no_repeat, observe, repeat, ContentFormat};
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use std::str::Utf8Error;

use crate::cursor::Cursor;
use crate::from_bytes::TryConsumeBytes;
use crate::TryFromBytes;

/// Message payload; the bytes following the `0xFF` payload marker.
///
/// See [RFC7252 Section 5.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.5)
#[derive(Clone, Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Payload(pub Vec<u8>);

/// The first header byte: `VV TT LLLL`
/// (version, [`Type`], token length)
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    Ok(Byte1 { ver: Version(b >> 6),
               ty: Type::try_from((b >> 4) & 0b11)?,
               tkl: b & 0x0F })
  }
}

impl From<Byte1> for u8 {
  fn from(Byte1 { ver, ty, tkl }: Byte1) -> u8 {
    (ver.0 << 6) | (u8::from(ty) << 4) | (tkl & 0x0F)
  }
}

/// A CoAP message
/// ([RFC7252 section 3](https://datatracker.ietf.org/doc/html/rfc7252#section-3)).
///
/// Fields mirror the wire layout, except that options are kept by number
/// in an [`OptMap`] rather than as deltas.
/// Encode with [`TryIntoBytes`](crate::TryIntoBytes), decode with [`TryFromBytes`].
///
/// ```
/// use croak_msg::{Code, ContentFormat, Id, Message, TryFromBytes, Type};
///
/// //            NON, tkl 1   2.05         id 0x0101   token
/// let packet = [0b0101_0001, 0b010_00101, 0x01, 0x01, 0x2A,
///               // Content-Format (delta 12, len 1) = 50
///               0b1100_0001, 50,
///               0xFF, b'{', b'}'];
///
/// let msg = Message::try_from_bytes(packet).unwrap();
///
/// assert_eq!(msg.ty, Type::Non);
/// assert_eq!(msg.id, Id(0x0101));
/// assert_eq!(msg.code, Code::new(2, 5));
/// assert_eq!(msg.token.as_bytes(), &[0x2A]);
/// assert_eq!(msg.content_format(), Some(ContentFormat::Json));
/// assert_eq!(msg.payload.0, b"{}".to_vec());
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
  /// Message id
  pub id: Id,
  /// CON, NON, ACK or RST
  pub ty: Type,
  /// Protocol version (always 1)
  pub ver: Version,
  /// Request/response correlation token
  pub token: Token,
  /// Method, response code, or 0.00 for empty messages
  pub code: Code,
  /// Options by number
  pub opts: OptMap,
  /// Bytes after the payload marker
  pub payload: Payload,
}

impl Message {
  /// Create a message with no options and no payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           ty,
           ver: Default::default(),
           token,
           code,
           opts: Default::default(),
           payload: Default::default() }
  }

  /// An empty ACK for this message, sent with message id `id`
  /// (normally this message's own id).
  ///
  /// ```
  /// use croak_msg::{Code, Id, Message, Token, Type};
  ///
  /// let req = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  /// let ack = req.ack(req.id);
  ///
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.code, Code::EMPTY);
  /// ```
  pub fn ack(&self, id: Id) -> Self {
    Self::new(Type::Ack, Code::EMPTY, id, self.token)
  }

  /// Create an empty Reset message rejecting this one.
  pub fn reset(&self) -> Self {
    Self::new(Type::Reset, Code::EMPTY, self.id, Token::default())
  }

  /// Is this message's code `0.00`?
  pub fn is_empty(&self) -> bool {
    self.code == Code::EMPTY
  }

  /// All values of an option
  pub fn get(&self, n: OptNumber) -> Option<&Vec<OptValue>> {
    self.opts.get(&n)
  }

  /// First value of an option
  pub fn get_first(&self, n: OptNumber) -> Option<&OptValue> {
    self.get(n).and_then(|vs| vs.first())
  }

  /// First value of an option, interpreted as UTF-8
  pub fn get_str(&self, n: OptNumber) -> Option<&str> {
    self.get_first(n).and_then(|v| v.as_str())
  }

  /// First value of an option, interpreted as an unsigned integer
  pub fn get_uint(&self, n: OptNumber) -> Option<u32> {
    self.get_first(n).and_then(|v| v.as_uint())
  }

  /// Does this message carry the option at all?
  pub fn has(&self, n: OptNumber) -> bool {
    self.opts.contains_key(&n)
  }

  /// Replace all values of an option with a single value
  pub fn set(&mut self, n: OptNumber, v: OptValue) {
    self.opts.insert(n, vec![v]);
  }

  /// Replace all values of an option with an unsigned integer
  pub fn set_uint(&mut self, n: OptNumber, v: u32) {
    self.set(n, OptValue::uint(v))
  }

  /// Append a value to a (repeatable) option
  pub fn add(&mut self, n: OptNumber, v: OptValue) {
    self.opts.entry(n).or_default().push(v);
  }

  /// Remove an option, yielding the values it had
  pub fn remove(&mut self, n: OptNumber) -> Option<Vec<OptValue>> {
    self.opts.remove(&n)
  }

  /// Uri-Path segments, or the first segment's UTF-8 error if any isn't text
  ///
  /// ```
  /// use croak_msg::{repeat, Code, Id, Message, OptValue, Token, Type};
  ///
  /// let mut req = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  /// req.set_path("a/b");
  /// assert_eq!(req.path(), Ok(vec!["a", "b"]));
  ///
  /// req.add(repeat::PATH, OptValue(vec![0xFF]));
  /// assert!(req.path().is_err());
  /// ```
  pub fn path(&self) -> Result<Vec<&str>, Utf8Error> {
    self.get(repeat::PATH)
        .into_iter()
        .flatten()
        .map(|v| std::str::from_utf8(&v.0))
        .collect()
  }

  /// Uri-Path segments joined with `/`, replacing invalid UTF-8 with `U+FFFD`
  ///
  /// ```
  /// use croak_msg::{Code, Id, Message, Token, Type};
  ///
  /// let mut req = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  /// req.set_path("/a//b/");
  /// assert_eq!(req.path_string(), "a/b");
  /// ```
  pub fn path_string(&self) -> String {
    self.get(repeat::PATH)
        .into_iter()
        .flatten()
        .map(|v| String::from_utf8_lossy(&v.0))
        .collect::<Vec<_>>()
        .join("/")
  }

  /// Replace Uri-Path with the non-empty segments of `path`
  pub fn set_path(&mut self, path: &str) {
    self.set_segments(repeat::PATH, '/', path)
  }

  /// Uri-Query parameters
  pub fn query(&self) -> impl Iterator<Item = &str> {
    self.get(repeat::QUERY)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
  }

  /// Replace Uri-Query with the non-empty `&`-delimited parameters of `query`
  pub fn set_query(&mut self, query: &str) {
    self.set_segments(repeat::QUERY, '&', query)
  }

  fn set_segments(&mut self, n: OptNumber, sep: char, s: &str) {
    self.remove(n);
    s.split(sep)
     .filter(|seg| !seg.is_empty())
     .for_each(|seg| self.add(n, OptValue::from(seg)));
  }

  /// Content-Format of the payload
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_uint(no_repeat::CONTENT_FORMAT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Set the Content-Format of the payload
  pub fn set_content_format(&mut self, f: ContentFormat) {
    self.set_uint(no_repeat::CONTENT_FORMAT, u16::from(f) as u32)
  }

  /// Content-Format the client would like in the response
  pub fn accept(&self) -> Option<ContentFormat> {
    self.get_uint(no_repeat::ACCEPT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Observe option, if present
  pub fn observe(&self) -> Option<u32> {
    self.get_uint(no_repeat::OBSERVE)
  }

  /// Observe option as a registration action (requests only)
  pub fn observe_action(&self) -> Option<observe::Action> {
    self.observe().and_then(observe::Action::from_uint)
  }

  /// Set the Observe option
  pub fn set_observe(&mut self, n: u32) {
    self.set_uint(no_repeat::OBSERVE, n)
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut cur = Cursor::new(bytes);
    let next = |cur: &mut Cursor<Bytes>| cur.next().ok_or(MessageParseError::UnexpectedEndOfStream);

    let Byte1 { tkl, ty, ver } = Byte1::try_from(next(&mut cur)?)?;
    let code = Code::from(next(&mut cur)?);
    let id = Id::try_consume_bytes(&mut cur)?;

    if tkl > 8 {
      return Err(MessageParseError::InvalidTokenLength(tkl));
    }
    let token = cur.take_exact(usize::from(tkl))
                   .ok_or(MessageParseError::UnexpectedEndOfStream)
                   .and_then(|bs| {
                     Token::from_bytes(bs).ok_or(MessageParseError::InvalidTokenLength(tkl))
                   })?;

    let opts = OptMap::try_consume_bytes(&mut cur).map_err(MessageParseError::OptParseError)?;

    // option parsing stops in front of the payload marker
    let payload = match cur.next() {
      | None => Vec::new(),
      | Some(_marker) => match cur.take_until_end() {
        | [] => return Err(MessageParseError::EmptyPayloadAfterMarker),
        | rest => rest.to_vec(),
      },
    };

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload: Payload(payload) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_msg() {
    let (expect, msg) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&msg).unwrap(), expect)
  }

  #[test]
  fn header_fields() {
    let ack_tkl_3 = 0b01_10_0011u8;
    let byte1 = Byte1 { ver: Version(1),
                        ty: Type::Ack,
                        tkl: 3 };
    assert_eq!(Byte1::try_from(ack_tkl_3), Ok(byte1));
    assert_eq!(u8::from(byte1), ack_tkl_3);

    let mut id = Cursor::new([0x00, 0x22]);
    assert_eq!(Id::try_consume_bytes(&mut id), Ok(Id(34)));
  }

  #[test]
  fn parse_rejects_long_token() {
    let bytes = [0b_01_00_1001u8, 0b000_00001, 0, 1];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::InvalidTokenLength(9)));
  }

  #[test]
  fn parse_rejects_marker_without_payload() {
    let bytes = [0b_01_00_0000u8, 0b000_00001, 0, 1, 0b11111111];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::EmptyPayloadAfterMarker));
  }

  #[test]
  fn option_helpers() {
    let mut msg = Message::new(Type::Non, Code::GET, Id(2), Token::default());
    msg.set_path("a/b");
    msg.set_query("x=1&&y=2");
    msg.set_content_format(ContentFormat::Json);
    msg.set_observe(0);

    assert_eq!(msg.path(), Ok(vec!["a", "b"]));
    assert_eq!(msg.query().collect::<Vec<_>>(), vec!["x=1", "y=2"]);
    assert_eq!(msg.content_format(), Some(ContentFormat::Json));
    assert_eq!(msg.observe_action(), Some(observe::Action::Register));

    msg.remove(no_repeat::OBSERVE);
    assert!(!msg.has(no_repeat::OBSERVE));
  }

  #[test]
  fn path_with_binary_segment_is_not_text() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(2), Token::default());
    msg.set_path("a");
    msg.add(repeat::PATH, OptValue(vec![0xFF, 0xFE]));

    assert!(msg.path().is_err());
    assert_eq!(msg.path_string(), "a/\u{FFFD}\u{FFFD}");
  }
}
