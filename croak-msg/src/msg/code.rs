use std::fmt;

/// Message Code, written `c.dd` in RFC7252 (e.g. `2.05 Content`).
///
/// # Examples
/// ```
/// use croak_msg::Code;
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05".to_string())
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for empty messages.
  pub detail: u8,
}

/// Whether a code identifies an empty message, a request or a response
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CodeKind {
  /// `0.00`
  Empty,
  /// `0.01` through `0.31`
  Request,
  /// `2.xx` through `5.xx`
  Response,
  /// Reserved classes (1, 6, 7)
  Reserved,
}

impl Code {
  /// `0.00`
  pub const EMPTY: Self = Self::new(0, 0);
  /// `0.01`
  pub const GET: Self = Self::new(0, 1);
  /// `0.02`
  pub const POST: Self = Self::new(0, 2);
  /// `0.03`
  pub const PUT: Self = Self::new(0, 3);
  /// `0.04`
  pub const DELETE: Self = Self::new(0, 4);
  /// `0.05` (RFC8132)
  pub const FETCH: Self = Self::new(0, 5);
  /// `0.06` (RFC8132)
  pub const PATCH: Self = Self::new(0, 6);
  /// `0.07` (RFC8132)
  pub const IPATCH: Self = Self::new(0, 7);

  /// Create a new Code
  ///
  /// ```
  /// use croak_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Classify this code
  ///
  /// ```
  /// use croak_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
  /// assert_eq!(Code::GET.kind(), CodeKind::Request);
  /// assert_eq!(Code::new(4, 4).kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | (2..=5, _) => CodeKind::Response,
      | _ => CodeKind::Reserved,
    }
  }

  /// Is this a `2.xx` code?
  pub fn is_success(&self) -> bool {
    self.class == 2
  }

  /// Get the human string representation of a message code
  ///
  /// ```
  /// use croak_msg::Code;
  ///
  /// let code = Code { class: 2, detail: 5 };
  /// let chars = code.to_human();
  /// let string = String::from_iter(chars);
  /// assert_eq!(string, "2.05".to_string());
  /// ```
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from_digit(d.into(), 10).unwrap_or('?');
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }
}

impl fmt::Display for Code {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", String::from_iter(self.to_human()))
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    let class = b >> 5;
    let detail = b & 0b0011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_code() {
    let byte = 0b_01_000101u8;
    let code = Code::from(byte);
    assert_eq!(code, Code { class: 2, detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 2, detail: 5 };
    let actual: u8 = code.into();
    let expected = 0b_010_00101u8;
    assert_eq!(actual, expected)
  }

  #[test]
  fn kinds() {
    assert_eq!(Code::IPATCH.kind(), CodeKind::Request);
    assert_eq!(Code::new(5, 3).kind(), CodeKind::Response);
    assert_eq!(Code::new(7, 1).kind(), CodeKind::Reserved);
    assert_eq!(Code::new(4, 15).to_string(), "4.15");
  }
}
