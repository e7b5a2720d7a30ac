use std::fmt;

use croak_msg::Code;

/// Request method
///
/// ```
/// use croak::req::Method;
///
/// assert_eq!(Method::FETCH.to_string(), "FETCH");
/// assert_eq!(Method::from_code(croak::msg::Code::new(0, 7)), Some(Method::IPATCH));
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Method(pub(crate) Code);

impl Method {
  /// `0.01 GET`
  pub const GET: Self = Self(Code::GET);
  /// `0.02 POST`
  pub const POST: Self = Self(Code::POST);
  /// `0.03 PUT`
  pub const PUT: Self = Self(Code::PUT);
  /// `0.04 DELETE`
  pub const DELETE: Self = Self(Code::DELETE);
  /// `0.05 FETCH`
  pub const FETCH: Self = Self(Code::FETCH);
  /// `0.06 PATCH`
  pub const PATCH: Self = Self(Code::PATCH);
  /// `0.07 iPATCH`
  pub const IPATCH: Self = Self(Code::IPATCH);

  /// Get the method of a request code, if it's one we know of
  pub fn from_code(code: Code) -> Option<Self> {
    [Self::GET,
     Self::POST,
     Self::PUT,
     Self::DELETE,
     Self::FETCH,
     Self::PATCH,
     Self::IPATCH].into_iter()
                  .find(|m| m.0 == code)
  }

  /// Get the message code of this method
  pub fn code(&self) -> Code {
    self.0
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match *self {
      | Self::GET => "GET",
      | Self::POST => "POST",
      | Self::PUT => "PUT",
      | Self::DELETE => "DELETE",
      | Self::FETCH => "FETCH",
      | Self::PATCH => "PATCH",
      | Self::IPATCH => "iPATCH",
      | Self(code) => return write!(f, "{}", code),
    };

    f.write_str(name)
  }
}
