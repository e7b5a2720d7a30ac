use tinyvec::ArrayVec;

/// # Message Token
///
/// The Token is used to match a response with a request. The token value is a sequence of 0 to 8 bytes.
///
/// Every message carries a token, even if it is of zero length.
/// Every request carries a client-generated token that the server
/// MUST echo (without modification) in any resulting response.
///
/// Where the message [`Id`](super::Id) deduplicates messages at the
/// message layer, the token correlates requests and responses
/// at the request/response layer (e.g. separate responses and notifications).
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Build a token from up to 8 bytes, returning `None` if `bytes` is longer.
  ///
  /// ```
  /// use croak_msg::Token;
  ///
  /// assert!(Token::from_bytes(&[1, 2, 3]).is_some());
  /// assert!(Token::from_bytes(&[0; 9]).is_none());
  /// ```
  pub fn from_bytes(bytes: &[u8]) -> Option<Token> {
    ArrayVec::try_from(bytes).ok().map(Token)
  }

  /// Token bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Is this the zero-length token?
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
