use super::MessageParseError;

/// Message type; the 2-bit `T` header field
/// ([RFC7252 section 4.2 & 4.3](https://datatracker.ietf.org/doc/html/rfc7252#section-4.2))
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub enum Type {
  /// Fire & forget; never ACKed, may be answered with RST
  Non,
  /// Must be answered by exactly one ACK or RST with the same message id.
  ///
  /// An empty CON is a "CoAP ping".
  Con,
  /// Answers a CON; may carry a piggybacked response
  Ack,
  /// The receiver got the message but can't process it
  Reset,
}

impl Type {
  /// Is this an ACK or RST, i.e. an answer to another message at the message layer?
  pub fn is_reply(&self) -> bool {
    matches!(self, Type::Ack | Type::Reset)
  }
}

impl TryFrom<u8> for Type {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    [Type::Con, Type::Non, Type::Ack, Type::Reset].get(usize::from(b))
                                                  .copied()
                                                  .ok_or(MessageParseError::InvalidType(b))
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    match t {
      | Type::Con => 0,
      | Type::Non => 1,
      | Type::Ack => 2,
      | Type::Reset => 3,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_values() {
    for ty in [Type::Con, Type::Non, Type::Ack, Type::Reset] {
      assert_eq!(Type::try_from(u8::from(ty)), Ok(ty));
    }
    assert_eq!(Type::try_from(4u8), Err(MessageParseError::InvalidType(4)));
  }

  #[test]
  fn replies() {
    assert!(Type::Ack.is_reply());
    assert!(Type::Reset.is_reply());
    assert!(!Type::Con.is_reply());
  }
}
