use crate::cursor::Cursor;

/// Parse a whole structure out of a byte buffer
pub trait TryFromBytes<A: AsRef<[u8]>>: Sized {
  /// Why parsing failed
  type Error;

  /// Parse `bytes`
  fn try_from_bytes(bytes: A) -> Result<Self, Self::Error>;
}

/// Parse one field of a structure, advancing the cursor past it
pub(crate) trait TryConsumeBytes<A: AsRef<[u8]>>: Sized {
  type Error;

  fn try_consume_bytes(bytes: &mut Cursor<A>) -> Result<Self, Self::Error>;
}
