use super::MessageParseError;
use crate::cursor::Cursor;
use crate::from_bytes::TryConsumeBytes;

/// Message ID; the 16-bit, big-endian field in every header.
///
/// Matches ACK & RST to the CON or NON they answer, and lets a receiver
/// recognize a retransmitted CON ([RFC7252 section 4.5](https://datatracker.ietf.org/doc/html/rfc7252#section-4.5)).
///
/// An id only needs to be unique per peer within `EXCHANGE_LIFETIME`;
/// request/response correlation across messages uses the [`Token`](super::Token).
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Debug, Eq, Ord, Default)]
pub struct Id(pub u16);

impl From<[u8; 2]> for Id {
  fn from(bs: [u8; 2]) -> Self {
    Id(u16::from_be_bytes(bs))
  }
}

impl From<Id> for [u8; 2] {
  fn from(Id(n): Id) -> [u8; 2] {
    n.to_be_bytes()
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Id {
  type Error = MessageParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    bytes.take_exact(2)
         .and_then(|bs| <[u8; 2]>::try_from(bs).ok())
         .map(Id::from)
         .ok_or(MessageParseError::UnexpectedEndOfStream)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn big_endian() {
    assert_eq!(Id::from([0x01, 0x02]), Id(258));
    assert_eq!(<[u8; 2]>::from(Id(258)), [0x01, 0x02]);
  }

  #[test]
  fn needs_two_bytes() {
    let mut one = Cursor::new([0x01u8]);
    assert_eq!(Id::try_consume_bytes(&mut one),
               Err(MessageParseError::UnexpectedEndOfStream));
  }
}
