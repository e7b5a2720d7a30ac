use std::fmt;

use crate::msg::opt::Opt;
use crate::msg::Byte1;
use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error yielded when the message can't be serialized
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use croak_msg::{Code, ContentFormat, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let mut msg = Message::new(Type::Non, Code::new(2, 5), Id(7), Token::default());
  /// msg.set_content_format(ContentFormat::Text);
  /// msg.payload.0 = b"hi".to_vec();
  ///
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  /// assert_eq!(bytes, vec![0b01_01_0000, 0b010_00101, 0, 7, 0b1100_0000, 0xFF, b'h', b'i']);
  /// ```
  fn try_into_bytes<C: Default + Extend<u8>>(self) -> Result<C, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// Option number too large to be expressed as a delta from the previous option
  OptionDeltaTooLarge(OptNumber),
  /// Option value longer than the extended length encoding permits
  #[allow(missing_docs)]
  OptionValueTooLong { number: OptNumber, len: usize },
}

impl fmt::Display for MessageToBytesError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | Self::OptionDeltaTooLarge(n) => write!(f, "option {} can't be encoded as a delta", n.0),
      | Self::OptionValueTooLong { number, len } => {
        write!(f, "option {} value of {} bytes is too long", number.0, len)
      },
    }
  }
}

impl std::error::Error for MessageToBytesError {}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes<C: Default + Extend<u8>>(self) -> Result<C, Self::Error> {
    let mut bytes = C::default();

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.extend(Some(byte1));
    bytes.extend(Some(code));

    bytes.extend(id);
    bytes.extend(self.token.0);

    let mut prev = 0u32;
    for (number, values) in self.opts {
      for value in values {
        let delta = u16::try_from(number.0 - prev).map_err(|_| {
                                                      Self::Error::OptionDeltaTooLarge(number)
                                                    })?;

        let len = value.0.len();
        if u16::try_from(len).is_err() {
          return Err(Self::Error::OptionValueTooLong { number, len });
        }

        Opt { delta, value }.extend_bytes(&mut bytes);
        prev = number.0;
      }
    }

    if !self.payload.0.is_empty() {
      bytes.extend(Some(0b11111111));
      bytes.extend(self.payload.0);
    }

    Ok(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn msg() {
    let (msg, expected) = crate::test_msg();
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eq!(actual, expected);
  }

  #[test]
  fn extended_delta_and_length() {
    let opt = |delta: u16, len: usize| {
      let mut bytes = Vec::new();
      Opt { delta,
            value: OptValue(vec![7; len]) }.extend_bytes(&mut bytes);
      bytes
    };

    assert_eq!(opt(1, 1), vec![0b0001_0001, 7]);
    assert_eq!(opt(24, 1), vec![0b1101_0001, 24 - 13, 7]);
    assert_eq!(&opt(35, 20)[..3], &[0b1101_1101, 35 - 13, 20 - 13]);

    let long = opt(300, 300);
    assert_eq!(&long[..5],
               &[0b1110_1110, 0, (300u16 - 269) as u8, 0, (300u16 - 269) as u8]);
    assert_eq!(long.len(), 5 + 300);
  }

  #[test]
  fn repeated_options_use_zero_delta() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    msg.set_path("a/b");
    let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eq!(&bytes[4..], &[0b1011_0001, b'a', 0b0000_0001, b'b']);
  }

  #[test]
  fn no_payload_marker_when_payload_empty() {
    let msg = Message::new(Type::Con, Code::EMPTY, Id(1), Token::default());
    let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eq!(bytes.len(), 4);
  }

  #[test]
  fn round_trip_through_parser() {
    let mut msg = Message::new(Type::Con,
                               Code::POST,
                               Id(0xBEEF),
                               Token::from_bytes(&[1, 2, 3, 4]).unwrap());
    msg.set_path("x/y/z");
    msg.set_uint(no_repeat::PROXY_SCHEME, 0);
    msg.set(no_repeat::PROXY_URI, OptValue::from("coap://example.org/a"));
    msg.payload = Payload(vec![0xAA; 20]);

    let bytes: Vec<u8> = msg.clone().try_into_bytes().unwrap();
    assert_eq!(Message::try_from_bytes(bytes).unwrap(), msg);
  }
}
