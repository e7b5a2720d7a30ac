use std::collections::BTreeMap;

use tinyvec::ArrayVec;

use crate::cursor::Cursor;
use crate::from_bytes::*;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Well-known option numbers and values
pub mod known;

/// Options of a message, keyed and ordered by [`OptNumber`].
///
/// Repeatable options keep their values in the order they were added / parsed.
pub type OptMap = BTreeMap<OptNumber, Vec<OptValue>>;

/// Nibble values 13 and 14 mean the real value follows in 1 or 2 extended bytes,
/// offset by 13 and 269 respectively. 15 is reserved.
const EXT_1: u16 = 13;
const EXT_2: u16 = 269;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(nibble: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u16, OptParseError> {
  let ext = match nibble {
    | 13 => bytes.next().map(u16::from).map(|n| n + EXT_1),
    | 14 => bytes.take_exact(2)
                 .and_then(|bs| <[u8; 2]>::try_from(bs).ok())
                 .map(u16::from_be_bytes)
                 .map(|n| n.checked_add(EXT_2).ok_or(OptParseError::OptionNumberOverflow))
                 .transpose()?,
    | 15 => return Err(reserved_err),
    | n => return Ok(u16::from(n)),
  };

  ext.ok_or(OptParseError::UnexpectedEndOfStream)
}

/// Split an option delta or value length into its header nibble
/// and the extended bytes following the header
pub(crate) fn opt_len_or_delta(val: u16) -> (u8, ArrayVec<[u8; 2]>) {
  let mut ext = ArrayVec::new();
  let nibble = if val >= EXT_2 {
    ext.extend((val - EXT_2).to_be_bytes());
    14
  } else if val >= EXT_1 {
    ext.push((val - EXT_1) as u8);
    13
  } else {
    val as u8
  };

  (nibble, ext)
}

/// Option Number, identifying which option is being set
/// (e.g. Content-Format has a Number of 12).
///
/// On the wire options carry the delta between their number and the previous
/// option's; the codec resolves those deltas so everything above it deals in numbers.
///
/// See [RFC7252 Section 5.4.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.6)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl OptNumber {
  /// Critical options must be understood by the recipient; an unrecognized
  /// critical option in a CON request is answered with 4.02
  /// ([RFC7252 section 5.4.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.1)).
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }

  /// Unsafe options may not be forwarded by a proxy that doesn't understand them
  /// ([RFC7252 section 5.4.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.2)).
  pub fn is_unsafe(&self) -> bool {
    self.0 & 0b10 != 0
  }

  /// Safe-to-forward options whose value is not part of a proxy's cache key
  pub fn is_no_cache_key(&self) -> bool {
    !self.is_unsafe() && self.0 & 0b11100 == 0b11100
  }
}

/// Value of an option. Interpretation (string, uint, opaque) depends on the [`OptNumber`].
///
/// See [RFC7252 Section 3.2](https://datatracker.ietf.org/doc/html/rfc7252#section-3.2)
#[derive(Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Encode an unsigned integer in the minimal number of
  /// big-endian bytes (zero is the empty value).
  ///
  /// ```
  /// use croak_msg::OptValue;
  ///
  /// assert_eq!(OptValue::uint(0).0, Vec::<u8>::new());
  /// assert_eq!(OptValue::uint(60).0, vec![60]);
  /// assert_eq!(OptValue::uint(0x0102).0, vec![1, 2]);
  /// ```
  pub fn uint(n: u32) -> Self {
    let bytes = n.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    Self(bytes[first..].to_vec())
  }

  /// Interpret this value as a big-endian unsigned integer.
  ///
  /// Values longer than 4 bytes yield `None`.
  pub fn as_uint(&self) -> Option<u32> {
    if self.0.len() > 4 {
      None
    } else {
      Some(self.0.iter().fold(0u32, |n, b| (n << 8) | *b as u32))
    }
  }

  /// Interpret this value as UTF-8
  pub fn as_str(&self) -> Option<&str> {
    std::str::from_utf8(&self.0).ok()
  }
}

impl From<&str> for OptValue {
  fn from(s: &str) -> Self {
    Self(s.as_bytes().to_vec())
  }
}

/// A single option as it appears on the wire
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Opt {
  pub(crate) delta: u16,
  pub(crate) value: OptValue,
}

impl Opt {
  /// Append this option's header, extended bytes and value to `bytes`
  pub(crate) fn extend_bytes(self, bytes: &mut impl Extend<u8>) {
    let (delta, delta_ext) = opt_len_or_delta(self.delta);
    let (len, len_ext) = opt_len_or_delta(self.value.0.len() as u16);

    bytes.extend([(delta << 4) | len]);
    bytes.extend(delta_ext);
    bytes.extend(len_ext);
    bytes.extend(self.value.0);
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Opt {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    // the payload marker is left for the message parser to consume
    match bytes.peek_next() {
      | None | Some(0b11111111) => return Err(OptParseError::OptionsExhausted),
      | Some(_) => (),
    }

    let byte1 = bytes.next().ok_or(OptParseError::OptionsExhausted)?;

    // delta's extended bytes precede the length's
    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;

    let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))?
              as usize;

    let value = bytes.take_exact(len)
                     .ok_or(OptParseError::UnexpectedEndOfStream)?
                     .to_vec();

    Ok(Opt { delta,
             value: OptValue(value) })
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for OptMap {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = OptMap::new();
    let mut number = 0u32;

    loop {
      match Opt::try_consume_bytes(bytes) {
        | Ok(opt) => {
          number += opt.delta as u32;
          opts.entry(OptNumber(number)).or_default().push(opt.value);
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_opt() {
    let mut opt_bytes = Cursor::new([0b00010001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: 1,
                     value: OptValue(vec![1]) });

    let mut opt_bytes = Cursor::new([0b11010001, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: 14,
                     value: OptValue(vec![1]) });

    let mut opt_bytes = Cursor::new([0b11100001, 0b00000000, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: 270,
                     value: OptValue(vec![1]) });

    let mut opt_bytes = Cursor::new([0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: 0,
                     value: OptValue(vec![1]) });
  }

  #[test]
  fn parse_opt_map_accumulates_deltas() {
    // Uri-Path "a", Uri-Path "b", Content-Format 0
    let mut bytes = Cursor::new([0b1011_0001, b'a', 0b0000_0001, b'b', 0b0001_0000, 0b11111111]);
    let opts = OptMap::try_consume_bytes(&mut bytes).unwrap();

    assert_eq!(opts.get(&OptNumber(11)),
               Some(&vec![OptValue(b"a".to_vec()), OptValue(b"b".to_vec())]));
    assert_eq!(opts.get(&OptNumber(12)), Some(&vec![OptValue(vec![])]));
  }

  #[test]
  fn parse_opt_reserved_and_truncated() {
    let mut bytes = Cursor::new([0b1111_0001, 0]);
    assert_eq!(Opt::try_consume_bytes(&mut bytes),
               Err(OptParseError::OptionDeltaReservedValue(15)));

    let mut bytes = Cursor::new([0b0001_1111, 0]);
    assert_eq!(Opt::try_consume_bytes(&mut bytes),
               Err(OptParseError::ValueLengthReservedValue(15)));

    let mut bytes = Cursor::new([0b0001_0011, 0]);
    assert_eq!(Opt::try_consume_bytes(&mut bytes),
               Err(OptParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn uint_values() {
    assert_eq!(OptValue::uint(247).as_uint(), Some(247));
    assert_eq!(OptValue::uint(0x01_00_00).0, vec![1, 0, 0]);
    assert_eq!(OptValue(vec![1, 2, 3, 4, 5]).as_uint(), None);
  }

  #[test]
  fn opt_number_flags() {
    use known::{no_repeat, repeat};

    assert!(repeat::IF_MATCH.is_critical());
    assert!(no_repeat::HOST.is_critical() && no_repeat::HOST.is_unsafe());
    assert!(!repeat::ETAG.is_critical() && !repeat::ETAG.is_unsafe());
    assert!(no_repeat::SIZE1.is_no_cache_key());
    assert!(!repeat::ETAG.is_no_cache_key());
  }
}
