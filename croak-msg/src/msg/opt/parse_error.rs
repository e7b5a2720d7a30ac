use std::fmt;

/// Why an option couldn't be parsed
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// The buffer ended inside an option
  UnexpectedEndOfStream,
  /// The delta nibble was the reserved value 15
  OptionDeltaReservedValue(u8),
  /// The length nibble was the reserved value 15
  ValueLengthReservedValue(u8),
  /// A 2-byte extended delta or length overflowed `u16`
  OptionNumberOverflow,
  /// The next byte is the payload marker (or there are no bytes left);
  /// ends option parsing without being an error
  OptionsExhausted,
}

impl OptParseError {
  /// [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl fmt::Display for OptParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "option truncated"),
      | Self::OptionDeltaReservedValue(n) => write!(f, "reserved option delta nibble {}", n),
      | Self::ValueLengthReservedValue(n) => write!(f, "reserved option length nibble {}", n),
      | Self::OptionNumberOverflow => write!(f, "option number overflowed"),
      | Self::OptionsExhausted => write!(f, "no more options"),
    }
  }
}

impl std::error::Error for OptParseError {}
