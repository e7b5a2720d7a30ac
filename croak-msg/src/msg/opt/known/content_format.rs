/// Content-Format
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8`
  Text,
  /// `application/link-format`
  LinkFormat,
  /// `application/xml`
  Xml,
  /// `application/octet-stream`
  OctetStream,
  /// `application/exi`
  Exi,
  /// `application/json`
  Json,
  /// `application/cbor`
  Cbor,
  /// Another content format
  Other(u16),
}

impl ContentFormat {
  /// Convert this content format to the CoAP byte value
  pub fn bytes(&self) -> [u8; 2] {
    u16::from(self).to_be_bytes()
  }

  /// The media type registered for this content format, if it is one we know of
  ///
  /// ```
  /// use croak_msg::ContentFormat;
  ///
  /// assert_eq!(ContentFormat::Json.media_type(), Some("application/json"));
  /// assert_eq!(ContentFormat::Other(11542).media_type(), None);
  /// ```
  pub fn media_type(&self) -> Option<&'static str> {
    use ContentFormat::*;
    match *self {
      | Text => Some("text/plain; charset=utf-8"),
      | LinkFormat => Some("application/link-format"),
      | Xml => Some("application/xml"),
      | OctetStream => Some("application/octet-stream"),
      | Exi => Some("application/exi"),
      | Json => Some("application/json"),
      | Cbor => Some("application/cbor"),
      | Other(_) => None,
    }
  }

  /// Find the content format for a media type (parameters other than `charset` are ignored)
  ///
  /// ```
  /// use croak_msg::ContentFormat;
  ///
  /// assert_eq!(ContentFormat::from_media_type("text/plain"), Some(ContentFormat::Text));
  /// assert_eq!(ContentFormat::from_media_type("application/json; charset=utf-8"),
  ///            Some(ContentFormat::Json));
  /// assert_eq!(ContentFormat::from_media_type("image/png"), None);
  /// ```
  pub fn from_media_type(media_type: &str) -> Option<Self> {
    use ContentFormat::*;
    let essence = media_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
      | "text/plain" => Some(Text),
      | "application/link-format" => Some(LinkFormat),
      | "application/xml" | "text/xml" => Some(Xml),
      | "application/octet-stream" => Some(OctetStream),
      | "application/exi" => Some(Exi),
      | "application/json" => Some(Json),
      | "application/cbor" => Some(Cbor),
      | _ => None,
    }
  }
}

impl<'a> From<&'a ContentFormat> for u16 {
  fn from(f: &'a ContentFormat) -> Self {
    use ContentFormat::*;
    match *f {
      | Text => 0,
      | LinkFormat => 40,
      | Xml => 41,
      | OctetStream => 42,
      | Exi => 47,
      | Json => 50,
      | Cbor => 60,
      | Other(n) => n,
    }
  }
}

impl From<ContentFormat> for u16 {
  fn from(f: ContentFormat) -> Self {
    u16::from(&f)
  }
}

impl From<u16> for ContentFormat {
  fn from(n: u16) -> Self {
    use ContentFormat::*;
    match n {
      | 0 => Text,
      | 40 => LinkFormat,
      | 41 => Xml,
      | 42 => OctetStream,
      | 47 => Exi,
      | 50 => Json,
      | 60 => Cbor,
      | n => Other(n),
    }
  }
}
