/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Observe option values
pub mod observe;

macro_rules! opts {
  ($($number:literal $name:ident $doc:literal;)*) => {
    $(
      #[doc = $doc]
      pub const $name: crate::OptNumber = crate::OptNumber($number);
    )*
  };
}

/// Options that occur at most once per message
pub mod no_repeat {
  opts! {
    3  HOST           "Uri-Host ([RFC7252 section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1))";
    5  IF_NONE_MATCH  "If-None-Match ([RFC7252 section 5.10.8.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.2))";
    6  OBSERVE        "Observe ([RFC7641 section 2](https://datatracker.ietf.org/doc/html/rfc7641#section-2))";
    7  PORT           "Uri-Port; see [`HOST`]";
    12 CONTENT_FORMAT "Content-Format ([RFC7252 section 5.10.3](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.3))";
    14 MAX_AGE        "Max-Age in seconds ([RFC7252 section 5.10.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.5))";
    17 ACCEPT         "Accept ([RFC7252 section 5.10.4](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.4))";
    35 PROXY_URI      "Proxy-Uri ([RFC7252 section 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2))";
    39 PROXY_SCHEME   "Proxy-Scheme; see [`PROXY_URI`]";
    60 SIZE1          "Size1 ([RFC7252 section 5.10.9](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.9))";
  }
}

/// Options that may occur more than once per message
pub mod repeat {
  opts! {
    1  IF_MATCH       "If-Match ([RFC7252 section 5.10.8.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.1))";
    4  ETAG           "ETag ([RFC7252 section 5.10.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.6))";
    8  LOCATION_PATH  "Location-Path ([RFC7252 section 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7))";
    11 PATH           "Uri-Path; one value per segment";
    15 QUERY          "Uri-Query; one value per `key=value` argument";
    20 LOCATION_QUERY "Location-Query; see [`LOCATION_PATH`]";
  }
}
