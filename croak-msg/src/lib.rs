//! Low-level representation of CoAP messages.
//!
//! The most notable item in `croak_msg` is [`Message`];
//! a CoAP message very close to the actual byte layout,
//! with options stored in a map keyed by [`OptNumber`]
//! so that option numbers never have to be recomputed from deltas.
//!
//! ```
//! use croak_msg::{Code, Id, Message, Token, TryFromBytes, TryIntoBytes, Type};
//!
//! let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
//! msg.set_path("sensors/temp");
//!
//! let bytes: Vec<u8> = msg.clone().try_into_bytes().unwrap();
//! assert_eq!(Message::try_from_bytes(&bytes).unwrap(), msg);
//! ```

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
#![cfg_attr(not(test), warn(unreachable_pub))]

pub(crate) mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::{MessageToBytesError, TryIntoBytes};

/// A NON 2.05 carrying `{"temp":21}` as JSON, and its encoding
#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  let mut msg = Message::new(Type::Non,
                             Code::new(2, 5),
                             Id(0x1234),
                             Token::from_bytes(&[0xAB, 0xCD]).unwrap_or_default());
  msg.set_content_format(ContentFormat::Json);
  msg.payload = Payload(br#"{"temp":21}"#.to_vec());

  let bytes = [&[0b01_01_0010, 0b010_00101, 0x12, 0x34, 0xAB, 0xCD][..],
               &[0b1100_0001, 50],
               &[0xFF],
               br#"{"temp":21}"#].concat();

  (msg, bytes)
}
