//! `croak` is the message-processing core of a CoAP node.
//!
//! It takes an arriving request and
//! - guarantees it is processed at most once, even when the unreliable
//!   transport redelivers it ([`dedup`]),
//! - routes it through a hierarchical resource space ([`resource`], [`server`]),
//! - hands the matched resource a façade for shaping its response ([`server::CoapExchange`]),
//! - and, for proxy nodes, forwards it to another CoAP or HTTP origin ([`forward`]).
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the semantics of HTTP
//! to an environment conducive to **constrained** devices. (weak hardware, small battery capacity, etc.)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use croak::config::Config;
//! use croak::resource::Resource;
//! use croak::resp::code;
//! use croak::server::{CoapExchange, CoapServer};
//!
//! #[derive(Debug)]
//! struct Hello;
//!
//! impl Resource for Hello {
//!   fn name(&self) -> &str {
//!     "hello"
//!   }
//!
//!   fn handle_get(&self, ex: &mut CoapExchange) {
//!     ex.respond_payload(code::CONTENT, "hello, world!").ok();
//!   }
//! }
//!
//! let server = CoapServer::new(Config::default());
//! server.add(Arc::new(Hello)).unwrap();
//! server.start().unwrap();
//! ```

// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]


pub(crate) mod logging;

/// configuring runtime behavior
pub mod config;

/// network abstractions
pub mod net;

/// time abstractions
pub mod time;

/// requests
pub mod req;

/// responses
pub mod resp;

/// Exchange keys & state shared between deduplication, dispatch and handlers
pub mod exchange;

/// Suppressing duplicate requests
pub mod dedup;

/// The resource tree
pub mod resource;

/// Observe (RFC7641) relations
pub mod observe;

/// `/.well-known/core` resource discovery
pub mod discovery;

/// Dispatching requests to resources
pub mod server;

/// Proxy forwarding (CoAP to CoAP, CoAP to HTTP)
pub mod forward;

/// `std::net::UdpSocket` endpoint & client
pub mod std;

#[doc(inline)]
pub use croak_msg as msg;

macro_rules! code {
  (rfc7252($section:literal) $name:ident = $c:literal * $d:literal) => {
    #[doc = concat!("See [RFC7252 Section ",
                    $section,
                    "](https://datatracker.ietf.org/doc/html/rfc7252#section-",
                    $section,
                    ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: croak_msg::Code = croak_msg::Code::new($c, $d);
  };
  (#[doc = $doc:expr] $name:ident = $c:literal * $d:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: croak_msg::Code = croak_msg::Code::new($c, $d);
  };
}

pub(crate) use code;
