use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;

use croak_msg::Message;

use crate::resp::Resp;

/// Data that came from (or is headed to) a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents of the addressed item
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }

  /// Turn the entire structure into something else
  pub fn fold<R>(self, f: impl FnOnce(T, SocketAddr) -> R) -> R {
    f(self.0, self.1)
  }
}

impl<T> AsMut<T> for Addrd<T> {
  fn as_mut(&mut self) -> &mut T {
    &mut self.0
  }
}

/// Security context a transport attached to an inbound message
/// (e.g. a DTLS session), copied onto every response of the exchange.
///
/// `croak` never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
  /// Transport-assigned session identifier
  pub id: u64,
  /// Authenticated identity of the peer, if any
  pub peer_identity: Option<String>,
}

/// Sink for messages that must go out before [`Deliverer::deliver`] returns,
/// e.g. the empty ACK announcing a separate response.
pub trait Outbox {
  /// Send a message now
  fn send(&self, msg: Addrd<Message>);
}

/// [`Outbox`] that drops everything; for transports that only care about the final outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutbox;

impl Outbox for NoOutbox {
  fn send(&self, msg: Addrd<Message>) {
    log::trace!(target: "croak", "NoOutbox dropping {}", crate::logging::msg_summary(msg.data()));
  }
}

impl<F> Outbox for F where F: Fn(Addrd<Message>)
{
  fn send(&self, msg: Addrd<Message>) {
    self(msg)
  }
}

/// The one operation the message-processing core exposes to transports:
/// "here is an inbound message from peer P".
pub trait Deliverer: Send + Sync + Debug {
  /// Process an inbound message.
  ///
  /// Interim messages are sent through `outbox` as they are produced;
  /// the returned response (if any) is the final answer to send back,
  /// and carries `session` so the transport can secure it.
  fn deliver(&self,
             msg: Addrd<Message>,
             session: Option<Session>,
             outbox: &dyn Outbox)
             -> Option<Addrd<Resp>>;
}

/// Errors encounterable starting & stopping endpoints
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
  /// Socket I/O failed
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
  /// `start` was invoked before a deliverer was set
  #[error("no deliverer set")]
  NoDeliverer,
  /// The endpoint can't be started in its current state
  #[error("endpoint is {0}")]
  InvalidState(&'static str),
}

/// A bound network listener that hands inbound messages to a [`Deliverer`]
pub trait Endpoint: Send + Sync + Debug {
  /// The address this endpoint listens on
  fn local_addr(&self) -> SocketAddr;

  /// Begin receiving messages
  fn start(&self) -> Result<(), EndpointError>;

  /// Stop receiving messages
  fn stop(&self) -> Result<(), EndpointError>;

  /// Replace the deliverer inbound messages are handed to
  fn set_deliverer(&self, deliverer: Arc<dyn Deliverer>);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn addrd_map_keeps_addr() {
    let addr: SocketAddr = "127.0.0.1:5683".parse().unwrap();
    let a = Addrd(1u8, addr).map(|n| n + 1);
    assert_eq!(a, Addrd(2, addr));
    assert_eq!(a.fold(|n, addr| (n, addr.port())), (2, 5683));
  }
}
