use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use croak_msg::{CodeKind, Id, Message, TryFromBytes, TryIntoBytes, Type};

use crate::forward::CoapClient;
use crate::logging::msg_summary;
use crate::net::{Addrd, Deliverer, Endpoint, EndpointError};
use crate::req::Req;
use crate::resp::Resp;

/// Largest datagram we'll read
const MAX_DATAGRAM: usize = 1152;

/// How often the receive loop checks whether it should stop
const POLL: Duration = Duration::from_millis(100);

fn encode(msg: &Message) -> io::Result<Vec<u8>> {
  msg.clone()
     .try_into_bytes::<Vec<u8>>()
     .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn is_timeout(e: &io::Error) -> bool {
  matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Endpoint receiving CoAP over a [`std::net::UdpSocket`].
///
/// Each datagram is delivered on its own thread. Messages sent without a message id
/// (`Id(0)` on a CON or NON) get a fresh one.
#[derive(Debug)]
pub struct UdpEndpoint {
  addr: SocketAddr,
  socket: Mutex<Option<Arc<UdpSocket>>>,
  deliverer: Arc<RwLock<Option<Arc<dyn Deliverer>>>>,
  running: Arc<AtomicBool>,
  receiver: Mutex<Option<JoinHandle<()>>>,
  next_id: Arc<AtomicU16>,
}

impl UdpEndpoint {
  /// An endpoint that will bind to `addr` when started
  pub fn new(addr: SocketAddr) -> Self {
    Self { addr,
           socket: Mutex::new(None),
           deliverer: Arc::new(RwLock::new(None)),
           running: Arc::new(AtomicBool::new(false)),
           receiver: Mutex::new(None),
           next_id: Arc::new(AtomicU16::new(rand::random())) }
  }

  /// Is the receive loop running?
  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone)]
struct Transport {
  socket: Arc<UdpSocket>,
  next_id: Arc<AtomicU16>,
}

impl Transport {
  fn send(&self, mut msg: Addrd<Message>) {
    let needs_id = msg.data().id == Id(0) && matches!(msg.data().ty, Type::Con | Type::Non);
    if needs_id {
      msg.data_mut().id = Id(self.next_id.fetch_add(1, Ordering::Relaxed));
    }

    let sent = encode(msg.data()).and_then(|bytes| self.socket.send_to(&bytes, msg.addr()));
    match sent {
      | Ok(_) => log::trace!(target: "croak", "sent {} to {}", msg_summary(msg.data()), msg.addr()),
      | Err(e) => log::error!(target: "croak", "failed to send to {}: {}", msg.addr(), e),
    }
  }

  fn handle(&self, deliverer: Arc<dyn Deliverer>, dgram: Vec<u8>, peer: SocketAddr) {
    let msg = match Message::try_from_bytes(&dgram) {
      | Ok(msg) => msg,
      | Err(e) => {
        log::warn!(target: "croak", "dropping unparseable datagram from {}: {}", peer, e);
        return;
      },
    };

    let outbox = |msg: Addrd<Message>| self.send(msg);
    if let Some(resp) = deliverer.deliver(Addrd(msg, peer), None, &outbox) {
      self.send(resp.map(Message::from));
    }
  }
}

impl Endpoint for UdpEndpoint {
  fn local_addr(&self) -> SocketAddr {
    self.socket
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .and_then(|sock| sock.local_addr().ok())
        .unwrap_or(self.addr)
  }

  fn start(&self) -> Result<(), EndpointError> {
    if self.deliverer
           .read()
           .unwrap_or_else(PoisonError::into_inner)
           .is_none()
    {
      return Err(EndpointError::NoDeliverer);
    }

    let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
    if receiver.is_some() {
      return Err(EndpointError::InvalidState("already running"));
    }

    let socket = Arc::new(UdpSocket::bind(self.addr)?);
    socket.set_read_timeout(Some(POLL))?;

    let transport = Transport { socket: socket.clone(),
                                next_id: self.next_id.clone() };
    let (running, deliverer) = (self.running.clone(), self.deliverer.clone());
    running.store(true, Ordering::SeqCst);

    let handle = thread::Builder::new().name(format!("croak-udp-{}", self.addr))
                                       .spawn(move || {
                                         let mut buf = [0u8; MAX_DATAGRAM];
                                         while running.load(Ordering::SeqCst) {
                                           let (n, peer) = match transport.socket.recv_from(&mut buf) {
                                             | Ok(recvd) => recvd,
                                             | Err(e) if is_timeout(&e) => continue,
                                             | Err(e) => {
                                               log::error!(target: "croak", "recv failed: {}", e);
                                               continue;
                                             },
                                           };

                                           let current = deliverer.read()
                                                                  .unwrap_or_else(PoisonError::into_inner)
                                                                  .clone();
                                           if let Some(current) = current {
                                             let (transport, dgram) = (transport.clone(), buf[..n].to_vec());
                                             thread::spawn(move || transport.handle(current, dgram, peer));
                                           }
                                         }
                                       });

    match handle {
      | Ok(handle) => {
        *receiver = Some(handle);
        *self.socket.lock().unwrap_or_else(PoisonError::into_inner) = Some(socket);
        Ok(())
      },
      | Err(e) => {
        self.running.store(false, Ordering::SeqCst);
        Err(EndpointError::Io(e))
      },
    }
  }

  fn stop(&self) -> Result<(), EndpointError> {
    self.running.store(false, Ordering::SeqCst);

    let handle = self.receiver
                     .lock()
                     .unwrap_or_else(PoisonError::into_inner)
                     .take();
    if let Some(handle) = handle {
      if handle.join().is_err() {
        log::error!(target: "croak", "receive loop of {} panicked", self.addr);
      }
    }

    self.socket
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    Ok(())
  }

  fn set_deliverer(&self, deliverer: Arc<dyn Deliverer>) {
    *self.deliverer.write().unwrap_or_else(PoisonError::into_inner) = Some(deliverer);
  }
}

/// [`CoapClient`] sending each request from its own ephemeral UDP socket.
///
/// No retransmission; a CON request is sent once.
#[derive(Debug, Clone, Copy)]
pub struct UdpCoapClient {
  timeout: Duration,
}

impl UdpCoapClient {
  /// Stop listening for a response after `timeout`
  pub fn new(timeout: Duration) -> Self {
    Self { timeout }
  }
}

impl CoapClient for UdpCoapClient {
  fn send(&self, req: Addrd<Req>) -> io::Result<Receiver<Resp>> {
    let origin = req.addr();
    let local: SocketAddr = if origin.is_ipv4() {
      ([0, 0, 0, 0], 0).into()
    } else {
      ([0u16; 8], 0).into()
    };

    let socket = UdpSocket::bind(local)?;
    socket.set_read_timeout(Some(self.timeout))?;
    socket.send_to(&encode(req.data().msg())?, origin)?;

    let token = req.data().msg_token();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
      let mut buf = [0u8; MAX_DATAGRAM];
      loop {
        let msg = match socket.recv_from(&mut buf) {
          | Ok((n, from)) if from == origin => Message::try_from_bytes(&buf[..n]),
          | Ok(_) => continue,
          | Err(e) => {
            log::debug!(target: "croak", "no response from {}: {}", origin, e);
            return;
          },
        };

        let msg = match msg {
          | Ok(msg) => msg,
          | Err(e) => {
            log::warn!(target: "croak", "unparseable response from {}: {}", origin, e);
            continue;
          },
        };

        match (msg.ty, msg.code.kind()) {
          | (Type::Reset, _) => {
            log::debug!(target: "croak", "{} reset the exchange", origin);
            return;
          },
          | (Type::Ack, CodeKind::Empty) => continue,
          | (_, CodeKind::Response) if msg.token == token => {
            if msg.ty == Type::Con {
              encode(&msg.ack(msg.id)).and_then(|ack| socket.send_to(&ack, origin))
                                      .map_err(|e| log::warn!(target: "croak", "failed to ack {}: {}", origin, e))
                                      .ok();
            }
            tx.send(Resp::from(msg)).ok();
            return;
          },
          | _ => continue,
        }
      }
    });

    Ok(rx)
  }
}
