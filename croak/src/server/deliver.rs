use std::sync::Arc;

use croak_msg::{CodeKind, Message, Type};

use super::CoapExchange;
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::exchange::{Exchange, KeyId};
use crate::logging::msg_summary;
use crate::net::{Addrd, Deliverer, Outbox, Session};
use crate::observe::Observers;
use crate::req::Req;
use crate::resource::ResourceTree;
use crate::resp::{code, Resp};

/// The [`Deliverer`] of a [`CoapServer`](super::CoapServer);
/// deduplicates inbound requests and dispatches them to the resource tree.
#[derive(Debug, Clone)]
pub struct ServerDeliverer {
  config: Config,
  tree: Arc<ResourceTree>,
  dedup: Arc<dyn Deduplicator>,
  observers: Arc<Observers>,
}

impl ServerDeliverer {
  /// Create a deliverer dispatching into `tree`
  pub fn new(config: Config,
             tree: Arc<ResourceTree>,
             dedup: Arc<dyn Deduplicator>,
             observers: Arc<Observers>)
             -> Self {
    Self { config,
           tree,
           dedup,
           observers }
  }

  fn handle_request(&self,
                    msg: Addrd<Message>,
                    session: Option<Session>,
                    outbox: &dyn Outbox)
                    -> Option<Addrd<Resp>> {
    let key = KeyId::mid(msg.as_ref());
    let exchange = Arc::new(Exchange::new(msg.map(Req::from), session));

    match self.dedup.find_previous(key, exchange.clone()) {
      | Some(original) => {
        log::debug!(target: "croak", "duplicate of {:?}; replaying its response", key);
        let resp = original.await_response(self.config.duplicate_wait);
        if resp.is_none() {
          log::warn!(target: "croak", "original of duplicate {:?} didn't respond in time", key);
        }
        resp
      },
      | None => {
        self.dispatch(exchange.clone(), outbox);
        exchange.latest_response()
      },
    }
  }

  /// Resolve the target resource and run its handler
  pub(crate) fn dispatch(&self, exchange: Arc<Exchange>, outbox: &dyn Outbox) {
    let found = match exchange.request().data().msg().path() {
      | Ok(segments) => self.tree.find_segments(segments),
      | Err(e) => {
        log::debug!(target: "croak", "Uri-Path is not UTF-8: {}", e);
        None
      },
    };
    let mut ex = CoapExchange::new(exchange.clone(), &self.tree, &self.observers, outbox);

    match found {
      | None => {
        log::debug!(target: "croak",
                    "no resource at {:?}",
                    exchange.request().data().path());
        ex.respond(code::NOT_FOUND).ok();
      },
      | Some(found) => {
        exchange.set_resource(found.id);
        found.handler.handle_request(&mut ex);

        if !exchange.is_complete() {
          log::error!(target: "croak",
                      "resource {:?} returned without responding to {}",
                      found.handler.name(),
                      msg_summary(exchange.request().data().msg()));
          ex.respond(code::INTERNAL_SERVER_ERROR).ok();
        }
      },
    }
  }
}

impl Deliverer for ServerDeliverer {
  fn deliver(&self,
             msg: Addrd<Message>,
             session: Option<Session>,
             outbox: &dyn Outbox)
             -> Option<Addrd<Resp>> {
    log::trace!(target: "croak", "{} <- {}", msg_summary(msg.data()), msg.addr());

    let resp = match (msg.data().ty, msg.data().code.kind()) {
      | (Type::Ack, _) | (Type::Reset, _) => None,
      | (Type::Con, CodeKind::Empty) => {
        log::trace!(target: "croak", "ping from {}", msg.addr());
        Some(reset(&msg, session))
      },
      | (_, CodeKind::Request) => self.handle_request(msg, session, outbox),
      | (Type::Con, _) => {
        log::debug!(target: "croak", "rejecting unexpected {}", msg_summary(msg.data()));
        Some(reset(&msg, session))
      },
      | (Type::Non, _) => None,
    };

    if let Some(resp) = resp.as_ref() {
      log::trace!(target: "croak", "{} -> {}", msg_summary(resp.data().msg()), resp.addr());
    }

    resp
  }
}

/// RST answering `msg`, in the session it arrived in
fn reset(msg: &Addrd<Message>, session: Option<Session>) -> Addrd<Resp> {
  let mut rst = Resp::from(msg.data().reset());
  rst.set_session(session);
  Addrd(rst, msg.addr())
}
