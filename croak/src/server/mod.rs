use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Config;
use crate::dedup::{self, Deduplicator};
use crate::discovery::WellKnownCore;
use crate::net::{Deliverer, Endpoint, EndpointError};
use crate::observe::Observers;
use crate::resource::{self, Container, Resource, ResourceId, ResourceTree};
use crate::std::UdpEndpoint;

mod deliver;
mod exchange;

pub use deliver::ServerDeliverer;
pub use exchange::{CoapExchange, ExchangeError, DEFAULT_MAX_AGE};

/// Errors encounterable starting a server
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Every endpoint failed to start
  #[error("no endpoint could be started ({} failed)", .0.len())]
  NoEndpointStarted(Vec<(SocketAddr, EndpointError)>),
}

/// A CoAP server; a resource tree served over any number of endpoints.
///
/// Every endpoint hands its inbound messages to the same [`Deliverer`]
/// ([`ServerDeliverer`] unless replaced with [`CoapServer::set_deliverer`]).
///
/// ```
/// use std::sync::Arc;
///
/// use croak::config::Config;
/// use croak::resource::Container;
/// use croak::server::CoapServer;
///
/// let server = CoapServer::new(Config::default());
/// let things = server.add(Arc::new(Container::new("things"))).unwrap();
///
/// assert_eq!(server.resources().find_resource("things").map(|f| f.id), Some(things));
/// assert!(server.resources().find_resource(".well-known/core").is_some());
/// ```
#[derive(Debug)]
pub struct CoapServer {
  config: Config,
  tree: Arc<ResourceTree>,
  dedup: Arc<dyn Deduplicator>,
  observers: Arc<Observers>,
  endpoints: RwLock<Vec<Arc<dyn Endpoint>>>,
  deliverer: RwLock<Arc<dyn Deliverer>>,
}

impl CoapServer {
  /// Create a server with an empty resource tree (apart from `/.well-known/core`)
  pub fn new(config: Config) -> Self {
    Self::with_tree(config, Arc::new(ResourceTree::new()))
  }

  /// Create a server serving an existing resource tree.
  ///
  /// `/.well-known/core` is added if the tree lacks it.
  pub fn with_tree(config: Config, tree: Arc<ResourceTree>) -> Self {
    if tree.find_segments(WellKnownCore::PATH).is_none() {
      let well_known = tree.get_child(tree.root(), WellKnownCore::PATH[0])
                           .map(Ok)
                           .unwrap_or_else(|| tree.add(Arc::new(Container::hidden(WellKnownCore::PATH[0]))));
      match well_known.and_then(|parent| tree.add_child(parent, Arc::new(WellKnownCore))) {
        | Ok(_) => (),
        | Err(e) => log::warn!(target: "croak", "couldn't add discovery resource: {}", e),
      }
    }

    let dedup = dedup::from_config(&config);
    let observers = Arc::new(Observers::default());
    let deliverer: Arc<dyn Deliverer> = Arc::new(ServerDeliverer::new(config,
                                                                      tree.clone(),
                                                                      dedup.clone(),
                                                                      observers.clone()));

    Self { config,
           tree,
           dedup,
           observers,
           endpoints: RwLock::new(Vec::new()),
           deliverer: RwLock::new(deliverer) }
  }

  /// Runtime config
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// The resource tree
  pub fn resources(&self) -> &Arc<ResourceTree> {
    &self.tree
  }

  /// Observe relations of the resource tree
  pub fn observers(&self) -> &Arc<Observers> {
    &self.observers
  }

  /// The deduplicator
  pub fn dedup(&self) -> &Arc<dyn Deduplicator> {
    &self.dedup
  }

  /// Add a resource beneath the root
  pub fn add(&self, resource: Arc<dyn Resource>) -> Result<ResourceId, resource::Error> {
    self.tree.add(resource)
  }

  /// Add a resource beneath the resource at `path`
  pub fn add_at(&self, path: &str, resource: Arc<dyn Resource>) -> Result<ResourceId, resource::Error> {
    self.tree.add_at(path, resource)
  }

  /// Remove a resource (and its descendants), dropping its observe relations
  pub fn remove(&self, id: ResourceId) -> bool {
    self.observers.forget(id);
    self.tree.remove(id)
  }

  /// The deliverer endpoints hand inbound messages to
  pub fn deliverer(&self) -> Arc<dyn Deliverer> {
    self.deliverer
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
  }

  /// Replace the deliverer of this server and every endpoint
  pub fn set_deliverer(&self, deliverer: Arc<dyn Deliverer>) {
    *self.deliverer.write().unwrap_or_else(PoisonError::into_inner) = deliverer.clone();
    self.endpoints()
        .iter()
        .for_each(|ep| ep.set_deliverer(deliverer.clone()));
  }

  /// Serve over an additional endpoint
  pub fn add_endpoint(&self, endpoint: Arc<dyn Endpoint>) {
    endpoint.set_deliverer(self.deliverer());
    log::debug!(target: "croak", "added endpoint {}", endpoint.local_addr());
    self.endpoints
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(endpoint);
  }

  /// Stop serving over the endpoint bound to `addr`.
  ///
  /// The endpoint is not stopped.
  pub fn remove_endpoint(&self, addr: SocketAddr) -> Option<Arc<dyn Endpoint>> {
    let mut endpoints = self.endpoints.write().unwrap_or_else(PoisonError::into_inner);
    let ix = endpoints.iter().position(|ep| ep.local_addr() == addr)?;
    Some(endpoints.remove(ix))
  }

  /// Endpoints served over
  pub fn endpoints(&self) -> Vec<Arc<dyn Endpoint>> {
    self.endpoints
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
  }

  /// Start the deduplicator and every endpoint.
  ///
  /// If no endpoints were added, a UDP endpoint on `0.0.0.0:<default_port>` is added first.
  /// Succeeds if at least one endpoint started; failures of the others are logged.
  pub fn start(&self) -> Result<(), Error> {
    if self.endpoints().is_empty() {
      let addr = SocketAddr::from(([0, 0, 0, 0], self.config.default_port));
      log::info!(target: "croak", "no endpoints; adding default endpoint {}", addr);
      self.add_endpoint(Arc::new(UdpEndpoint::new(addr)));
    }

    self.dedup.start();

    let (started, failed) =
      self.endpoints()
          .into_iter()
          .fold((0usize, Vec::new()), |(started, mut failed), ep| match ep.start() {
            | Ok(()) => {
              log::info!(target: "croak", "started endpoint {}", ep.local_addr());
              (started + 1, failed)
            },
            | Err(e) => {
              log::warn!(target: "croak", "failed to start endpoint {}: {}", ep.local_addr(), e);
              failed.push((ep.local_addr(), e));
              (started, failed)
            },
          });

    if started == 0 {
      self.dedup.stop();
      Err(Error::NoEndpointStarted(failed))
    } else {
      Ok(())
    }
  }

  /// Stop every endpoint and the deduplicator.
  ///
  /// Failures to stop individual endpoints are logged and don't prevent stopping the rest.
  pub fn stop(&self) {
    self.endpoints().into_iter().for_each(|ep| {
                                  if let Err(e) = ep.stop() {
                                    log::warn!(target: "croak", "failed to stop endpoint {}: {}", ep.local_addr(), e);
                                  }
                                });
    self.dedup.stop();
    log::info!(target: "croak", "server stopped");
  }
}
