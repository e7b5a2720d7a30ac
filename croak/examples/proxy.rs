use std::net::SocketAddr;
use std::sync::Arc;

use croak::config::Config;
use croak::forward::{CoapForwarder, ForwardingResource, HttpForwarder};
use croak::server::CoapServer;
use croak::std::UdpEndpoint;

pub fn main() {
  std::env::set_var("RUST_LOG", "info,croak=trace");
  simple_logger::init_with_env().unwrap();

  let config = Config::default();
  let server = CoapServer::new(config);

  server.add(Arc::new(ForwardingResource::new("coap2coap", CoapForwarder::from_config(&config))))
        .unwrap();
  server.add(Arc::new(ForwardingResource::new("coap2http", HttpForwarder::from_config(&config).unwrap())))
        .unwrap();

  let addr: SocketAddr = "0.0.0.0:5685".parse().unwrap();
  server.add_endpoint(Arc::new(UdpEndpoint::new(addr)));
  server.start().unwrap();
  log::info!("proxy listening on {}", addr);

  loop {
    std::thread::park();
  }
}
