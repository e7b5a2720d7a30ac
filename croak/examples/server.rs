use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use croak::config::Config;
use croak::msg::ContentFormat;
use croak::resource::{Attributes, Resource};
use croak::resp::code;
use croak::server::{CoapExchange, CoapServer};

#[derive(Debug)]
struct Hello;

impl Resource for Hello {
  fn name(&self) -> &str {
    "hello"
  }

  fn attributes(&self) -> Attributes {
    Attributes::default().title("Greeting")
                         .content_type(ContentFormat::Text)
  }

  fn handle_get(&self, ex: &mut CoapExchange) {
    let who = ex.request()
                .data()
                .msg()
                .query()
                .find_map(|q| q.strip_prefix("name="))
                .unwrap_or("world")
                .to_string();
    ex.respond_payload(code::CONTENT, format!("hello, {}!", who)).ok();
  }
}

#[derive(Debug)]
struct Time;

impl Resource for Time {
  fn name(&self) -> &str {
    "time"
  }

  fn observable(&self) -> bool {
    true
  }

  fn attributes(&self) -> Attributes {
    Attributes::default().resource_type("clock")
                         .content_type(ContentFormat::Json)
  }

  fn handle_get(&self, ex: &mut CoapExchange) {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)
                               .map(|d| d.as_millis() as u64)
                               .unwrap_or_default();
    ex.set_max_age(1);
    ex.respond_json(code::CONTENT, &serde_json::json!({ "millis": now }))
      .ok();
  }
}

#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Resource for Counter {
  fn name(&self) -> &str {
    "counter"
  }

  fn handle_get(&self, ex: &mut CoapExchange) {
    let n = self.0.load(Ordering::SeqCst);
    ex.respond_payload(code::CONTENT, n.to_string()).ok();
  }

  fn handle_post(&self, ex: &mut CoapExchange) {
    let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
    ex.respond_payload(code::CHANGED, n.to_string()).ok();
  }

  fn handle_delete(&self, ex: &mut CoapExchange) {
    self.0.store(0, Ordering::SeqCst);
    ex.respond(code::DELETED).ok();
  }
}

pub fn main() {
  std::env::set_var("RUST_LOG", "info,croak=trace");
  simple_logger::init_with_env().unwrap();

  let server = CoapServer::new(Config::default());
  server.add(Arc::new(Hello)).unwrap();
  let time = server.add(Arc::new(Time)).unwrap();
  server.add(Arc::new(Counter::default())).unwrap();

  server.start().unwrap();
  log::info!("serving on {:?}",
             server.endpoints()
                   .iter()
                   .map(|ep| ep.local_addr())
                   .collect::<Vec<_>>());

  loop {
    std::thread::sleep(Duration::from_secs(5));
    let (seq, observers) = server.observers().changed(time);
    log::info!("/time changed (seq {}), {} observers", seq, observers.len());
  }
}
