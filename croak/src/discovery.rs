use croak_msg::ContentFormat;
use serde::Serialize;

use crate::resource::{Attributes, Entry, Resource};
use crate::resp::code;
use crate::server::CoapExchange;

/// One link of a discovery document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
  /// Absolute path of the resource
  pub href: String,
  /// The resource's attributes
  #[serde(flatten)]
  pub attributes: Attributes,
  /// Present (and `true`) on observable resources
  #[serde(skip_serializing_if = "Option::is_none")]
  pub obs: Option<bool>,
}

impl From<Entry> for Link {
  fn from(e: Entry) -> Self {
    Link { href: e.path,
           attributes: e.attributes,
           obs: Some(true).filter(|_| e.observable) }
  }
}

/// A single `key=value` (or bare `key`) discovery query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Filter<'a> {
  key: &'a str,
  value: Option<&'a str>,
}

impl<'a> Filter<'a> {
  fn parse(param: &'a str) -> Self {
    match param.split_once('=') {
      | Some((key, value)) => Filter { key,
                                       value: Some(value.trim_matches('"')) },
      | None => Filter { key: param,
                         value: None },
    }
  }

  /// `*` at the end of a value matches any suffix
  fn value_matches(pattern: &str, actual: &str) -> bool {
    match pattern.strip_suffix('*') {
      | Some(prefix) => actual.starts_with(prefix),
      | None => pattern == actual,
    }
  }

  fn any_matches<S: AsRef<str>>(pattern: Option<&str>, actual: impl IntoIterator<Item = S>) -> bool {
    let mut actual = actual.into_iter();
    match pattern {
      | Some(pattern) => actual.any(|a| Self::value_matches(pattern, a.as_ref())),
      | None => actual.next().is_some(),
    }
  }

  fn matches(&self, link: &Link) -> bool {
    let attrs = &link.attributes;
    match self.key {
      | "href" => Self::any_matches(self.value, [link.href.as_str()]),
      | "rt" => Self::any_matches(self.value, &attrs.resource_types),
      | "if" => Self::any_matches(self.value, &attrs.interfaces),
      | "title" => Self::any_matches(self.value, attrs.title.as_deref()),
      | "ct" => {
        Self::any_matches(self.value,
                          attrs.content_types.iter().map(|ct| ct.to_string()))
      },
      | "sz" => {
        Self::any_matches(self.value,
                          attrs.max_size_hint.iter().map(|sz| sz.to_string()))
      },
      | "obs" => link.obs.unwrap_or(false),
      | _ => true,
    }
  }
}

/// Links of every visible resource matching all query parameters
pub fn links<'a>(entries: Vec<Entry>, query: impl IntoIterator<Item = &'a str>) -> Vec<Link> {
  let filters = query.into_iter().map(Filter::parse).collect::<Vec<_>>();
  entries.into_iter()
         .filter(|e| e.visible)
         .map(Link::from)
         .filter(|link| filters.iter().all(|f| f.matches(link)))
         .collect()
}

fn quoted(values: &[String]) -> String {
  format!("\"{}\"", values.join(" "))
}

/// Serialize links as `application/link-format` (RFC6690)
///
/// ```
/// use croak::discovery::{link_format, Link};
/// use croak::resource::Attributes;
///
/// let links = vec![Link { href: "/temp".into(),
///                         attributes: Attributes::default().title("Temperature")
///                                                          .resource_type("temp-c"),
///                         obs: Some(true) },
///                  Link { href: "/led".into(),
///                         attributes: Attributes::default(),
///                         obs: None }];
///
/// assert_eq!(link_format(&links),
///            r#"</temp>;title="Temperature";rt="temp-c";obs,</led>"#);
/// ```
pub fn link_format(links: &[Link]) -> String {
  links.iter()
       .map(|link| {
         let attrs = &link.attributes;
         let mut out = format!("<{}>", link.href);

         if let Some(title) = attrs.title.as_ref() {
           out.push_str(&format!(";title=\"{}\"", title));
         }
         if !attrs.resource_types.is_empty() {
           out.push_str(&format!(";rt={}", quoted(&attrs.resource_types)));
         }
         if !attrs.interfaces.is_empty() {
           out.push_str(&format!(";if={}", quoted(&attrs.interfaces)));
         }
         if let Some(sz) = attrs.max_size_hint {
           out.push_str(&format!(";sz={}", sz));
         }
         match attrs.content_types.as_slice() {
           | [] => (),
           | [ct] => out.push_str(&format!(";ct={}", ct)),
           | cts => {
             let cts = cts.iter().map(|ct| ct.to_string()).collect::<Vec<_>>();
             out.push_str(&format!(";ct={}", quoted(&cts)));
           },
         }
         if link.obs.unwrap_or(false) {
           out.push_str(";obs");
         }

         out
       })
       .collect::<Vec<_>>()
       .join(",")
}

/// `/.well-known/core`; lists the resources of the tree it lives in (RFC6690 section 4)
///
/// The representation follows the request's Accept option:
/// link-format (the default), CBOR or JSON. Anything else is answered with `4.02 Bad Option`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WellKnownCore;

impl WellKnownCore {
  /// Path segments this resource is registered at
  pub const PATH: [&'static str; 2] = [".well-known", "core"];
}

impl Resource for WellKnownCore {
  fn name(&self) -> &str {
    Self::PATH[1]
  }

  fn handle_get(&self, ex: &mut CoapExchange) {
    let msg = ex.request().data().msg();
    let links = links(ex.resources().walk(), msg.query());
    let accept = msg.accept();

    log::trace!(target: "croak", "discovery matched {} links, accept {:?}", links.len(), accept);

    let responded = match accept {
      | None | Some(ContentFormat::LinkFormat) => {
        ex.respond_content(code::CONTENT, link_format(&links), ContentFormat::LinkFormat)
      },
      | Some(ContentFormat::Json) => ex.respond_json(code::CONTENT, &links),
      | Some(ContentFormat::Cbor) => {
        let mut cbor = Vec::new();
        match ciborium::ser::into_writer(&links, &mut cbor) {
          | Ok(()) => ex.respond_content(code::CONTENT, cbor, ContentFormat::Cbor),
          | Err(e) => {
            log::error!(target: "croak", "failed to serialize discovery document: {}", e);
            ex.respond(code::INTERNAL_SERVER_ERROR)
          },
        }
      },
      | Some(other) => {
        log::debug!(target: "croak", "discovery can't produce {:?}", other);
        ex.respond(code::BAD_OPTION)
      },
    };

    responded.ok();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use croak_msg::{no_repeat, Id, Message, Type};

  use super::*;
  use crate::config::Config;
  use crate::net::{Addrd, NoOutbox};
  use crate::resource::{Container, ResourceTree};
  use crate::resp::Resp;
  use crate::server::CoapServer;
  use crate::test;

  fn tree() -> ResourceTree {
    let tree = ResourceTree::new();
    let sensors = tree.add(Arc::new(Container::new("sensors"))).unwrap();
    let temp = tree.add_child(sensors, Arc::new(Container::new("temp")))
                   .unwrap();
    let light = tree.add_child(sensors, Arc::new(Container::new("light")))
                    .unwrap();
    tree.add(Arc::new(Container::hidden("secret"))).unwrap();

    tree.set_attributes(temp,
                        Attributes::default().title("Temperature")
                                             .resource_type("temperature-c")
                                             .interface("sensor")
                                             .content_type(ContentFormat::Text))
        .unwrap();
    tree.set_observable(temp, true).unwrap();
    tree.set_attributes(light,
                        Attributes::default().resource_type("light-lux")
                                             .interface("sensor"))
        .unwrap();
    tree
  }

  fn hrefs(query: &[&str]) -> Vec<String> {
    links(tree().walk(), query.iter().copied()).into_iter()
                                              .map(|l| l.href)
                                              .collect()
  }

  #[test]
  fn hidden_resources_are_not_listed() {
    assert_eq!(hrefs(&[]),
               vec!["/sensors", "/sensors/light", "/sensors/temp"]);
  }

  #[test]
  fn filters() {
    assert_eq!(hrefs(&["rt=temperature-c"]), vec!["/sensors/temp"]);
    assert_eq!(hrefs(&["rt=light*"]), vec!["/sensors/light"]);
    assert_eq!(hrefs(&["if=sensor"]),
               vec!["/sensors/light", "/sensors/temp"]);
    assert_eq!(hrefs(&["href=/sensors/*"]),
               vec!["/sensors/light", "/sensors/temp"]);
    assert_eq!(hrefs(&["href=/sensors"]), vec!["/sensors"]);
    assert_eq!(hrefs(&["title=Temperature"]), vec!["/sensors/temp"]);
    assert_eq!(hrefs(&["ct=0"]), vec!["/sensors/temp"]);
    assert_eq!(hrefs(&["obs"]), vec!["/sensors/temp"]);
    assert_eq!(hrefs(&["if=sensor", "rt=light-lux"]),
               vec!["/sensors/light"]);
    assert!(hrefs(&["rt=nope"]).is_empty());
  }

  #[test]
  fn link_format_attributes() {
    let links = links(tree().walk(), ["href=/sensors/temp"]);
    assert_eq!(link_format(&links),
               r#"</sensors/temp>;title="Temperature";rt="temperature-c";if="sensor";ct=0;obs"#);
  }

  #[test]
  fn json_and_cbor_documents() {
    let links = links(tree().walk(), ["obs"]);

    let json = serde_json::to_value(&links).unwrap();
    assert_eq!(json[0]["href"], "/sensors/temp");
    assert_eq!(json[0]["rt"][0], "temperature-c");
    assert_eq!(json[0]["obs"], true);

    let mut cbor = Vec::new();
    ciborium::ser::into_writer(&links, &mut cbor).unwrap();
    let value: ciborium::Value = ciborium::de::from_reader(cbor.as_slice()).unwrap();
    assert_eq!(value.as_array().map(|a| a.len()), Some(1));
  }

  fn discover(server: &CoapServer, id: u16, accept: Option<u32>) -> Resp {
    let mut req = test::req(Type::Con, Id(id), ".well-known/core").map(Message::from);
    if let Some(accept) = accept {
      req.data_mut().set_uint(no_repeat::ACCEPT, accept);
    }

    server.deliverer()
          .deliver(req, None, &NoOutbox)
          .unwrap()
          .unwrap()
  }

  #[test]
  fn representation_follows_accept() {
    let server = CoapServer::with_tree(Config::default(), Arc::new(tree()));

    let resp = discover(&server, 1, None);
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.msg().content_format(), Some(ContentFormat::LinkFormat));
    assert!(resp.payload_string()
                .unwrap()
                .contains(r#"</sensors/temp>;title="Temperature""#));

    let resp = discover(&server, 2, Some(40));
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.msg().content_format(), Some(ContentFormat::LinkFormat));

    let resp = discover(&server, 3, Some(50));
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.msg().content_format(), Some(ContentFormat::Json));
    let json: serde_json::Value = serde_json::from_slice(resp.payload()).unwrap();
    assert!(json.as_array()
                .unwrap()
                .iter()
                .any(|link| link["href"] == "/sensors/temp"));

    let resp = discover(&server, 4, Some(60));
    assert_eq!(resp.code(), code::CONTENT);
    assert_eq!(resp.msg().content_format(), Some(ContentFormat::Cbor));
    let cbor: ciborium::Value = ciborium::de::from_reader(resp.payload()).unwrap();
    assert!(cbor.as_array().map(|a| !a.is_empty()).unwrap_or(false));
  }

  #[test]
  fn unsupported_accept_is_bad_option() {
    let server = CoapServer::with_tree(Config::default(), Arc::new(tree()));

    for (id, accept) in [(1, 0), (2, 9999)] {
      let resp = discover(&server, id, Some(accept));
      assert_eq!(resp.code(), code::BAD_OPTION);
      assert_eq!(resp.msg().content_format(), None);
      assert!(resp.payload().is_empty());
    }
  }
}
