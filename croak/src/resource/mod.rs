use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::req::Method;
use crate::resp::code;
use crate::server::CoapExchange;

mod attributes;

pub use attributes::Attributes;

/// Errors encounterable mutating the resource tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// No resource lives at this path
  #[error("no resource at path {0:?}")]
  PathNotFound(String),
  /// A sibling already has this name
  #[error("a sibling is already named {0:?}")]
  NameTaken(String),
  /// Resource names must be non-empty and must not contain `/`
  #[error("{0:?} is not a valid resource name")]
  InvalidName(String),
  /// The resource was removed from the tree
  #[error("resource was removed")]
  Removed,
}

/// Handle to a node of a [`ResourceTree`].
///
/// Handles are invalidated when their node is removed;
/// a slot reused by a later node will not answer to an old handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
  index: usize,
  generation: u64,
}

/// Something that lives in the resource tree and handles requests.
///
/// Override the `handle_<method>` functions for the methods the resource supports;
/// everything else is answered with `4.05 Method Not Allowed`.
pub trait Resource: Send + Sync + Debug {
  /// Path segment of this resource; unique among its siblings
  fn name(&self) -> &str;

  /// Attributes to advertise in discovery, copied into the tree on insertion
  fn attributes(&self) -> Attributes {
    Attributes::default()
  }

  /// Whether clients may register observe relations, copied into the tree on insertion
  fn observable(&self) -> bool {
    false
  }

  /// Whether the resource is listed by discovery
  fn visible(&self) -> bool {
    true
  }

  /// Handle a request, dispatching on its method by default
  fn handle_request(&self, ex: &mut CoapExchange) {
    let method = ex.request().data().method();
    match method {
      | Method::GET => self.handle_get(ex),
      | Method::POST => self.handle_post(ex),
      | Method::PUT => self.handle_put(ex),
      | Method::DELETE => self.handle_delete(ex),
      | Method::FETCH => self.handle_fetch(ex),
      | Method::PATCH => self.handle_patch(ex),
      | Method::IPATCH => self.handle_ipatch(ex),
      | _ => method_not_allowed(ex),
    }
  }

  /// Handle a GET request
  fn handle_get(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle a POST request
  fn handle_post(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle a PUT request
  fn handle_put(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle a DELETE request
  fn handle_delete(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle a FETCH request
  fn handle_fetch(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle a PATCH request
  fn handle_patch(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }

  /// Handle an iPATCH request
  fn handle_ipatch(&self, ex: &mut CoapExchange) {
    method_not_allowed(ex)
  }
}

fn method_not_allowed(ex: &mut CoapExchange) {
  ex.respond(code::METHOD_NOT_ALLOWED).ok();
}

/// The root of every tree; answers GET with a short greeting
#[derive(Debug, Clone, Copy, Default)]
pub struct Root;

impl Resource for Root {
  fn name(&self) -> &str {
    ""
  }

  fn visible(&self) -> bool {
    false
  }

  fn handle_get(&self, ex: &mut CoapExchange) {
    ex.respond_payload(code::CONTENT, "croak").ok();
  }
}

/// A resource that only exists to give its children a path prefix
#[derive(Debug, Clone)]
pub struct Container {
  name: String,
  visible: bool,
}

impl Container {
  /// Create a visible container
  pub fn new(name: impl ToString) -> Self {
    Self { name: name.to_string(),
           visible: true }
  }

  /// Create a container discovery won't list
  pub fn hidden(name: impl ToString) -> Self {
    Self { name: name.to_string(),
           visible: false }
  }
}

impl Resource for Container {
  fn name(&self) -> &str {
    &self.name
  }

  fn visible(&self) -> bool {
    self.visible
  }
}

/// The result of a successful lookup
#[derive(Debug, Clone)]
pub struct Found {
  /// Where the resource lives in the tree
  pub id: ResourceId,
  /// The resource's request handler
  pub handler: Arc<dyn Resource>,
}

/// Snapshot of one node, yielded by [`ResourceTree::walk`]
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
  /// The node
  pub id: ResourceId,
  /// Absolute path, e.g. `/sensors/temp`
  pub path: String,
  /// Discovery attributes
  pub attributes: Attributes,
  /// Observable flag
  pub observable: bool,
  /// Whether discovery lists this node
  pub visible: bool,
}

#[derive(Debug)]
struct Node {
  name: String,
  handler: Arc<dyn Resource>,
  parent: Option<ResourceId>,
  children: BTreeMap<String, ResourceId>,
  attributes: Attributes,
  observable: bool,
}

#[derive(Debug)]
struct Slot {
  generation: u64,
  node: Option<Node>,
}

#[derive(Debug)]
struct Arena {
  slots: Vec<Slot>,
  free: Vec<usize>,
}

impl Arena {
  fn get(&self, id: ResourceId) -> Option<&Node> {
    self.slots
        .get(id.index)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_ref())
  }

  fn get_mut(&mut self, id: ResourceId) -> Option<&mut Node> {
    self.slots
        .get_mut(id.index)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_mut())
  }

  fn insert(&mut self, node: Node) -> ResourceId {
    match self.free.pop() {
      | Some(index) => {
        let slot = &mut self.slots[index];
        slot.node = Some(node);
        ResourceId { index,
                     generation: slot.generation }
      },
      | None => {
        self.slots.push(Slot { generation: 0,
                               node: Some(node) });
        ResourceId { index: self.slots.len() - 1,
                     generation: 0 }
      },
    }
  }

  /// Free a node and all of its descendants, yielding how many were freed
  fn release(&mut self, id: ResourceId) -> usize {
    let node = match self.slots.get_mut(id.index) {
      | Some(slot) if slot.generation == id.generation => {
        slot.generation += 1;
        slot.node.take()
      },
      | _ => None,
    };

    match node {
      | Some(node) => {
        self.free.push(id.index);
        1 + node.children
                .values()
                .map(|child| self.release(*child))
                .sum::<usize>()
      },
      | None => 0,
    }
  }

  fn path_of(&self, id: ResourceId) -> Option<String> {
    let mut segments = Vec::new();
    let mut cursor = self.get(id)?;
    while let Some(parent) = cursor.parent {
      segments.push(cursor.name.as_str());
      cursor = self.get(parent)?;
    }

    segments.reverse();
    Some(format!("/{}", segments.join("/")))
  }

  fn walk(&self, id: ResourceId, out: &mut Vec<Entry>) {
    if let Some(node) = self.get(id) {
      if let Some(path) = self.path_of(id) {
        out.push(Entry { id,
                         path,
                         attributes: node.attributes.clone(),
                         observable: node.observable,
                         visible: node.handler.visible() });
      }
      node.children.values().for_each(|child| self.walk(*child, out));
    }
  }
}

/// A hierarchical namespace of [`Resource`]s.
///
/// Nodes live in an arena; parents are referred to by [`ResourceId`].
/// All mutation and traversal goes through one lock, so a traversal
/// never sees a partially linked subtree.
///
/// ```
/// use std::sync::Arc;
///
/// use croak::resource::{Container, ResourceTree};
///
/// let tree = ResourceTree::new();
/// let sensors = tree.add(Arc::new(Container::new("sensors"))).unwrap();
/// let temp = tree.add_at("/sensors", Arc::new(Container::new("temp")))
///                .unwrap();
///
/// assert_eq!(tree.find_resource("sensors/temp").map(|f| f.id), Some(temp));
/// assert_eq!(tree.parent(temp), Some(sensors));
///
/// assert!(tree.remove(sensors));
/// assert!(tree.find_resource("/sensors/temp").is_none());
/// ```
#[derive(Debug)]
pub struct ResourceTree {
  root: ResourceId,
  arena: RwLock<Arena>,
}

impl Default for ResourceTree {
  fn default() -> Self {
    Self::new()
  }
}

impl ResourceTree {
  /// Create a tree containing only a [`Root`]
  pub fn new() -> Self {
    Self::with_root(Arc::new(Root))
  }

  /// Create a tree with a custom root resource
  pub fn with_root(root: Arc<dyn Resource>) -> Self {
    let mut arena = Arena { slots: Vec::new(),
                            free: Vec::new() };
    let root = arena.insert(Node { name: String::new(),
                                   attributes: root.attributes(),
                                   observable: root.observable(),
                                   handler: root,
                                   parent: None,
                                   children: BTreeMap::new() });
    Self { root,
           arena: RwLock::new(arena) }
  }

  fn read(&self) -> RwLockReadGuard<'_, Arena> {
    self.arena.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Arena> {
    self.arena.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// The root node
  pub fn root(&self) -> ResourceId {
    self.root
  }

  /// Add a resource directly beneath the root
  pub fn add(&self, resource: Arc<dyn Resource>) -> Result<ResourceId, Error> {
    self.add_child(self.root, resource)
  }

  /// Add a resource beneath `parent`
  pub fn add_child(&self,
                   parent: ResourceId,
                   resource: Arc<dyn Resource>)
                   -> Result<ResourceId, Error> {
    let name = resource.name().to_string();
    if name.is_empty() || name.contains('/') {
      return Err(Error::InvalidName(name));
    }

    let mut arena = self.write();
    match arena.get(parent) {
      | None => return Err(Error::Removed),
      | Some(node) if node.children.contains_key(&name) => return Err(Error::NameTaken(name)),
      | Some(_) => (),
    }

    let id = arena.insert(Node { name: name.clone(),
                                 attributes: resource.attributes(),
                                 observable: resource.observable(),
                                 handler: resource,
                                 parent: Some(parent),
                                 children: BTreeMap::new() });

    if let Some(node) = arena.get_mut(parent) {
      node.children.insert(name, id);
    }

    log::debug!(target: "croak", "added resource {}", arena.path_of(id).unwrap_or_default());
    Ok(id)
  }

  /// Add a resource beneath the resource at `path`
  pub fn add_at(&self, path: &str, resource: Arc<dyn Resource>) -> Result<ResourceId, Error> {
    let parent = self.find_resource(path)
                     .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
    self.add_child(parent.id, resource)
  }

  /// Detach a resource and all of its descendants.
  ///
  /// Yields `false` if the resource is the root or was already removed.
  pub fn remove(&self, id: ResourceId) -> bool {
    if id == self.root {
      return false;
    }

    let mut arena = self.write();
    let (name, parent) = match arena.get(id) {
      | Some(Node { name,
                    parent: Some(parent),
                    .. }) => (name.clone(), *parent),
      | _ => return false,
    };

    if let Some(node) = arena.get_mut(parent) {
      node.children.remove(&name);
    }

    let released = arena.release(id);
    log::debug!(target: "croak", "removed resource {:?} and {} descendants", name, released.saturating_sub(1));
    true
  }

  /// Resolve a `/`-delimited path from the root; empty segments are skipped
  pub fn find_resource(&self, path: &str) -> Option<Found> {
    self.find_segments(path.split('/'))
  }

  /// Resolve a sequence of path segments from the root; empty segments are skipped
  pub fn find_segments<'a, I>(&self, segments: I) -> Option<Found>
    where I: IntoIterator<Item = &'a str>
  {
    let arena = self.read();
    let id = segments.into_iter()
                     .filter(|seg| !seg.is_empty())
                     .try_fold(self.root, |id, seg| {
                       arena.get(id).and_then(|node| node.children.get(seg)).copied()
                     })?;

    arena.get(id).map(|node| Found { id,
                                     handler: node.handler.clone() })
  }

  /// Child of `id` named `name`
  pub fn get_child(&self, id: ResourceId, name: &str) -> Option<ResourceId> {
    self.read()
        .get(id)
        .and_then(|node| node.children.get(name))
        .copied()
  }

  /// Names and handles of the children of `id`, sorted by name
  pub fn children(&self, id: ResourceId) -> Vec<(String, ResourceId)> {
    self.read()
        .get(id)
        .map(|node| {
          node.children
              .iter()
              .map(|(name, id)| (name.clone(), *id))
              .collect()
        })
        .unwrap_or_default()
  }

  /// Parent of `id`; `None` for the root and removed resources
  pub fn parent(&self, id: ResourceId) -> Option<ResourceId> {
    self.read().get(id).and_then(|node| node.parent)
  }

  /// Absolute path of `id`; the root is `/`
  pub fn path_of(&self, id: ResourceId) -> Option<String> {
    self.read().path_of(id)
  }

  /// Has `id` been removed?
  pub fn contains(&self, id: ResourceId) -> bool {
    self.read().get(id).is_some()
  }

  /// Request handler of `id`
  pub fn handler(&self, id: ResourceId) -> Option<Arc<dyn Resource>> {
    self.read().get(id).map(|node| node.handler.clone())
  }

  /// Discovery attributes of `id`
  pub fn attributes(&self, id: ResourceId) -> Option<Attributes> {
    self.read().get(id).map(|node| node.attributes.clone())
  }

  /// Replace the discovery attributes of `id`
  pub fn set_attributes(&self, id: ResourceId, attributes: Attributes) -> Result<(), Error> {
    self.write()
        .get_mut(id)
        .map(|node| node.attributes = attributes)
        .ok_or(Error::Removed)
  }

  /// Whether `id` accepts observe relations
  pub fn is_observable(&self, id: ResourceId) -> bool {
    self.read().get(id).map(|node| node.observable).unwrap_or(false)
  }

  /// Change whether `id` accepts observe relations
  pub fn set_observable(&self, id: ResourceId, observable: bool) -> Result<(), Error> {
    self.write()
        .get_mut(id)
        .map(|node| node.observable = observable)
        .ok_or(Error::Removed)
  }

  /// Snapshot every node but the root, pre-order, siblings sorted by name
  pub fn walk(&self) -> Vec<Entry> {
    let arena = self.read();
    let mut out = Vec::new();
    if let Some(root) = arena.get(self.root) {
      root.children.values().for_each(|child| arena.walk(*child, &mut out));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;

  fn leaf(name: &str) -> Arc<dyn Resource> {
    Arc::new(Container::new(name))
  }

  #[test]
  fn add_then_find_yields_same_resource() {
    let tree = ResourceTree::new();
    let a = tree.add(leaf("a")).unwrap();
    let b = tree.add_child(a, leaf("b")).unwrap();

    let found = tree.find_resource("/a/b").unwrap();
    assert_eq!(found.id, b);
    assert_eq!(found.handler.name(), "b");
    assert_eq!(tree.find_resource("a//b/").map(|f| f.id), Some(b));
    assert_eq!(tree.find_resource("").map(|f| f.id), Some(tree.root()));
    assert_eq!(tree.get_child(a, "b"), Some(b));
    assert_eq!(tree.path_of(b).as_deref(), Some("/a/b"));
  }

  #[test]
  fn lookup_is_exact_per_segment() {
    let tree = ResourceTree::new();
    tree.add(leaf("abc")).unwrap();

    assert!(tree.find_resource("ab").is_none());
    assert!(tree.find_resource("abcd").is_none());
    assert!(tree.find_resource("abc/d").is_none());
  }

  #[test]
  fn remove_detaches_descendants() {
    let tree = ResourceTree::new();
    let a = tree.add(leaf("a")).unwrap();
    let b = tree.add_child(a, leaf("b")).unwrap();

    assert!(tree.remove(a));
    assert!(!tree.remove(a));
    assert!(tree.find_resource("a").is_none());
    assert!(tree.find_resource("a/b").is_none());
    assert!(!tree.contains(b));
    assert_eq!(tree.parent(b), None);
    assert!(!tree.remove(tree.root()));
  }

  #[test]
  fn stale_ids_dont_resolve_to_reused_slots() {
    let tree = ResourceTree::new();
    let a = tree.add(leaf("a")).unwrap();
    tree.remove(a);
    let c = tree.add(leaf("c")).unwrap();

    assert_ne!(a, c);
    assert!(tree.handler(a).is_none());
    assert_eq!(tree.add_child(a, leaf("x")).unwrap_err(), Error::Removed);
  }

  #[test]
  fn sibling_name_collision_is_rejected() {
    let tree = ResourceTree::new();
    let first = tree.add(leaf("a")).unwrap();

    assert_eq!(tree.add(leaf("a")).unwrap_err(),
               Error::NameTaken("a".to_string()));
    assert_eq!(tree.find_resource("a").map(|f| f.id), Some(first));
  }

  #[test]
  fn invalid_names_are_rejected() {
    let tree = ResourceTree::new();
    assert!(matches!(tree.add(leaf("")), Err(Error::InvalidName(_))));
    assert!(matches!(tree.add(leaf("a/b")), Err(Error::InvalidName(_))));
  }

  #[test]
  fn add_at_missing_path_fails() {
    let tree = ResourceTree::new();
    assert_eq!(tree.add_at("nope", leaf("a")).unwrap_err(),
               Error::PathNotFound("nope".to_string()));
  }

  #[test]
  fn walk_is_preorder_sorted_by_name() {
    let tree = ResourceTree::new();
    let b = tree.add(leaf("b")).unwrap();
    tree.add(leaf("a")).unwrap();
    tree.add_child(b, leaf("z")).unwrap();
    tree.add_child(b, leaf("c")).unwrap();

    let paths = tree.walk().into_iter().map(|e| e.path).collect::<Vec<_>>();
    assert_eq!(paths, vec!["/a", "/b", "/b/c", "/b/z"]);
  }

  #[test]
  fn concurrent_readers_never_see_partial_subtrees() {
    let tree = Arc::new(ResourceTree::new());
    let writer = {
      let tree = tree.clone();
      thread::spawn(move || {
        (0..200).for_each(|_| {
                  let a = tree.add(leaf("a")).unwrap();
                  tree.add_child(a, leaf("b")).unwrap();
                  tree.remove(a);
                })
      })
    };

    (0..200).for_each(|_| {
              tree.walk().iter().for_each(|e| {
                                  assert!(tree.path_of(e.id).map(|p| p == e.path).unwrap_or(true))
                                });
            });

    writer.join().unwrap();
    assert!(tree.walk().is_empty());
  }
}
