use super::list::{Linked, Links, List};
use super::{impl_evicting_cache, PolicyKind};
use crate::error::{self, BuildError};
use crate::listener::{EvictionListener, EvictionReason, Notifier};
use crate::metrics::{Metrics, MetricsSnapshot};

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use generational_arena::{Arena, Index};
use parking_lot::RwLock;

struct Node<K, V> {
  key: K,
  value: V,
  links: Links,
}

impl<K, V> Linked for Node<K, V> {
  fn links(&self) -> &Links {
    &self.links
  }
  fn links_mut(&mut self) -> &mut Links {
    &mut self.links
  }
}

struct MruState<K, V, H> {
  capacity: usize,
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  // Front is the most recently used entry, which is also the next victim.
  order: List,
}

impl<K, V, H> MruState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn find<Q>(&self, key: &Q) -> Option<Index>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.index.get(key).copied()
  }

  fn pop_most_recent(&mut self) -> Option<(K, V)> {
    let index = self.order.pop_front(&mut self.nodes)?;
    let node = self.nodes.remove(index)?;
    self.index.remove(&node.key);
    Some((node.key, node.value))
  }
}

/// Point-in-time statistics for an [`MruCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MruStats {
  pub size: usize,
  pub capacity: usize,
}

/// A bounded cache that evicts the *most* recently used entry.
///
/// Useful for cyclic or scan-heavy access where the entry just touched is
/// the one least likely to be needed again soon.
///
/// # Examples
///
/// ```
/// use fibre_evict::MruCache;
///
/// let cache = MruCache::new(2);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.get(&"a");
/// cache.put("c", 3);
///
/// assert!(!cache.contains(&"a"));
/// assert!(cache.contains(&"b"));
/// ```
pub struct MruCache<K, V, H = ahash::RandomState> {
  state: RwLock<MruState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for MruCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("MruCache")
      .field("len", &state.order.len())
      .field("capacity", &state.capacity)
      .finish_non_exhaustive()
  }
}

impl<K, V> MruCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// # Panics
  ///
  /// Panics if `capacity` is zero.
  #[track_caller]
  pub fn new(capacity: usize) -> Self {
    error::fatal(Self::try_new(capacity))
  }

  pub fn try_new(capacity: usize) -> Result<Self, BuildError> {
    Self::from_parts(capacity, ahash::RandomState::new(), None)
  }

  #[track_caller]
  pub fn with_eviction_listener<L>(capacity: usize, listener: L) -> Self
  where
    L: EvictionListener<K, V> + 'static,
  {
    error::fatal(Self::from_parts(
      capacity,
      ahash::RandomState::new(),
      Some(Arc::new(listener)),
    ))
  }
}

impl<K, V, H> MruCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  #[track_caller]
  pub fn with_hasher(capacity: usize, hasher: H) -> Self {
    error::fatal(Self::from_parts(capacity, hasher, None))
  }

  pub(crate) fn from_parts(
    capacity: usize,
    hasher: H,
    listener: Option<Arc<dyn EvictionListener<K, V>>>,
  ) -> Result<Self, BuildError> {
    error::check_capacity(capacity)?;
    Ok(Self {
      state: RwLock::new(MruState {
        capacity,
        nodes: Arena::with_capacity(capacity),
        index: HashMap::with_hasher(hasher),
        order: List::new(),
      }),
      notifier: Notifier::new(listener),
      metrics: Metrics::new(),
    })
  }

  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let found = state.find(key).map(|index| {
      state.order.move_to_front(&mut state.nodes, index);
      state.nodes[index].value.clone()
    });
    self.metrics.record_lookup(found.is_some());
    found
  }

  /// Inserts or updates `key`. When a new key arrives at a full cache the
  /// most recently used entry is evicted first.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut guard = self.state.write();
    let state = &mut *guard;

    if let Some(index) = state.find(&key) {
      state.nodes[index].value = value;
      state.order.move_to_front(&mut state.nodes, index);
      self.metrics.record_write(true);
      return false;
    }

    let mut evicted = false;
    if state.order.len() >= state.capacity {
      if let Some((old_key, old_value)) = state.pop_most_recent() {
        evicted = true;
        self.metrics.record_evictions(1);
        self.notifier.notify(old_key, old_value, EvictionReason::Capacity);
      }
    }

    let index = state.nodes.insert(Node {
      key: key.clone(),
      value,
      links: Links::default(),
    });
    state.order.push_front(&mut state.nodes, index);
    state.index.insert(key, index);
    self.metrics.record_write(false);
    evicted
  }

  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let index = state.index.remove(key)?;
    state.order.unlink(&mut state.nodes, index);
    let node = state.nodes.remove(index)?;
    self.metrics.record_removal();
    self.notifier.notify(node.key, node.value.clone(), EvictionReason::Invalidated);
    Some(node.value)
  }

  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.state.read().index.contains_key(key)
  }

  pub fn peek<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let state = self.state.read();
    state.find(key).map(|index| state.nodes[index].value.clone())
  }

  pub fn len(&self) -> usize {
    self.state.read().order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.state.read().capacity
  }

  pub fn clear(&self) {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let mut drained = Vec::with_capacity(state.order.len());
    while let Some(index) = state.order.pop_front(&mut state.nodes) {
      if let Some(node) = state.nodes.remove(index) {
        drained.push((node.key, node.value));
      }
    }
    state.index.clear();

    tracing::debug!(cleared = drained.len(), "mru cache cleared");
    self.metrics.record_cleared(drained.len());
    self.notifier.notify_all(drained, EvictionReason::Cleared);
  }

  /// Keys from most to least recently used.
  pub fn keys(&self) -> Vec<K> {
    let state = self.state.read();
    state
      .order
      .iter(&state.nodes)
      .map(|(_, node)| node.key.clone())
      .collect()
  }

  pub fn values(&self) -> Vec<V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .order
      .iter(&state.nodes)
      .map(|(_, node)| node.value.clone())
      .collect()
  }

  pub fn items(&self) -> ahash::HashMap<K, V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .order
      .iter(&state.nodes)
      .map(|(_, node)| (node.key.clone(), node.value.clone()))
      .collect()
  }

  /// Shrinking evicts from the most recent end.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` is zero.
  #[track_caller]
  pub fn resize(&self, capacity: usize) {
    error::fatal(self.try_resize(capacity))
  }

  pub fn try_resize(&self, capacity: usize) -> Result<(), BuildError> {
    error::check_capacity(capacity)?;
    let mut state = self.state.write();
    state.capacity = capacity;

    let mut evicted = 0;
    while state.order.len() > capacity {
      let Some((key, value)) = state.pop_most_recent() else {
        break;
      };
      evicted += 1;
      self.notifier.notify(key, value, EvictionReason::Capacity);
    }
    self.metrics.record_evictions(evicted);
    tracing::debug!(capacity, evicted, "mru cache resized");
    Ok(())
  }

  pub fn stats(&self) -> MruStats {
    let state = self.state.read();
    MruStats {
      size: state.order.len(),
      capacity: state.capacity,
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

impl_evicting_cache!(MruCache, PolicyKind::Mru);

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;

  #[test]
  fn evicts_the_entry_just_touched() {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    let cache = MruCache::with_eviction_listener(
      2,
      move |k: &'static str, v: i32, r: EvictionReason| sink.lock().push((k, v, r)),
    );
    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.get(&"a"), Some(1));
    assert!(cache.put("c", 3));

    assert_eq!(*evicted.lock(), vec![("a", 1, EvictionReason::Capacity)]);
    assert_eq!(cache.keys(), vec!["c", "b"]);
  }

  #[test]
  fn update_moves_to_front_without_evicting() {
    let cache = MruCache::new(2);
    cache.put(1, "one");
    cache.put(2, "two");
    assert!(!cache.put(1, "uno"));
    assert_eq!(cache.keys(), vec![1, 2]);
    assert_eq!(cache.peek(&1), Some("uno"));
  }

  #[test]
  fn peek_does_not_reorder() {
    let cache = MruCache::new(3);
    cache.put(1, ());
    cache.put(2, ());
    cache.peek(&1);
    assert!(cache.contains(&1));
    assert_eq!(cache.keys(), vec![2, 1]);
  }

  #[test]
  fn resize_drops_most_recent_first() {
    let cache = MruCache::new(4);
    for i in 0..4 {
      cache.put(i, i * 10);
    }
    cache.resize(2);
    assert_eq!(cache.keys(), vec![1, 0]);
    assert_eq!(cache.stats(), MruStats { size: 2, capacity: 2 });
  }

  #[test]
  fn remove_and_clear() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let cache = MruCache::with_eviction_listener(
      3,
      move |k: &'static str, v: i32, r: EvictionReason| sink.lock().push((k, v, r)),
    );
    cache.put("x", 1);
    cache.put("y", 2);
    assert_eq!(cache.remove(&"x"), Some(1));
    assert_eq!(cache.remove(&"x"), None);
    assert_eq!(cache.values(), vec![2]);
    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.keys().is_empty());
    assert_eq!(
      *events.lock(),
      vec![
        ("x", 1, EvictionReason::Invalidated),
        ("y", 2, EvictionReason::Cleared)
      ]
    );
  }
}
