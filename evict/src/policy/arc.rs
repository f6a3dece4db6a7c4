//! Adaptive Replacement Cache.
//!
//! ARC splits the live entries into two recency lists and keeps a shadow of
//! recently evicted keys for each:
//!
//! - `T1`: live entries seen exactly once since admission.
//! - `T2`: live entries seen at least twice.
//! - `B1`: ghosts (keys only) recently evicted from `T1`.
//! - `B2`: ghosts recently evicted from `T2`.
//!
//! The target size of `T1` is `p`. A re-insert of a key that sits in `B1`
//! means `T1` was too small, so `p` grows; a hit in `B2` shrinks it. All four
//! lists share one arena and one key index, so a key moves between lists
//! without being rehashed.

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

/// Which of the four ARC lists a node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
  T1,
  T2,
  B1,
  B2,
}

impl Segment {
  #[inline]
  fn is_ghost(self) -> bool {
    matches!(self, Segment::B1 | Segment::B2)
  }

  /// The ghost list that receives entries evicted from this list.
  #[inline]
  fn ghost(self) -> Segment {
    match self {
      Segment::T1 | Segment::B1 => Segment::B1,
      Segment::T2 | Segment::B2 => Segment::B2,
    }
  }
}

struct Node<K, V> {
  key: K,
  // `None` exactly when the node is a ghost.
  value: Option<V>,
  segment: Segment,
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

/// Step applied to `p` on a ghost hit: the size ratio of the opposite ghost
/// list to the one that was hit, never less than one.
#[inline]
fn adaptation_delta(opposite: usize, hit: usize) -> usize {
  if hit == 0 {
    1
  } else {
    (opposite / hit).max(1)
  }
}

struct ArcState<K, V, H> {
  capacity: usize,
  p: usize,
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  t1: List,
  t2: List,
  b1: List,
  b2: List,
}

impl<K, V, H> ArcState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn new(capacity: usize, hasher: H) -> Self {
    Self {
      capacity,
      p: 0,
      nodes: Arena::with_capacity(capacity),
      index: HashMap::with_hasher(hasher),
      t1: List::new(),
      t2: List::new(),
      b1: List::new(),
      b2: List::new(),
    }
  }

  #[inline]
  fn live_len(&self) -> usize {
    self.t1.len() + self.t2.len()
  }

  fn find<Q>(&self, key: &Q) -> Option<Index>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.index.get(key).copied()
  }

  fn find_live<Q>(&self, key: &Q) -> Option<Index>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self
      .find(key)
      .filter(|&index| !self.nodes[index].segment.is_ghost())
  }

  // Splits the borrow so a list can be edited against the shared arena.
  fn segment(&mut self, segment: Segment) -> (&mut List, &mut Arena<Node<K, V>>) {
    let list = match segment {
      Segment::T1 => &mut self.t1,
      Segment::T2 => &mut self.t2,
      Segment::B1 => &mut self.b1,
      Segment::B2 => &mut self.b2,
    };
    (list, &mut self.nodes)
  }

  fn unlink(&mut self, index: Index) {
    let segment = self.nodes[index].segment;
    let (list, nodes) = self.segment(segment);
    list.unlink(nodes, index);
  }

  fn push_front(&mut self, index: Index, segment: Segment) {
    self.nodes[index].segment = segment;
    let (list, nodes) = self.segment(segment);
    list.push_front(nodes, index);
  }

  // Drops an already unlinked node from the arena and the index.
  fn destroy(&mut self, index: Index) -> Option<Node<K, V>> {
    let node = self.nodes.remove(index)?;
    self.index.remove(&node.key);
    Some(node)
  }

  // A hit on a live entry: T1 entries graduate to T2, T2 entries refresh.
  fn promote(&mut self, index: Index) {
    match self.nodes[index].segment {
      Segment::T1 => {
        self.t1.unlink(&mut self.nodes, index);
        self.push_front(index, Segment::T2);
      }
      Segment::T2 => self.t2.move_to_front(&mut self.nodes, index),
      Segment::B1 | Segment::B2 => {}
    }
  }

  fn adapt(&mut self, hit: Segment) {
    let (b1, b2) = (self.b1.len(), self.b2.len());
    let before = self.p;
    match hit {
      Segment::B1 => {
        self.p = (self.p + adaptation_delta(b2, b1)).min(self.capacity);
      }
      Segment::B2 => {
        self.p = self.p.saturating_sub(adaptation_delta(b1, b2));
      }
      Segment::T1 | Segment::T2 => return,
    }
    tracing::trace!(?hit, from = before, to = self.p, "arc target adapted");
  }

  /// Evicts the least recent entry of T1 or T2 into its ghost list and
  /// returns the evicted pair.
  ///
  /// T1 is chosen when it is non-empty and larger than its target `p`, or
  /// exactly at target while handling a ghost hit; otherwise T2. If the
  /// chosen list is empty the other one gives up its tail instead.
  fn replace(&mut self, ghost_hit: bool) -> Option<(K, V)> {
    let t1 = self.t1.len();
    let prefer_t1 = t1 > 0 && (t1 > self.p || (ghost_hit && t1 == self.p));
    let source = match (prefer_t1, self.t2.is_empty()) {
      (true, _) | (false, true) => Segment::T1,
      (false, false) => Segment::T2,
    };

    let (list, nodes) = self.segment(source);
    let index = list.pop_back(nodes)?;
    self.push_front(index, source.ghost());

    let node = &mut self.nodes[index];
    let evicted = node.value.take().map(|value| (node.key.clone(), value));
    self.trim_ghosts();
    evicted
  }

  // Destroys ghosts from the back of B1 and B2 until each fits the capacity.
  fn trim_ghosts(&mut self) {
    for ghost in [Segment::B1, Segment::B2] {
      loop {
        let capacity = self.capacity;
        let (list, nodes) = self.segment(ghost);
        if list.len() <= capacity {
          break;
        }
        let Some(index) = list.pop_back(nodes) else {
          break;
        };
        self.destroy(index);
      }
    }
  }

  fn drain_live(&mut self) -> Vec<(K, V)> {
    let mut drained = Vec::with_capacity(self.live_len());
    for segment in [Segment::T2, Segment::T1] {
      loop {
        let (list, nodes) = self.segment(segment);
        let Some(index) = list.pop_front(nodes) else {
          break;
        };
        if let Some(Node {
          key,
          value: Some(value),
          ..
        }) = self.destroy(index)
        {
          drained.push((key, value));
        }
      }
    }
    drained
  }

  fn reset(&mut self) {
    self.nodes.clear();
    self.index.clear();
    self.t1.reset();
    self.t2.reset();
    self.b1.reset();
    self.b2.reset();
    self.p = 0;
  }

  fn live_iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
    self
      .t2
      .iter(&self.nodes)
      .chain(self.t1.iter(&self.nodes))
      .filter_map(|(_, node)| node.value.as_ref().map(|value| (&node.key, value)))
  }
}

/// Point-in-time statistics for an [`ArcCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArcStats {
  /// Live entries (`t1 + t2`).
  pub size: usize,
  pub capacity: usize,
  pub t1: usize,
  pub t2: usize,
  pub b1: usize,
  pub b2: usize,
  /// Current target size of `T1`.
  pub p: usize,
}

/// A bounded Adaptive Replacement Cache.
///
/// Balances recency against frequency by tuning the target size of its
/// recency list from ghost hits. Ghost keys are bookkeeping only: they are
/// invisible to `get`, `peek`, `contains`, `len` and the enumeration
/// methods.
///
/// # Examples
///
/// ```
/// use fibre_evict::ArcCache;
///
/// let cache = ArcCache::new(2);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.put("c", 3); // "a" becomes a ghost in B1
///
/// assert!(!cache.contains(&"a"));
/// cache.put("a", 10); // ghost hit: "a" comes back straight into T2
/// assert_eq!(cache.stats().p, 1);
/// assert_eq!(cache.get(&"a"), Some(10));
/// ```
pub struct ArcCache<K, V, H = ahash::RandomState> {
  state: RwLock<ArcState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for ArcCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("ArcCache")
      .field("capacity", &state.capacity)
      .field("p", &state.p)
      .field("t1", &state.t1.len())
      .field("t2", &state.t2.len())
      .field("b1", &state.b1.len())
      .field("b2", &state.b2.len())
      .field("notifier", &self.notifier)
      .finish()
  }
}

impl<K, V> ArcCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Creates a cache holding at most `capacity` live entries (and up to
  /// `capacity` ghosts in each of B1 and B2).
  ///
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

  /// # Panics
  ///
  /// Panics if `capacity` is zero.
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

impl<K, V, H> ArcCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// # Panics
  ///
  /// Panics if `capacity` is zero.
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
      state: RwLock::new(ArcState::new(capacity, hasher)),
      notifier: Notifier::new(listener),
      metrics: Metrics::new(),
    })
  }

  /// Returns the value of a live entry and promotes it to the front of T2.
  /// Ghosts count as misses.
  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let found = state.find_live(key).and_then(|index| {
      state.promote(index);
      state.nodes[index].value.clone()
    });
    self.metrics.record_lookup(found.is_some());
    found
  }

  /// Inserts or updates `key`.
  ///
  /// - A live key is updated in place and promoted; nothing is evicted.
  /// - A ghost key adapts `p`, then re-enters the cache at the front of T2.
  /// - A new key enters at the front of T1.
  ///
  /// Returns `true` iff a live entry was evicted to make room.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut guard = self.state.write();
    let state = &mut *guard;

    let existing = state.find(&key);
    if let Some(index) = existing {
      if !state.nodes[index].segment.is_ghost() {
        state.nodes[index].value = Some(value);
        state.promote(index);
        self.metrics.record_write(true);
        return false;
      }
    }

    let victim = match existing {
      Some(index) => {
        let ghost = state.nodes[index].segment;
        state.adapt(ghost);
        state.unlink(index);
        let victim = if state.live_len() >= state.capacity {
          state.replace(true)
        } else {
          None
        };
        state.nodes[index].value = Some(value);
        state.push_front(index, Segment::T2);
        victim
      }
      None => {
        let victim = if state.live_len() >= state.capacity {
          state.replace(false)
        } else {
          None
        };
        let index = state.nodes.insert(Node {
          key: key.clone(),
          value: Some(value),
          segment: Segment::T1,
          links: Links::default(),
        });
        state.index.insert(key, index);
        state.push_front(index, Segment::T1);
        victim
      }
    };
    self.metrics.record_write(false);

    match victim {
      Some((old_key, old_value)) => {
        self.metrics.record_evictions(1);
        self.notifier.notify(old_key, old_value, EvictionReason::Capacity);
        true
      }
      None => false,
    }
  }

  /// Removes `key` entirely. A ghost is forgotten as well, but only a live
  /// entry yields a value. Removals are not reported to the listener.
  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let index = state.find(key)?;
    state.unlink(index);
    let value = state.destroy(index)?.value;
    if value.is_some() {
      self.metrics.record_removal();
    }
    value
  }

  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.state.read().find_live(key).is_some()
  }

  pub fn peek<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let state = self.state.read();
    state
      .find_live(key)
      .and_then(|index| state.nodes[index].value.clone())
  }

  /// Number of live entries; ghosts are not counted.
  pub fn len(&self) -> usize {
    self.state.read().live_len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.state.read().capacity
  }

  /// Drops all live entries and ghosts and resets `p` to zero.
  pub fn clear(&self) {
    let mut guard = self.state.write();
    let state = &mut *guard;
    let drained = state.drain_live();
    state.reset();

    tracing::debug!(cleared = drained.len(), "arc cache cleared");
    self.metrics.record_cleared(drained.len());
    self.notifier.notify_all(drained, EvictionReason::Cleared);
  }

  /// Live keys: T2 from most to least recent, then T1 likewise.
  pub fn keys(&self) -> Vec<K> {
    let state = self.state.read();
    state.live_iter().map(|(key, _)| key.clone()).collect()
  }

  pub fn values(&self) -> Vec<V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state.live_iter().map(|(_, value)| value.clone()).collect()
  }

  pub fn items(&self) -> ahash::HashMap<K, V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .live_iter()
      .map(|(key, value)| (key.clone(), value.clone()))
      .collect()
  }

  /// Changes the capacity. `p` is rescaled by `capacity / (t1+t2+b1+b2)`,
  /// live entries are evicted until they fit, and both ghost lists are
  /// trimmed to the new bound.
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
    let mut guard = self.state.write();
    let state = &mut *guard;
    state.capacity = capacity;

    if state.live_len() > 0 {
      let total = state.live_len() + state.b1.len() + state.b2.len();
      state.p = state.p * capacity / total;
    }
    // Ghost-only caches skip the rescale but still need the bound.
    state.p = state.p.min(capacity);

    let mut evicted = 0;
    while state.live_len() > capacity {
      let Some((key, value)) = state.replace(false) else {
        break;
      };
      evicted += 1;
      self.notifier.notify(key, value, EvictionReason::Capacity);
    }
    state.trim_ghosts();
    self.metrics.record_evictions(evicted);

    tracing::debug!(capacity, evicted, p = state.p, "arc cache resized");
    Ok(())
  }

  pub fn stats(&self) -> ArcStats {
    let state = self.state.read();
    ArcStats {
      size: state.live_len(),
      capacity: state.capacity,
      t1: state.t1.len(),
      t2: state.t2.len(),
      b1: state.b1.len(),
      b2: state.b2.len(),
      p: state.p,
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

impl_evicting_cache!(ArcCache, PolicyKind::Arc);
