//! O(1) least-frequently-used cache.
//!
//! Entries live in a generational arena and are threaded onto one recency
//! list per access frequency. A running `min_freq` points at the bucket the
//! next victim comes from; ties inside a bucket go to the least recently
//! touched entry.

use super::buckets::FrequencyBuckets;
use super::list::{Linked, Links};
use super::{impl_evicting_cache, PolicyKind};
use crate::error::{self, BuildError};
use crate::listener::{EvictionListener, EvictionReason, Notifier};
use crate::metrics::{Metrics, MetricsSnapshot};

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use generational_arena::{Arena, Index};
use parking_lot::RwLock;

#[derive(Debug)]
struct Node<K, V> {
  key: K,
  value: V,
  freq: u64,
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

struct LfuState<K, V, H> {
  capacity: usize,
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  buckets: FrequencyBuckets,
}

impl<K, V, H> LfuState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn new(capacity: usize, hasher: H) -> Self {
    Self {
      capacity,
      nodes: Arena::with_capacity(capacity),
      index: HashMap::with_hasher(hasher),
      buckets: FrequencyBuckets::new(),
    }
  }

  fn find<Q>(&self, key: &Q) -> Option<Index>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.index.get(key).copied()
  }

  // Moves an entry one bucket up. The entry lands in `old + 1`, so when it
  // emptied the minimum bucket the new minimum is exactly one higher.
  fn touch(&mut self, index: Index) {
    let old_freq = self.nodes[index].freq;
    let new_freq = old_freq.saturating_add(1);

    let emptied = self.buckets.unlink(&mut self.nodes, index, old_freq);
    if emptied && old_freq == self.buckets.min_freq() {
      self.buckets.set_min_freq(new_freq);
    }

    self.nodes[index].freq = new_freq;
    self.buckets.link(&mut self.nodes, index, new_freq);
  }

  fn insert(&mut self, key: K, value: V) {
    let index = self.nodes.insert(Node {
      key: key.clone(),
      value,
      freq: 1,
      links: Links::default(),
    });
    self.buckets.link(&mut self.nodes, index, 1);
    self.buckets.set_min_freq(1);
    self.index.insert(key, index);
  }

  // Fully detaches an entry and restores the `min_freq` invariant.
  fn detach(&mut self, index: Index) -> Option<(K, V)> {
    let freq = self.nodes.get(index)?.freq;
    let emptied = self.buckets.unlink(&mut self.nodes, index, freq);
    let node = self.nodes.remove(index)?;
    self.index.remove(&node.key);

    if self.index.is_empty() {
      self.buckets.set_min_freq(1);
    } else if emptied && freq == self.buckets.min_freq() {
      let next = self.buckets.first_non_empty_from(freq).unwrap_or(1);
      self.buckets.set_min_freq(next);
    }
    Some((node.key, node.value))
  }

  // Victim: the back of the `min_freq` bucket. `min_freq` is trusted; the
  // forward scan only runs if it ever points at an empty bucket.
  fn evict_one(&mut self) -> Option<(K, V)> {
    let min = self.buckets.min_freq();
    let victim = self.buckets.back_of(min).or_else(|| {
      let freq = self.buckets.first_non_empty_from(1)?;
      self.buckets.back_of(freq)
    })?;
    self.detach(victim)
  }

  fn drain(&mut self) -> Vec<(K, V)> {
    let order: Vec<Index> = self
      .buckets
      .iter_by_priority(&self.nodes)
      .map(|(index, _)| index)
      .collect();
    let mut drained = Vec::with_capacity(order.len());
    for index in order {
      if let Some(node) = self.nodes.remove(index) {
        drained.push((node.key, node.value));
      }
    }
    self.nodes.clear();
    self.index.clear();
    self.buckets.reset();
    drained
  }
}

/// Point-in-time statistics for an [`LfuCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LfuStats {
  pub size: usize,
  pub capacity: usize,
  /// Frequency of the bucket the next victim comes from.
  pub min_frequency: u64,
  /// Highest frequency currently held by any entry.
  pub max_frequency: u64,
  /// Entry count per non-empty frequency.
  pub frequency_distribution: BTreeMap<u64, usize>,
}

/// A bounded cache that evicts the least frequently used entry, breaking
/// ties by recency. All operations are O(1) apart from `remove` of the last
/// entry at the minimum frequency, which scans upward for the next bucket.
///
/// # Examples
///
/// ```
/// use fibre_evict::LfuCache;
///
/// let cache = LfuCache::new(3);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.put("c", 3);
/// cache.get(&"a");
/// cache.get(&"b");
///
/// assert!(cache.put("d", 4));
/// assert!(!cache.contains(&"c"));
/// ```
pub struct LfuCache<K, V, H = ahash::RandomState> {
  state: RwLock<LfuState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for LfuCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("LfuCache")
      .field("len", &state.index.len())
      .field("capacity", &state.capacity)
      .field("min_freq", &state.buckets.min_freq())
      .field("notifier", &self.notifier)
      .finish_non_exhaustive()
  }
}

impl<K, V> LfuCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Creates a cache holding at most `capacity` entries.
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

  /// Creates a cache that reports every eviction to `listener`.
  ///
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

impl<K, V, H> LfuCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Creates a cache that hashes keys with `hasher`.
  ///
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
      state: RwLock::new(LfuState::new(capacity, hasher)),
      notifier: Notifier::new(listener),
      metrics: Metrics::new(),
    })
  }

  /// Returns a clone of the value and bumps the entry's frequency.
  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut state = self.state.write();
    let found = state.find(key).map(|index| {
      state.touch(index);
      state.nodes[index].value.clone()
    });
    self.metrics.record_lookup(found.is_some());
    found
  }

  /// Inserts or updates `key`. An update bumps the frequency and never
  /// evicts; an insert into a full cache first evicts one entry.
  ///
  /// Returns `true` iff this call evicted an entry.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut state = self.state.write();

    if let Some(index) = state.find(&key) {
      state.nodes[index].value = value;
      state.touch(index);
      self.metrics.record_write(true);
      return false;
    }

    let mut evicted = false;
    if state.index.len() >= state.capacity {
      if let Some((old_key, old_value)) = state.evict_one() {
        evicted = true;
        self.metrics.record_evictions(1);
        self.notifier.notify(old_key, old_value, EvictionReason::Capacity);
      }
    }

    state.insert(key, value);
    self.metrics.record_write(false);
    evicted
  }

  /// Takes `key` out of the cache and reports it to the listener as
  /// [`EvictionReason::Invalidated`].
  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut state = self.state.write();
    let index = state.find(key)?;
    let (key, value) = state.detach(index)?;
    self.metrics.record_removal();
    self.notifier.notify(key, value.clone(), EvictionReason::Invalidated);
    Some(value)
  }

  /// Checks for `key` without changing its frequency.
  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.state.read().index.contains_key(key)
  }

  /// Reads `key` without changing its frequency.
  pub fn peek<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let state = self.state.read();
    state.find(key).map(|index| state.nodes[index].value.clone())
  }

  /// The current access count of `key`, without changing it.
  pub fn frequency<Q>(&self, key: &Q) -> Option<u64>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let state = self.state.read();
    state.find(key).map(|index| state.nodes[index].freq)
  }

  pub fn len(&self) -> usize {
    self.state.read().index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.state.read().capacity
  }

  /// Drops every entry and resets the frequency bookkeeping. Each dropped
  /// entry is reported with [`EvictionReason::Cleared`].
  pub fn clear(&self) {
    let mut state = self.state.write();
    let drained = state.drain();
    tracing::debug!(cleared = drained.len(), "lfu cache cleared");
    self.metrics.record_cleared(drained.len());
    self.notifier.notify_all(drained, EvictionReason::Cleared);
  }

  /// Keys from most to least worth keeping: highest frequency first, most
  /// recent first within a frequency.
  pub fn keys(&self) -> Vec<K> {
    let state = self.state.read();
    state
      .buckets
      .iter_by_priority(&state.nodes)
      .map(|(_, node)| node.key.clone())
      .collect()
  }

  /// Values in the same order as [`LfuCache::keys`].
  pub fn values(&self) -> Vec<V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .buckets
      .iter_by_priority(&state.nodes)
      .map(|(_, node)| node.value.clone())
      .collect()
  }

  pub fn items(&self) -> ahash::HashMap<K, V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .nodes
      .iter()
      .map(|(_, node)| (node.key.clone(), node.value.clone()))
      .collect()
  }

  /// Sets a new capacity, evicting least-frequent entries until the cache
  /// fits.
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
    while state.index.len() > capacity {
      let Some((key, value)) = state.evict_one() else {
        break;
      };
      evicted += 1;
      self.notifier.notify(key, value, EvictionReason::Capacity);
    }
    self.metrics.record_evictions(evicted);
    tracing::debug!(capacity, evicted, "lfu cache resized");
    Ok(())
  }

  pub fn stats(&self) -> LfuStats {
    let state = self.state.read();
    LfuStats {
      size: state.index.len(),
      capacity: state.capacity,
      min_frequency: state.buckets.min_freq(),
      max_frequency: state.buckets.max_freq(),
      frequency_distribution: state.buckets.histogram(),
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

impl_evicting_cache!(LfuCache, PolicyKind::Lfu);
