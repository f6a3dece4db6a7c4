//! Frequency-based replacement.
//!
//! Uses the same bucketed layout as [`LfuCache`](super::lfu::LfuCache) but
//! never trusts the cached minimum when choosing a victim: every eviction
//! walks the buckets upward from `min_freq` to the highest tracked frequency
//! and takes the first one that holds anything.

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

struct FbrState<K, V, H> {
  capacity: usize,
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  buckets: FrequencyBuckets,
}

impl<K, V, H> FbrState<K, V, H>
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

  // Restores the minimum after the bucket at `freq` may have emptied.
  fn update_min(&mut self, freq: u64) {
    if self.index.is_empty() {
      self.buckets.set_min_freq(1);
      return;
    }
    if freq == self.buckets.min_freq() && !self.buckets.has_bucket(freq) {
      let next = self
        .buckets
        .first_non_empty_from(freq)
        .unwrap_or(freq.saturating_add(1));
      self.buckets.set_min_freq(next);
    }
  }

  fn touch(&mut self, index: Index) {
    let freq = self.nodes[index].freq;
    self.buckets.unlink(&mut self.nodes, index, freq);

    let bumped = freq.saturating_add(1);
    self.nodes[index].freq = bumped;
    self.buckets.link(&mut self.nodes, index, bumped);
    self.update_min(freq);
  }

  fn insert(&mut self, key: K, value: V) {
    let index = self.nodes.insert(Node {
      key: key.clone(),
      value,
      freq: 1,
      links: Links::default(),
    });
    self.index.insert(key, index);
    self.buckets.link(&mut self.nodes, index, 1);
    self.buckets.set_min_freq(1);
  }

  fn detach(&mut self, index: Index) -> Option<(K, V)> {
    let freq = self.nodes.get(index)?.freq;
    self.buckets.unlink(&mut self.nodes, index, freq);
    let node = self.nodes.remove(index)?;
    self.index.remove(&node.key);
    self.update_min(freq);
    Some((node.key, node.value))
  }

  // Full forward scan from `min_freq`; the recorded minimum is only a lower
  // bound for where the search starts.
  fn evict_one(&mut self) -> Option<(K, V)> {
    let freq = self
      .buckets
      .first_non_empty_from(self.buckets.min_freq())
      .or_else(|| self.buckets.first_non_empty_from(1))?;
    let victim = self.buckets.back_of(freq)?;
    self.detach(victim)
  }
}

/// Point-in-time statistics for an [`FbrCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FbrStats {
  pub size: usize,
  pub capacity: usize,
  pub min_frequency: u64,
  pub max_frequency: u64,
  pub frequency_distribution: BTreeMap<u64, usize>,
}

/// A bounded frequency-based replacement cache.
///
/// Evicts the least frequently used entry, least recent first among equals.
/// The victim search rescans from the lowest recorded frequency on every
/// eviction, so the observable eviction order matches [`LfuCache`] while the
/// minimum bookkeeping is allowed to lag.
///
/// [`LfuCache`]: super::lfu::LfuCache
pub struct FbrCache<K, V, H = ahash::RandomState> {
  state: RwLock<FbrState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for FbrCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("FbrCache")
      .field("len", &state.index.len())
      .field("capacity", &state.capacity)
      .finish_non_exhaustive()
  }
}

impl<K, V> FbrCache<K, V>
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

impl<K, V, H> FbrCache<K, V, H>
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
    let state = FbrState {
      capacity,
      nodes: Arena::with_capacity(capacity),
      index: HashMap::with_hasher(hasher),
      buckets: FrequencyBuckets::new(),
    };
    Ok(Self {
      state: RwLock::new(state),
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
    let mut state = self.state.write();
    let value = match state.find(key) {
      Some(index) => {
        state.touch(index);
        Some(state.nodes[index].value.clone())
      }
      None => None,
    };
    self.metrics.record_lookup(value.is_some());
    value
  }

  /// Returns `true` iff the insert evicted another node.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut state = self.state.write();

    if let Some(index) = state.find(&key) {
      state.nodes[index].value = value;
      state.touch(index);
      self.metrics.record_write(true);
      return false;
    }

    let evicted = if state.index.len() >= state.capacity {
      state.evict_one()
    } else {
      None
    };
    let did_evict = evicted.is_some();
    if let Some((old_key, old_value)) = evicted {
      self.metrics.record_evictions(1);
      self.notifier.notify(old_key, old_value, EvictionReason::Capacity);
    }

    state.insert(key, value);
    self.metrics.record_write(false);
    did_evict
  }

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

  pub fn clear(&self) {
    let mut state = self.state.write();
    let order: Vec<Index> = state
      .buckets
      .iter_by_priority(&state.nodes)
      .map(|(index, _)| index)
      .collect();
    let drained: Vec<(K, V)> = order
      .into_iter()
      .filter_map(|index| state.nodes.remove(index))
      .map(|node| (node.key, node.value))
      .collect();
    state.nodes.clear();
    state.index.clear();
    state.buckets.reset();

    tracing::debug!(cleared = drained.len(), "fbr cache cleared");
    self.metrics.record_cleared(drained.len());
    self.notifier.notify_all(drained, EvictionReason::Cleared);
  }

  /// Highest frequency first, most recent first within a frequency.
  pub fn keys(&self) -> Vec<K> {
    let state = self.state.read();
    state
      .buckets
      .iter_by_priority(&state.nodes)
      .map(|(_, node)| node.key.clone())
      .collect()
  }

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
      match state.evict_one() {
        Some((key, value)) => {
          evicted += 1;
          self.notifier.notify(key, value, EvictionReason::Capacity);
        }
        None => break,
      }
    }
    self.metrics.record_evictions(evicted);
    tracing::debug!(capacity, evicted, "fbr cache resized");
    Ok(())
  }

  pub fn stats(&self) -> FbrStats {
    let state = self.state.read();
    FbrStats {
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

impl_evicting_cache!(FbrCache, PolicyKind::Fbr);

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;

  #[test]
  fn evicts_lowest_frequency_then_oldest() {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    let cache = FbrCache::with_eviction_listener(2, move |k: u32, _: u32, _: EvictionReason| {
      sink.lock().push(k)
    });

    cache.put(1, 10);
    cache.put(2, 20);
    cache.get(&1);
    assert!(cache.put(3, 30));
    assert!(cache.put(4, 40));

    assert_eq!(*evicted.lock(), vec![2, 3]);
    assert_eq!(cache.keys(), vec![1, 4]);
  }

  #[test]
  fn remove_reports_invalidated() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let cache = FbrCache::with_eviction_listener(2, move |k: u32, v: u32, r: EvictionReason| {
      sink.lock().push((k, v, r))
    });

    cache.put(1, 10);
    assert_eq!(cache.remove(&1), Some(10));
    assert_eq!(cache.remove(&1), None);
    assert_eq!(*events.lock(), vec![(1, 10, EvictionReason::Invalidated)]);
    assert_eq!(cache.metrics().evicted_by_capacity, 0);
  }

  #[test]
  fn peek_and_contains_leave_frequency_alone() {
    let cache = FbrCache::new(2);
    cache.put("x", 1);
    assert_eq!(cache.peek(&"x"), Some(1));
    assert!(cache.contains(&"x"));
    assert_eq!(cache.frequency(&"x"), Some(1));
    cache.get(&"x");
    assert_eq!(cache.frequency(&"x"), Some(2));
  }

  #[test]
  fn min_frequency_rescans_after_touch_and_remove() {
    let cache = FbrCache::new(3);
    cache.put("a", 1);
    cache.put("b", 2);
    cache.get(&"a");
    cache.get(&"b");
    cache.get(&"b");
    // a=2, b=3
    assert_eq!(cache.stats().min_frequency, 2);

    cache.remove(&"a");
    assert_eq!(cache.stats().min_frequency, 3);

    cache.remove(&"b");
    let stats = cache.stats();
    assert_eq!((stats.size, stats.min_frequency), (0, 1));
  }

  #[test]
  fn ties_at_a_high_frequency_go_to_least_recent() {
    let cache = FbrCache::new(2);
    cache.put("a", 1);
    cache.put("b", 2);
    for _ in 0..3 {
      cache.get(&"a");
      cache.get(&"b");
    }
    // Both entries sit at frequency 4.
    assert_eq!(cache.stats().min_frequency, 4);
    assert!(cache.put("c", 3));
    assert!(!cache.contains(&"a"), "Least recent of the tied entries goes first");
  }

  #[test]
  fn resize_shrinks_by_frequency() {
    let cache = FbrCache::new(3);
    cache.put(1, ());
    cache.put(2, ());
    cache.put(3, ());
    cache.get(&3);
    cache.resize(1);
    assert_eq!(cache.keys(), vec![3]);
    assert_eq!(cache.metrics().evicted_by_capacity, 2);
  }

  #[test]
  fn clear_resets_stats() {
    let cache = FbrCache::new(3);
    cache.put(1, 1);
    cache.get(&1);
    cache.clear();
    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!((stats.min_frequency, stats.max_frequency), (1, 1));
    assert!(stats.frequency_distribution.is_empty());
  }
}
