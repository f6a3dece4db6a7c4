//! Adaptive LFU: an O(1) LFU whose frequencies age over time.
//!
//! Every entry remembers when it was last touched. Once the configured decay
//! interval has passed, the next mutating call rescales every frequency by
//! `decay_factor * exp(-idle / 1h)` (never below 1) and rebuilds the buckets,
//! so entries that were hot long ago stop shielding themselves from eviction.

use super::buckets::FrequencyBuckets;
use super::list::{Linked, Links};
use super::{impl_evicting_cache, PolicyKind};
use crate::error::{self, BuildError};
use crate::listener::{EvictionListener, EvictionReason, Notifier};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::time;

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use generational_arena::{Arena, Index};
use parking_lot::RwLock;

/// Decay factor used by [`AlfuCache::new`].
pub const DEFAULT_DECAY_FACTOR: f64 = 0.9;
/// Decay interval used by [`AlfuCache::new`].
pub const DEFAULT_DECAY_INTERVAL: Duration = Duration::from_secs(5 * 60);

const IDLE_SCALE_SECS: f64 = 3600.0;

struct Node<K, V> {
  key: K,
  value: V,
  freq: u64,
  last_access: Duration,
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

/// Scaled frequency after one decay pass.
fn decayed_frequency(freq: u64, decay_factor: f64, idle: Duration) -> u64 {
  let age = (-idle.as_secs_f64() / IDLE_SCALE_SECS).exp();
  let scaled = (freq as f64 * decay_factor * age).floor();
  if scaled < 1.0 {
    1
  } else {
    scaled as u64
  }
}

struct AlfuState<K, V, H> {
  capacity: usize,
  decay_factor: f64,
  decay_interval: Duration,
  last_decay: Duration,
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  buckets: FrequencyBuckets,
}

impl<K, V, H> AlfuState<K, V, H>
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

  fn maybe_decay(&mut self) {
    if time::elapsed_since(self.last_decay) >= self.decay_interval {
      self.decay();
    }
  }

  // Rescales every frequency, then rebuilds the buckets. Entries are relinked
  // from lowest to highest priority with `push_front`, so recency order
  // inside a merged bucket follows the pre-decay priority order.
  fn decay(&mut self) {
    let now = time::now_duration();
    let order: Vec<Index> = self
      .buckets
      .iter_by_priority(&self.nodes)
      .map(|(index, _)| index)
      .collect();

    self.buckets.reset();
    for &index in order.iter().rev() {
      let node = &mut self.nodes[index];
      let idle = now.saturating_sub(node.last_access);
      node.freq = decayed_frequency(node.freq, self.decay_factor, idle);
      let freq = node.freq;
      self.buckets.link(&mut self.nodes, index, freq);
    }
    self.buckets.recompute_bounds();
    self.last_decay = now;

    tracing::debug!(
      entries = order.len(),
      min_freq = self.buckets.min_freq(),
      max_freq = self.buckets.max_freq(),
      "alfu frequencies decayed"
    );
  }

  fn touch(&mut self, index: Index) {
    let old_freq = self.nodes[index].freq;
    let new_freq = old_freq.saturating_add(1);

    let emptied = self.buckets.unlink(&mut self.nodes, index, old_freq);
    if emptied && old_freq == self.buckets.min_freq() {
      self.buckets.set_min_freq(new_freq);
    }

    let node = &mut self.nodes[index];
    node.freq = new_freq;
    node.last_access = time::now_duration();
    self.buckets.link(&mut self.nodes, index, new_freq);
  }

  fn insert(&mut self, key: K, value: V) {
    let index = self.nodes.insert(Node {
      key: key.clone(),
      value,
      freq: 1,
      last_access: time::now_duration(),
      links: Links::default(),
    });
    self.buckets.link(&mut self.nodes, index, 1);
    self.buckets.set_min_freq(1);
    self.index.insert(key, index);
  }

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

  fn evict_one(&mut self) -> Option<(K, V)> {
    let victim = self.buckets.back_of(self.buckets.min_freq()).or_else(|| {
      let freq = self.buckets.first_non_empty_from(1)?;
      self.buckets.back_of(freq)
    })?;
    self.detach(victim)
  }
}

/// Point-in-time statistics for an [`AlfuCache`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlfuStats {
  pub size: usize,
  pub capacity: usize,
  pub min_frequency: u64,
  pub max_frequency: u64,
  pub frequency_distribution: BTreeMap<u64, usize>,
  pub decay_factor: f64,
  pub decay_interval: Duration,
  /// Time since the last decay pass (or since creation / the last `clear`).
  pub since_last_decay: Duration,
}

/// An LFU cache with periodic frequency decay.
///
/// Decay is checked lazily at the start of `get`, `put`, `remove` and
/// `resize`; `peek` and `contains` never trigger it. Between passes the
/// cache behaves exactly like [`LfuCache`](super::lfu::LfuCache).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fibre_evict::AlfuCache;
///
/// let cache = AlfuCache::with_config(2, 0.5, Duration::from_secs(60));
/// cache.put("a", 1);
/// for _ in 0..8 {
///   cache.get(&"a");
/// }
/// cache.force_decay();
/// assert_eq!(cache.frequency(&"a"), Some(4));
/// ```
pub struct AlfuCache<K, V, H = ahash::RandomState> {
  state: RwLock<AlfuState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for AlfuCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("AlfuCache")
      .field("len", &state.index.len())
      .field("capacity", &state.capacity)
      .field("decay_factor", &state.decay_factor)
      .field("decay_interval", &state.decay_interval)
      .finish_non_exhaustive()
  }
}

impl<K, V> AlfuCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Creates a cache with the default decay factor (0.9) and interval
  /// (5 minutes).
  ///
  /// # Panics
  ///
  /// Panics if `capacity` is zero.
  #[track_caller]
  pub fn new(capacity: usize) -> Self {
    error::fatal(Self::try_new(capacity))
  }

  pub fn try_new(capacity: usize) -> Result<Self, BuildError> {
    Self::try_with_config(capacity, DEFAULT_DECAY_FACTOR, DEFAULT_DECAY_INTERVAL)
  }

  /// # Panics
  ///
  /// Panics if `capacity` is zero or `decay_factor` is outside `(0, 1]`.
  #[track_caller]
  pub fn with_config(capacity: usize, decay_factor: f64, decay_interval: Duration) -> Self {
    error::fatal(Self::try_with_config(capacity, decay_factor, decay_interval))
  }

  pub fn try_with_config(
    capacity: usize,
    decay_factor: f64,
    decay_interval: Duration,
  ) -> Result<Self, BuildError> {
    Self::from_parts(
      capacity,
      ahash::RandomState::new(),
      None,
      decay_factor,
      decay_interval,
    )
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
      DEFAULT_DECAY_FACTOR,
      DEFAULT_DECAY_INTERVAL,
    ))
  }
}

impl<K, V, H> AlfuCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  #[track_caller]
  pub fn with_hasher(capacity: usize, hasher: H) -> Self {
    error::fatal(Self::from_parts(
      capacity,
      hasher,
      None,
      DEFAULT_DECAY_FACTOR,
      DEFAULT_DECAY_INTERVAL,
    ))
  }

  pub(crate) fn from_parts(
    capacity: usize,
    hasher: H,
    listener: Option<Arc<dyn EvictionListener<K, V>>>,
    decay_factor: f64,
    decay_interval: Duration,
  ) -> Result<Self, BuildError> {
    error::check_capacity(capacity)?;
    error::check_decay_factor(decay_factor)?;
    let state = AlfuState {
      capacity,
      decay_factor,
      decay_interval,
      last_decay: time::now_duration(),
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
    state.maybe_decay();
    let found = state.find(key).map(|index| {
      state.touch(index);
      state.nodes[index].value.clone()
    });
    self.metrics.record_lookup(found.is_some());
    found
  }

  /// Inserts or updates `key`; returns `true` iff an entry was evicted.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut state = self.state.write();
    state.maybe_decay();

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

  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut state = self.state.write();
    state.maybe_decay();
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

  /// Runs a decay pass now, regardless of the interval.
  pub fn force_decay(&self) {
    self.state.write().decay();
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

  /// Drops every entry and restarts the decay clock.
  pub fn clear(&self) {
    let mut state = self.state.write();
    let order: Vec<Index> = state
      .buckets
      .iter_by_priority(&state.nodes)
      .map(|(index, _)| index)
      .collect();
    let mut drained = Vec::with_capacity(order.len());
    for index in order {
      if let Some(node) = state.nodes.remove(index) {
        drained.push((node.key, node.value));
      }
    }
    state.nodes.clear();
    state.index.clear();
    state.buckets.reset();
    state.last_decay = time::now_duration();

    tracing::debug!(cleared = drained.len(), "alfu cache cleared");
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
    state.maybe_decay();
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
    tracing::debug!(capacity, evicted, "alfu cache resized");
    Ok(())
  }

  pub fn stats(&self) -> AlfuStats {
    let state = self.state.read();
    AlfuStats {
      size: state.index.len(),
      capacity: state.capacity,
      min_frequency: state.buckets.min_freq(),
      max_frequency: state.buckets.max_freq(),
      frequency_distribution: state.buckets.histogram(),
      decay_factor: state.decay_factor,
      decay_interval: state.decay_interval,
      since_last_decay: time::elapsed_since(state.last_decay),
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

impl_evicting_cache!(AlfuCache, PolicyKind::Alfu);
