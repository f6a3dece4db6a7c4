//! Belady's optimal replacement over a known access pattern.
//!
//! The cache is told the future: a sequence of keys in the order they will be
//! accessed. A cursor (`current_time`) advances by one on every `get` and
//! `put`, and each resident entry tracks the next pattern position at or after
//! the cursor where its key shows up again. The victim is an entry whose key
//! never shows up again, or failing that the one needed furthest away.
//!
//! This is an offline baseline for measuring other policies, not a practical
//! online cache: victim selection scans every resident entry.

use super::{impl_evicting_cache, PolicyKind};
use crate::error::{self, BuildError};
use crate::listener::{EvictionListener, EvictionReason, Notifier};
use crate::metrics::{Metrics, MetricsSnapshot};

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::RwLock;

/// One scripted step for [`OptimalCache::simulate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<K, V> {
  Get(K),
  Put(K, V),
}

impl<K, V> Operation<K, V> {
  pub fn key(&self) -> &K {
    match self {
      Operation::Get(key) | Operation::Put(key, _) => key,
    }
  }
}

/// Counters from the most recent [`OptimalCache::simulate`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationReport {
  pub hits: u64,
  pub misses: u64,
  pub evictions: u64,
}

impl SimulationReport {
  /// `hits / (hits + misses)`, or `None` when the run contained no `Get`.
  pub fn hit_rate(&self) -> Option<f64> {
    let lookups = self.hits + self.misses;
    if lookups == 0 {
      None
    } else {
      Some(self.hits as f64 / lookups as f64)
    }
  }
}

struct Slot<V> {
  value: V,
  // Position of the next access recorded when the slot was last refreshed.
  // It can fall behind the cursor; readers go through `effective_next`.
  next_access: Option<usize>,
  // Insertion order, used to break ties among never-again entries.
  seq: u64,
}

struct OptimalState<K, V, H> {
  capacity: usize,
  entries: HashMap<K, Slot<V>, H>,
  // Every position at which each key appears, ascending.
  positions: ahash::HashMap<K, Vec<usize>>,
  pattern_len: usize,
  current_time: usize,
  next_seq: u64,
  last_simulation: Option<SimulationReport>,
}

impl<K, V, H> OptimalState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn load_pattern(&mut self, pattern: &[K]) {
    self.positions.clear();
    for (at, key) in pattern.iter().enumerate() {
      self.positions.entry(key.clone()).or_default().push(at);
    }
    self.pattern_len = pattern.len();
    self.current_time = 0;
    self.refresh_all();
  }

  /// First position of `key` at or after the cursor.
  fn lookahead(&self, key: &K) -> Option<usize> {
    let positions = self.positions.get(key)?;
    let at = positions.partition_point(|&pos| pos < self.current_time);
    positions.get(at).copied()
  }

  fn effective_next(&self, key: &K, slot: &Slot<V>) -> Option<usize> {
    match slot.next_access {
      Some(pos) if pos >= self.current_time => Some(pos),
      _ => self.lookahead(key),
    }
  }

  fn refresh<Q>(&mut self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let Some((owned, _)) = self.entries.get_key_value(key) else {
      return;
    };
    let next = self.lookahead(owned);
    if let Some(slot) = self.entries.get_mut(key) {
      slot.next_access = next;
    }
  }

  fn refresh_all(&mut self) {
    let updates: Vec<(K, Option<usize>)> = self
      .entries
      .keys()
      .map(|key| (key.clone(), self.lookahead(key)))
      .collect();
    for (key, next) in updates {
      if let Some(slot) = self.entries.get_mut(&key) {
        slot.next_access = next;
      }
    }
  }

  fn insert(&mut self, key: K, value: V) {
    let next_access = self.lookahead(&key);
    let seq = self.next_seq;
    self.next_seq += 1;
    self.entries.insert(
      key,
      Slot {
        value,
        next_access,
        seq,
      },
    );
  }

  // Never-again entries sort after every scheduled one; among them the
  // oldest insertion sorts last.
  fn eviction_rank(&self, key: &K, slot: &Slot<V>) -> (bool, usize, Reverse<u64>) {
    match self.effective_next(key, slot) {
      Some(pos) => (false, pos, Reverse(slot.seq)),
      None => (true, 0, Reverse(slot.seq)),
    }
  }

  fn pick_victim(&self) -> Option<K> {
    self
      .entries
      .iter()
      .max_by_key(|(key, slot)| self.eviction_rank(key, slot))
      .map(|(key, _)| key.clone())
  }

  fn evict_one(&mut self) -> Option<(K, V)> {
    let victim = self.pick_victim()?;
    self
      .entries
      .remove_entry(&victim)
      .map(|(key, slot)| (key, slot.value))
  }

  // Highest priority to keep first, next victim last.
  fn ordered(&self) -> Vec<(&K, &Slot<V>)> {
    let mut ranked: Vec<_> = self
      .entries
      .iter()
      .map(|(key, slot)| (self.eviction_rank(key, slot), key, slot))
      .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, key, slot)| (key, slot)).collect()
  }

  fn drain(&mut self) -> Vec<(K, V)> {
    self
      .entries
      .drain()
      .map(|(key, slot)| (key, slot.value))
      .collect()
  }
}

/// Point-in-time statistics for an [`OptimalCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimalStats {
  pub size: usize,
  pub capacity: usize,
  pub current_time: usize,
  pub pattern_len: usize,
  /// Counters from the most recent `simulate` call, if any.
  pub last_simulation: Option<SimulationReport>,
}

/// A bounded cache implementing Belady's optimal replacement.
///
/// # Examples
///
/// ```
/// use fibre_evict::OptimalCache;
///
/// let cache = OptimalCache::with_access_pattern(2, vec!["a", "b", "c", "a", "d", "a"]);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.put("c", 3); // "b" is never requested again
///
/// assert!(cache.contains(&"a"));
/// assert!(!cache.contains(&"b"));
/// ```
pub struct OptimalCache<K, V, H = ahash::RandomState> {
  state: RwLock<OptimalState<K, V, H>>,
  notifier: Notifier<K, V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for OptimalCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("OptimalCache")
      .field("len", &state.entries.len())
      .field("capacity", &state.capacity)
      .field("current_time", &state.current_time)
      .field("pattern_len", &state.pattern_len)
      .finish_non_exhaustive()
  }
}

impl<K, V> OptimalCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Creates a cache with an empty access pattern. Until a pattern is set,
  /// every entry counts as never accessed again and the oldest goes first.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` is zero.
  #[track_caller]
  pub fn new(capacity: usize) -> Self {
    error::fatal(Self::try_new(capacity))
  }

  pub fn try_new(capacity: usize) -> Result<Self, BuildError> {
    Self::from_parts(capacity, ahash::RandomState::new(), None, Vec::new())
  }

  /// # Panics
  ///
  /// Panics if `capacity` is zero.
  #[track_caller]
  pub fn with_access_pattern(capacity: usize, pattern: Vec<K>) -> Self {
    error::fatal(Self::from_parts(
      capacity,
      ahash::RandomState::new(),
      None,
      pattern,
    ))
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
      Vec::new(),
    ))
  }
}

impl<K, V, H> OptimalCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  #[track_caller]
  pub fn with_hasher(capacity: usize, hasher: H) -> Self {
    error::fatal(Self::from_parts(capacity, hasher, None, Vec::new()))
  }

  pub(crate) fn from_parts(
    capacity: usize,
    hasher: H,
    listener: Option<Arc<dyn EvictionListener<K, V>>>,
    pattern: Vec<K>,
  ) -> Result<Self, BuildError> {
    error::check_capacity(capacity)?;
    let mut state = OptimalState {
      capacity,
      entries: HashMap::with_capacity_and_hasher(capacity, hasher),
      positions: ahash::HashMap::default(),
      pattern_len: 0,
      current_time: 0,
      next_seq: 0,
      last_simulation: None,
    };
    state.load_pattern(&pattern);
    Ok(Self {
      state: RwLock::new(state),
      notifier: Notifier::new(listener),
      metrics: Metrics::new(),
    })
  }

  /// Replaces the known future, rewinds the cursor to zero and recomputes
  /// the next access of every resident entry.
  pub fn set_access_pattern(&self, pattern: Vec<K>) {
    let mut state = self.state.write();
    state.load_pattern(&pattern);
    tracing::debug!(len = pattern.len(), "optimal access pattern replaced");
  }

  /// Number of `get`/`put` calls since the pattern was set or the cache
  /// was cleared.
  pub fn current_time(&self) -> usize {
    self.state.read().current_time
  }

  /// Pattern position where `key` is next needed, if it is resident and
  /// needed again.
  pub fn next_access<Q>(&self, key: &Q) -> Option<usize>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let state = self.state.read();
    let (owned, slot) = state.entries.get_key_value(key)?;
    state.effective_next(owned, slot)
  }

  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut state = self.state.write();
    state.current_time += 1;
    state.refresh(key);
    let found = state.entries.get(key).map(|slot| slot.value.clone());
    self.metrics.record_lookup(found.is_some());
    found
  }

  /// Returns `true` iff making room for a new key evicted an entry.
  pub fn put(&self, key: K, value: V) -> bool {
    let mut state = self.state.write();
    state.current_time += 1;

    if let Some(slot) = state.entries.get_mut(&key) {
      slot.value = value;
      state.refresh(&key);
      self.metrics.record_write(true);
      return false;
    }

    let mut evicted = false;
    if state.entries.len() >= state.capacity {
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

  /// Removes `key` without advancing the cursor.
  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    let mut state = self.state.write();
    let (key, slot) = state.entries.remove_entry(key)?;
    self.metrics.record_removal();
    self.notifier.notify(key, slot.value.clone(), EvictionReason::Invalidated);
    Some(slot.value)
  }

  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.state.read().entries.contains_key(key)
  }

  pub fn peek<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    self
      .state
      .read()
      .entries
      .get(key)
      .map(|slot| slot.value.clone())
  }

  pub fn len(&self) -> usize {
    self.state.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn capacity(&self) -> usize {
    self.state.read().capacity
  }

  /// Drops every entry and rewinds the cursor. The pattern is kept.
  pub fn clear(&self) {
    let mut state = self.state.write();
    let drained = state.drain();
    state.current_time = 0;

    tracing::debug!(cleared = drained.len(), "optimal cache cleared");
    self.metrics.record_cleared(drained.len());
    self.notifier.notify_all(drained, EvictionReason::Cleared);
  }

  /// Soonest-needed first; never-again entries last, oldest at the very end.
  pub fn keys(&self) -> Vec<K> {
    let state = self.state.read();
    state
      .ordered()
      .into_iter()
      .map(|(key, _)| key.clone())
      .collect()
  }

  pub fn values(&self) -> Vec<V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .ordered()
      .into_iter()
      .map(|(_, slot)| slot.value.clone())
      .collect()
  }

  pub fn items(&self) -> ahash::HashMap<K, V>
  where
    V: Clone,
  {
    let state = self.state.read();
    state
      .entries
      .iter()
      .map(|(key, slot)| (key.clone(), slot.value.clone()))
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
    while state.entries.len() > capacity {
      let Some((key, value)) = state.evict_one() else {
        break;
      };
      evicted += 1;
      self.notifier.notify(key, value, EvictionReason::Capacity);
    }
    self.metrics.record_evictions(evicted);
    tracing::debug!(capacity, evicted, "optimal cache resized");
    Ok(())
  }

  /// Replays `operations` against an empty cache, using their keys as the
  /// access pattern.
  ///
  /// The operation keys replace any pattern installed through
  /// [`set_access_pattern`] or [`with_access_pattern`]; that earlier pattern
  /// is discarded and later `get`/`put` calls keep walking the simulated one.
  ///
  /// Resident entries are first dropped (reported as
  /// [`EvictionReason::Cleared`]); evictions during the run are reported as
  /// [`EvictionReason::Capacity`]. The run does not touch [`metrics`]; its
  /// counters are returned and kept for [`stats`]. The cache is left in the
  /// state the run produced, with the cursor at `operations.len()`.
  ///
  /// [`metrics`]: OptimalCache::metrics
  /// [`stats`]: OptimalCache::stats
  /// [`set_access_pattern`]: OptimalCache::set_access_pattern
  /// [`with_access_pattern`]: OptimalCache::with_access_pattern
  pub fn simulate(&self, operations: Vec<Operation<K, V>>) -> SimulationReport {
    let mut state = self.state.write();

    let dropped = state.drain();
    self.notifier.notify_all(dropped, EvictionReason::Cleared);

    let pattern: Vec<K> = operations.iter().map(|op| op.key().clone()).collect();
    state.load_pattern(&pattern);

    let mut report = SimulationReport::default();
    for op in operations {
      state.current_time += 1;
      match op {
        Operation::Get(key) => {
          if state.entries.contains_key(&key) {
            report.hits += 1;
            state.refresh(&key);
          } else {
            report.misses += 1;
          }
        }
        Operation::Put(key, value) => {
          if let Some(slot) = state.entries.get_mut(&key) {
            slot.value = value;
            state.refresh(&key);
            continue;
          }
          if state.entries.len() >= state.capacity {
            if let Some((old_key, old_value)) = state.evict_one() {
              report.evictions += 1;
              self.notifier.notify(old_key, old_value, EvictionReason::Capacity);
            }
          }
          state.insert(key, value);
        }
      }
    }

    tracing::debug!(
      hits = report.hits,
      misses = report.misses,
      evictions = report.evictions,
      hit_rate = ?report.hit_rate(),
      "optimal simulation finished"
    );
    state.last_simulation = Some(report);
    report
  }

  pub fn stats(&self) -> OptimalStats {
    let state = self.state.read();
    OptimalStats {
      size: state.entries.len(),
      capacity: state.capacity,
      current_time: state.current_time,
      pattern_len: state.pattern_len,
      last_simulation: state.last_simulation,
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

impl_evicting_cache!(OptimalCache, PolicyKind::Optimal);
