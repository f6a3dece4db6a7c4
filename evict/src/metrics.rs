use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector shared by every engine.
/// All fields are atomic so a snapshot never needs the engine lock.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,

  // --- Eviction Stats ---
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_clear: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      evicted_by_clear: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_lookup(&self, hit: bool) {
    if hit {
      self.hits.fetch_add(1, Ordering::Relaxed);
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_write(&self, updated: bool) {
    if updated {
      self.updates.fetch_add(1, Ordering::Relaxed);
    } else {
      self.inserts.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_removal(&self) {
    self.removals.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_evictions(&self, count: usize) {
    if count > 0 {
      self
        .evicted_by_capacity
        .fetch_add(count as u64, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_cleared(&self, count: usize) {
    if count > 0 {
      self
        .evicted_by_clear
        .fetch_add(count as u64, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_clear: self.evicted_by_clear.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of an engine's counters.
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
  /// The number of `get` calls that found a live entry.
  pub hits: u64,
  /// The number of `get` calls that found nothing.
  pub misses: u64,
  /// `hits / (hits + misses)`, or `0.0` before the first lookup.
  pub hit_ratio: f64,
  /// The number of `put` calls that created a new entry.
  pub inserts: u64,
  /// The number of `put` calls that overwrote an existing entry.
  pub updates: u64,
  /// The number of successful `remove` calls.
  pub removals: u64,
  /// Entries evicted by the policy, including evictions caused by `resize`.
  pub evicted_by_capacity: u64,
  /// Entries dropped by `clear`.
  pub evicted_by_clear: u64,
  /// Seconds since the engine was created.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("removals", &self.removals)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_clear", &self.evicted_by_clear)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
