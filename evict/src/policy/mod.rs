pub mod alfu;
pub mod arc;
pub mod fbr;
pub mod lfu;
pub mod mru;
pub mod optimal;

mod buckets;
mod list;

use crate::metrics::MetricsSnapshot;

use std::fmt;

/// Names one of the eviction policies shipped by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PolicyKind {
  /// Adaptive Replacement Cache.
  Arc,
  /// O(1) least-frequently-used.
  Lfu,
  /// Frequency-based replacement.
  Fbr,
  /// Adaptive LFU with periodic frequency decay.
  Alfu,
  /// Most-recently-used eviction.
  Mru,
  /// Belady's optimal replacement over a known access pattern.
  Optimal,
}

impl PolicyKind {
  pub const ALL: [PolicyKind; 6] = [
    PolicyKind::Arc,
    PolicyKind::Lfu,
    PolicyKind::Fbr,
    PolicyKind::Alfu,
    PolicyKind::Mru,
    PolicyKind::Optimal,
  ];
}

impl fmt::Display for PolicyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PolicyKind::Arc => "arc",
      PolicyKind::Lfu => "lfu",
      PolicyKind::Fbr => "fbr",
      PolicyKind::Alfu => "alfu",
      PolicyKind::Mru => "mru",
      PolicyKind::Optimal => "optimal",
    };
    f.write_str(name)
  }
}

/// The operation surface every engine shares, in object-safe form.
///
/// Each engine also exposes these operations as inherent methods (with
/// borrowed-key lookups and a policy-specific `stats()`); this trait exists so
/// callers can pick a policy at runtime and hold a `Box<dyn EvictingCache>`.
pub trait EvictingCache<K, V>: Send + Sync {
  /// Which policy this engine implements.
  fn policy(&self) -> PolicyKind;

  /// Looks up a live entry, updating the policy's bookkeeping.
  fn get(&self, key: &K) -> Option<V>;

  /// Inserts or updates an entry. Returns `true` iff an eviction happened.
  fn put(&self, key: K, value: V) -> bool;

  /// Removes an entry and returns its value. Every engine except ARC reports
  /// the removal to the listener as `EvictionReason::Invalidated`.
  fn remove(&self, key: &K) -> Option<V>;

  /// Checks for a live entry without touching policy state.
  fn contains(&self, key: &K) -> bool;

  /// Reads a live entry without touching policy state.
  fn peek(&self, key: &K) -> Option<V>;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn capacity(&self) -> usize;

  /// Drops every entry, notifying the listener for each live one.
  fn clear(&self);

  /// Changes the capacity, evicting down to it. Panics if `capacity == 0`.
  fn resize(&self, capacity: usize);

  /// Keys in the engine's enumeration order.
  fn keys(&self) -> Vec<K>;

  /// Values in the same order as [`EvictingCache::keys`].
  fn values(&self) -> Vec<V>;

  fn metrics(&self) -> MetricsSnapshot;
}

// Forwards the trait to the inherent methods of an engine.
macro_rules! impl_evicting_cache {
  ($engine:ident, $kind:expr) => {
    impl<K, V, H> $crate::policy::EvictingCache<K, V> for $engine<K, V, H>
    where
      K: Eq + ::std::hash::Hash + Clone + Send + Sync,
      V: Clone + Send + Sync,
      H: ::std::hash::BuildHasher + Send + Sync,
    {
      fn policy(&self) -> $crate::policy::PolicyKind {
        $kind
      }

      fn get(&self, key: &K) -> Option<V> {
        $engine::get(self, key)
      }

      fn put(&self, key: K, value: V) -> bool {
        $engine::put(self, key, value)
      }

      fn remove(&self, key: &K) -> Option<V> {
        $engine::remove(self, key)
      }

      fn contains(&self, key: &K) -> bool {
        $engine::contains(self, key)
      }

      fn peek(&self, key: &K) -> Option<V> {
        $engine::peek(self, key)
      }

      fn len(&self) -> usize {
        $engine::len(self)
      }

      fn capacity(&self) -> usize {
        $engine::capacity(self)
      }

      fn clear(&self) {
        $engine::clear(self)
      }

      fn resize(&self, capacity: usize) {
        $engine::resize(self, capacity)
      }

      fn keys(&self) -> Vec<K> {
        $engine::keys(self)
      }

      fn values(&self) -> Vec<V> {
        $engine::values(self)
      }

      fn metrics(&self) -> $crate::metrics::MetricsSnapshot {
        $engine::metrics(self)
      }
    }
  };
}

pub(crate) use impl_evicting_cache;
