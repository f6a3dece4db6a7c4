use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvictionReason {
  /// The entry was chosen by the eviction policy to make room, either for a
  /// new entry or because the cache was resized below its current length.
  Capacity,
  /// The entry was dropped by `clear` (or by the state reset that precedes
  /// an optimal-cache simulation).
  Cleared,
  /// The entry was taken out explicitly with `remove`. ARC does not report
  /// these.
  Invalidated,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Cleared => write!(f, "cleared"),
      EvictionReason::Invalidated => write!(f, "invalidated"),
    }
  }
}

/// A listener that can be registered with a cache to receive notifications
/// when entries are evicted.
///
/// `on_evict` runs synchronously on the thread that caused the eviction,
/// while the cache's write lock is held and after the entry has already been
/// unlinked. Calling back into the same cache from here will deadlock.
pub trait EvictionListener<K, V>: Send + Sync {
  fn on_evict(&self, key: K, value: V, reason: EvictionReason);
}

impl<K, V, F> EvictionListener<K, V> for F
where
  F: Fn(K, V, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, key: K, value: V, reason: EvictionReason) {
    self(key, value, reason)
  }
}

/// The optional listener slot carried by every engine.
pub(crate) struct Notifier<K, V> {
  listener: Option<Arc<dyn EvictionListener<K, V>>>,
}

impl<K, V> Notifier<K, V> {
  pub(crate) fn new(listener: Option<Arc<dyn EvictionListener<K, V>>>) -> Self {
    Self { listener }
  }

  #[inline]
  pub(crate) fn notify(&self, key: K, value: V, reason: EvictionReason) {
    if let Some(listener) = &self.listener {
      listener.on_evict(key, value, reason);
    }
  }

  pub(crate) fn notify_all<I>(&self, victims: I, reason: EvictionReason)
  where
    I: IntoIterator<Item = (K, V)>,
  {
    if let Some(listener) = &self.listener {
      for (key, value) in victims {
        listener.on_evict(key, value, reason);
      }
    }
  }
}

impl<K, V> fmt::Debug for Notifier<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Notifier")
      .field("has_listener", &self.listener.is_some())
      .finish()
  }
}
