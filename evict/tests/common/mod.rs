#![allow(dead_code)]

use std::sync::Arc;

use fibre_evict::{CacheBuilder, EvictingCache, EvictionListener, EvictionReason, PolicyKind};
use parking_lot::Mutex;

/// A listener that keeps every notification it receives, in order.
pub struct Recorder<K, V> {
  events: Arc<Mutex<Vec<(K, V, EvictionReason)>>>,
}

impl<K, V> Clone for Recorder<K, V> {
  fn clone(&self) -> Self {
    Self {
      events: self.events.clone(),
    }
  }
}

impl<K, V> Recorder<K, V> {
  pub fn new() -> Self {
    Self {
      events: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Removes and returns everything recorded so far.
  pub fn take(&self) -> Vec<(K, V, EvictionReason)> {
    std::mem::take(&mut *self.events.lock())
  }

  pub fn len(&self) -> usize {
    self.events.lock().len()
  }

  pub fn count(&self, reason: EvictionReason) -> usize {
    self.events.lock().iter().filter(|(_, _, r)| *r == reason).count()
  }
}

impl<K, V> Recorder<K, V>
where
  K: Clone,
  V: Clone,
{
  pub fn events(&self) -> Vec<(K, V, EvictionReason)> {
    self.events.lock().clone()
  }

  pub fn keys(&self) -> Vec<K> {
    self.events.lock().iter().map(|(k, _, _)| k.clone()).collect()
  }
}

impl<K, V> EvictionListener<K, V> for Recorder<K, V>
where
  K: Send,
  V: Send,
{
  fn on_evict(&self, key: K, value: V, reason: EvictionReason) {
    self.events.lock().push((key, value, reason));
  }
}

/// Builds one engine of `kind` wired to `recorder`.
pub fn build_recorded<K, V>(
  kind: PolicyKind,
  capacity: usize,
  recorder: &Recorder<K, V>,
) -> Box<dyn EvictingCache<K, V>>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  CacheBuilder::new()
    .capacity(capacity)
    .eviction_listener(recorder.clone())
    .build(kind)
    .unwrap()
}

/// One recorded engine per policy, paired with its recorder.
pub fn every_policy<K, V>(capacity: usize) -> Vec<(Box<dyn EvictingCache<K, V>>, Recorder<K, V>)>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  PolicyKind::ALL
    .iter()
    .map(|&kind| {
      let recorder = Recorder::new();
      (build_recorded(kind, capacity, &recorder), recorder)
    })
    .collect()
}
