use crate::config::CacheConfig;
use crate::error::{self, BuildError};
use crate::listener::EvictionListener;
use crate::policy::alfu::{AlfuCache, DEFAULT_DECAY_FACTOR, DEFAULT_DECAY_INTERVAL};
use crate::policy::arc::ArcCache;
use crate::policy::fbr::FbrCache;
use crate::policy::lfu::LfuCache;
use crate::policy::mru::MruCache;
use crate::policy::optimal::OptimalCache;
use crate::policy::{EvictingCache, PolicyKind};

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

/// A builder for any of the cache engines.
///
/// Settings that a policy does not use are ignored by it: the decay options
/// only affect [`AlfuCache`] and the access pattern only affects
/// [`OptimalCache`].
///
/// ```
/// use fibre_evict::{CacheBuilder, EvictionReason, PolicyKind};
///
/// let cache = CacheBuilder::<&str, u32>::new()
///   .capacity(2)
///   .eviction_listener(|key: &'static str, _value: u32, reason: EvictionReason| {
///     println!("{key} left the cache: {reason}");
///   })
///   .build(PolicyKind::Lfu)
///   .unwrap();
///
/// cache.put("a", 1);
/// assert_eq!(cache.get(&"a"), Some(1));
/// ```
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  capacity: usize,
  hasher: H,
  listener: Option<Arc<dyn EvictionListener<K, V>>>,
  decay_factor: f64,
  decay_interval: Duration,
  access_pattern: Vec<K>,
}

impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("capacity", &self.capacity)
      .field("decay_factor", &self.decay_factor)
      .field("decay_interval", &self.decay_interval)
      .field("access_pattern_len", &self.access_pattern.len())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V> CacheBuilder<K, V, ahash::RandomState> {
  /// Creates a builder with no capacity set, the default ALFU decay settings
  /// and an empty access pattern.
  pub fn new() -> Self {
    Self {
      capacity: 0,
      hasher: ahash::RandomState::new(),
      listener: None,
      decay_factor: DEFAULT_DECAY_FACTOR,
      decay_interval: DEFAULT_DECAY_INTERVAL,
      access_pattern: Vec::new(),
    }
  }

  /// Seeds a builder from a [`CacheConfig`]. The config's policy is not
  /// stored; pass it to [`CacheBuilder::build`] or use a `build_*` method.
  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new()
      .capacity(config.capacity)
      .decay_factor(config.decay_factor)
      .decay_interval(config.decay_interval)
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Configuration ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the maximum number of live entries. Required.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Replaces the key hasher.
  pub fn hasher<S>(self, hasher: S) -> CacheBuilder<K, V, S> {
    CacheBuilder {
      capacity: self.capacity,
      hasher,
      listener: self.listener,
      decay_factor: self.decay_factor,
      decay_interval: self.decay_interval,
      access_pattern: self.access_pattern,
    }
  }

  /// Sets the eviction listener.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// ALFU only. Must lie within `(0, 1]`.
  pub fn decay_factor(mut self, decay_factor: f64) -> Self {
    self.decay_factor = decay_factor;
    self
  }

  /// ALFU only.
  pub fn decay_interval(mut self, interval: Duration) -> Self {
    self.decay_interval = interval;
    self
  }

  /// Optimal only: the future sequence of key accesses.
  pub fn access_pattern(mut self, pattern: Vec<K>) -> Self {
    self.access_pattern = pattern;
    self
  }

  /// Validates the settings every policy shares. Policy-specific settings
  /// are checked by the build method that uses them.
  pub fn validate(&self) -> Result<(), BuildError> {
    error::check_capacity(self.capacity)?;
    Ok(())
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub fn build_arc(self) -> Result<ArcCache<K, V, H>, BuildError> {
    self.validate()?;
    ArcCache::from_parts(self.capacity, self.hasher, self.listener)
  }

  pub fn build_lfu(self) -> Result<LfuCache<K, V, H>, BuildError> {
    self.validate()?;
    LfuCache::from_parts(self.capacity, self.hasher, self.listener)
  }

  pub fn build_fbr(self) -> Result<FbrCache<K, V, H>, BuildError> {
    self.validate()?;
    FbrCache::from_parts(self.capacity, self.hasher, self.listener)
  }

  pub fn build_alfu(self) -> Result<AlfuCache<K, V, H>, BuildError> {
    self.validate()?;
    error::check_decay_factor(self.decay_factor)?;
    AlfuCache::from_parts(
      self.capacity,
      self.hasher,
      self.listener,
      self.decay_factor,
      self.decay_interval,
    )
  }

  pub fn build_mru(self) -> Result<MruCache<K, V, H>, BuildError> {
    self.validate()?;
    MruCache::from_parts(self.capacity, self.hasher, self.listener)
  }

  pub fn build_optimal(self) -> Result<OptimalCache<K, V, H>, BuildError> {
    self.validate()?;
    OptimalCache::from_parts(
      self.capacity,
      self.hasher,
      self.listener,
      self.access_pattern,
    )
  }
}

impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Builds the policy chosen at runtime behind the shared trait object.
  pub fn build(self, policy: PolicyKind) -> Result<Box<dyn EvictingCache<K, V>>, BuildError> {
    tracing::debug!(%policy, capacity = self.capacity, "building cache");
    Ok(match policy {
      PolicyKind::Arc => Box::new(self.build_arc()?),
      PolicyKind::Lfu => Box::new(self.build_lfu()?),
      PolicyKind::Fbr => Box::new(self.build_fbr()?),
      PolicyKind::Alfu => Box::new(self.build_alfu()?),
      PolicyKind::Mru => Box::new(self.build_mru()?),
      PolicyKind::Optimal => Box::new(self.build_optimal()?),
    })
  }
}
