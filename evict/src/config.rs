use crate::builder::CacheBuilder;
use crate::error::BuildError;
use crate::policy::alfu::{DEFAULT_DECAY_FACTOR, DEFAULT_DECAY_INTERVAL};
use crate::policy::{EvictingCache, PolicyKind};

use std::hash::Hash;
use std::time::Duration;

/// A plain-data description of a cache, suitable for loading from a config
/// file.
///
/// Fields missing from the source take their [`Default`] values, except that
/// `capacity` defaults to zero and must be supplied for the config to build.
///
/// ```
/// # #[cfg(feature = "serde")] {
/// use fibre_evict::{CacheConfig, PolicyKind};
///
/// let config: CacheConfig =
///   serde_json::from_str(r#"{ "policy": "alfu", "capacity": 128, "decay_factor": 0.5 }"#).unwrap();
/// assert_eq!(config.policy, PolicyKind::Alfu);
///
/// let cache = config.build::<String, u64>().unwrap();
/// assert_eq!(cache.capacity(), 128);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
  pub policy: PolicyKind,
  pub capacity: usize,
  /// Only read by [`PolicyKind::Alfu`].
  pub decay_factor: f64,
  /// Only read by [`PolicyKind::Alfu`].
  pub decay_interval: Duration,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      policy: PolicyKind::Arc,
      capacity: 0,
      decay_factor: DEFAULT_DECAY_FACTOR,
      decay_interval: DEFAULT_DECAY_INTERVAL,
    }
  }
}

impl CacheConfig {
  pub fn new(policy: PolicyKind, capacity: usize) -> Self {
    Self {
      policy,
      capacity,
      ..Self::default()
    }
  }

  /// Builds the configured policy behind the shared trait object.
  pub fn build<K, V>(&self) -> Result<Box<dyn EvictingCache<K, V>>, BuildError>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
  {
    CacheBuilder::from_config(self).build(self.policy)
  }
}
