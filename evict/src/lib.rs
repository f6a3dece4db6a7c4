//! Bounded, thread-safe, in-process key/value caches with classic eviction
//! policies.
//!
//! # Features
//! - **Six policies**: ARC, O(1) LFU, frequency-based replacement (FBR),
//!   adaptive LFU with periodic decay, MRU, and Belady's optimal replacement
//!   over a known access pattern.
//! - **One surface**: every engine offers the same `get`/`put`/`remove`/
//!   `resize`/`clear` operations, and [`EvictingCache`] lets callers choose a
//!   policy at runtime.
//! - **Eviction listeners**: a callback receives every entry the cache drops,
//!   with the reason it was dropped.
//! - **Observability**: per-engine policy statistics plus shared hit/miss and
//!   eviction counters.
//! - **Config**: optional `serde` feature for loading a [`CacheConfig`].
//!
//! ```
//! use fibre_evict::{ArcCache, EvictingCache, LfuCache};
//!
//! let lfu = LfuCache::new(2);
//! lfu.put("a", 1);
//! lfu.put("b", 2);
//! lfu.get(&"a");
//! lfu.put("c", 3); // "b" has the lowest frequency
//! assert!(!lfu.contains(&"b"));
//!
//! let caches: Vec<Box<dyn EvictingCache<&str, i32>>> =
//!   vec![Box::new(lfu), Box::new(ArcCache::new(2))];
//! for cache in &caches {
//!   cache.put("z", 26);
//!   assert_eq!(cache.get(&"z"), Some(26));
//! }
//! ```

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod policy;

// Internal, crate-only modules
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use config::CacheConfig;
pub use error::BuildError;
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::MetricsSnapshot;
pub use policy::alfu::{AlfuCache, AlfuStats};
pub use policy::arc::{ArcCache, ArcStats};
pub use policy::fbr::{FbrCache, FbrStats};
pub use policy::lfu::{LfuCache, LfuStats};
pub use policy::mru::{MruCache, MruStats};
pub use policy::optimal::{OptimalCache, OptimalStats, Operation, SimulationReport};
pub use policy::{EvictingCache, PolicyKind};
