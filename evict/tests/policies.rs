// evict/tests/policies.rs

mod common;

use common::Recorder;
use fibre_evict::{CacheBuilder, EvictionReason};

// --- ARC Policy Tests ---
mod arc {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::{ArcCache, ArcStats};

  #[test]
  fn test_arc_ghost_hit_returns_to_t2() {
    let recorder = Recorder::new();
    let cache = CacheBuilder::new()
      .capacity(2)
      .eviction_listener(recorder.clone())
      .build_arc()
      .unwrap();

    cache.put("a", 1);
    cache.put("b", 2);
    assert!(cache.put("c", 3));
    assert_eq!(recorder.take(), vec![("a", 1, EvictionReason::Capacity)]);
    assert_eq!(cache.stats().b1, 1);
    assert_eq!(cache.stats().p, 0);

    // "a" is remembered in B1, so this is not a true miss.
    assert!(cache.put("a", 10));
    let stats = cache.stats();
    assert_eq!(
      stats,
      ArcStats {
        size: 2,
        capacity: 2,
        t1: 1,
        t2: 1,
        b1: 1,
        b2: 0,
        p: 1,
      }
    );
    assert_eq!(cache.get(&"a"), Some(10));
    assert_eq!(recorder.take(), vec![("b", 2, EvictionReason::Capacity)]);
  }

  #[test]
  fn test_arc_frequent_entries_survive_scan() {
    let cache = ArcCache::new(4);
    cache.put(0, 0);
    cache.put(1, 1);
    cache.get(&0);
    cache.get(&1);

    for i in 100..110 {
      cache.put(i, i);
    }
    assert!(cache.contains(&0));
    assert!(cache.contains(&1));
    assert_eq!(cache.len(), 4);
  }

  #[test]
  fn test_arc_get_promotes_once_seen_entries() {
    let cache = ArcCache::new(3);
    cache.put(1, "one");
    cache.put(2, "two");
    assert_eq!(cache.stats().t1, 2);

    assert_eq!(cache.get(&1), Some("one"));
    let stats = cache.stats();
    assert_eq!((stats.t1, stats.t2), (1, 1));
    assert_eq!(cache.get(&9), None);
  }

  #[test]
  fn test_arc_ghosts_are_invisible() {
    let cache = ArcCache::new(1);
    cache.put(1, 1);
    cache.put(2, 2);
    assert_eq!(cache.stats().b1, 1);

    assert!(!cache.contains(&1));
    assert_eq!(cache.peek(&1), None);
    assert_eq!(cache.get(&1), None);
    assert_eq!(cache.remove(&1), None);
    assert_eq!(cache.stats().b1, 0);
    assert_eq!(cache.keys(), vec![2]);
  }

  #[test]
  fn test_arc_ghost_lists_stay_bounded() {
    let cache = ArcCache::new(3);
    for i in 0..50 {
      cache.put(i, i);
      let stats = cache.stats();
      assert!(stats.t1 + stats.t2 <= 3);
      assert!(stats.b1 <= 3 && stats.b2 <= 3);
      assert!(stats.p <= stats.capacity);
    }
  }
}

// --- LFU Policy Tests ---
mod lfu {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::LfuCache;

  #[test]
  fn test_lfu_evicts_lowest_frequency() {
    let recorder = Recorder::new();
    let cache = LfuCache::with_eviction_listener(3, recorder.clone());
    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.get(&"a");
    cache.get(&"b");

    assert!(cache.put("d", 4));
    assert_eq!(recorder.take(), vec![("c", 3, EvictionReason::Capacity)]);
    assert_eq!(cache.frequency(&"a"), Some(2));
    assert_eq!(cache.frequency(&"d"), Some(1));
  }

  #[test]
  fn test_lfu_ties_break_by_recency() {
    let cache = LfuCache::new(2);
    cache.put(1, ());
    cache.put(2, ());
    cache.put(3, ());
    assert_eq!(cache.keys(), vec![3, 2]);
  }

  #[test]
  fn test_lfu_keys_are_priority_ordered() {
    let cache = LfuCache::new(4);
    for k in 1..=4 {
      cache.put(k, k);
    }
    for _ in 0..3 {
      cache.get(&2);
    }
    cache.get(&4);
    assert_eq!(cache.keys(), vec![2, 4, 3, 1]);
    assert_eq!(cache.values(), vec![2, 4, 3, 1]);

    let stats = cache.stats();
    assert_eq!(stats.min_frequency, 1);
    assert_eq!(stats.max_frequency, 4);
    assert_eq!(stats.frequency_distribution.get(&1), Some(&2));
  }

  #[test]
  fn test_lfu_remove_restores_min_frequency() {
    let cache = LfuCache::new(3);
    cache.put("x", 0);
    cache.put("y", 0);
    cache.get(&"y");
    assert_eq!(cache.stats().min_frequency, 1);

    cache.remove(&"x");
    assert_eq!(cache.stats().min_frequency, 2);

    cache.remove(&"y");
    assert_eq!(cache.stats().min_frequency, 1);
    assert!(cache.is_empty());
  }
}

// --- FBR Policy Tests ---
mod fbr {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::FbrCache;

  #[test]
  fn test_fbr_evicts_lowest_frequency() {
    let recorder = Recorder::new();
    let cache = FbrCache::with_eviction_listener(3, recorder.clone());
    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.get(&"a");
    cache.get(&"b");

    assert!(cache.put("d", 4));
    assert_eq!(recorder.keys(), vec!["c"]);
  }

  #[test]
  fn test_fbr_peek_and_contains_keep_frequency() {
    let cache = FbrCache::new(2);
    cache.put(1, "one");
    assert_eq!(cache.peek(&1), Some("one"));
    assert!(cache.contains(&1));
    assert_eq!(cache.frequency(&1), Some(1));

    cache.get(&1);
    assert_eq!(cache.frequency(&1), Some(2));
  }

  #[test]
  fn test_fbr_scan_skips_to_next_bucket() {
    let cache = FbrCache::new(2);
    cache.put(1, ());
    cache.put(2, ());
    cache.get(&1);
    cache.get(&2);
    cache.get(&2);
    // Buckets now hold 1 at frequency 2 and 2 at frequency 3.
    cache.put(3, ());
    assert!(!cache.contains(&1));
    assert!(cache.contains(&2));
  }
}

// --- ALFU Policy Tests ---
mod alfu {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::{AlfuCache, BuildError};
  use std::time::Duration;

  #[test]
  fn test_alfu_behaves_like_lfu_between_decays() {
    let cache = AlfuCache::new(3);
    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.get(&"a");
    cache.get(&"b");
    cache.put("d", 4);
    assert!(!cache.contains(&"c"));
  }

  #[test]
  fn test_alfu_forced_decay_lowers_frequencies() {
    let cache = AlfuCache::with_config(4, 0.5, Duration::from_secs(3600));
    cache.put("hot", ());
    for _ in 0..8 {
      cache.get(&"hot");
    }
    cache.put("cold", ());
    assert_eq!(cache.frequency(&"hot"), Some(9));

    cache.force_decay();
    assert_eq!(cache.frequency(&"hot"), Some(4));
    assert_eq!(cache.frequency(&"cold"), Some(1));
    assert_eq!(cache.stats().max_frequency, 4);
  }

  #[test]
  fn test_alfu_decays_during_operations() {
    let cache = AlfuCache::with_config(2, 0.5, Duration::from_millis(200));
    cache.put(1, ());
    for _ in 0..8 {
      cache.get(&1);
    }
    assert_eq!(cache.frequency(&1), Some(9));

    std::thread::sleep(Duration::from_millis(300));
    cache.get(&2);
    assert_eq!(cache.frequency(&1), Some(4));
  }

  #[test]
  fn test_alfu_rejects_bad_decay_factor() {
    assert_eq!(
      AlfuCache::<u8, u8>::try_with_config(4, 1.5, Duration::from_secs(1)).unwrap_err(),
      BuildError::InvalidDecayFactor(1.5)
    );
  }
}

// --- MRU Policy Tests ---
mod mru {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::MruCache;

  #[test]
  fn test_mru_evicts_just_touched_entry() {
    let recorder = Recorder::new();
    let cache = MruCache::with_eviction_listener(2, recorder.clone());
    cache.put("a", 1);
    cache.put("b", 2);
    cache.get(&"a");
    cache.put("c", 3);

    assert_eq!(recorder.keys(), vec!["a"]);
    assert!(cache.contains(&"b"));
    assert!(cache.contains(&"c"));
  }

  #[test]
  fn test_mru_cyclic_scan_keeps_prefix() {
    let cache = MruCache::new(3);
    let mut hits = 0;
    for _ in 0..5 {
      for k in 0..4 {
        if cache.get(&k).is_some() {
          hits += 1;
        } else {
          cache.put(k, k);
        }
      }
    }
    assert!(hits > 0);
    assert_eq!(cache.len(), 3);
  }
}

// --- Optimal Policy Tests ---
mod optimal {
  use super::*;
  use pretty_assertions::assert_eq;
  use fibre_evict::{OptimalCache, Operation};

  #[test]
  fn test_optimal_evicts_never_again_first() {
    let recorder = Recorder::new();
    let cache = CacheBuilder::new()
      .capacity(2)
      .access_pattern(vec!["a", "b", "c", "a", "d", "a"])
      .eviction_listener(recorder.clone())
      .build_optimal()
      .unwrap();

    cache.put("a", 1);
    cache.put("b", 2);
    assert!(cache.put("c", 3));
    assert_eq!(recorder.keys(), vec!["b"]);
    assert!(cache.contains(&"a"));
    assert_eq!(cache.current_time(), 3);
  }

  #[test]
  fn test_optimal_evicts_farthest_future() {
    let cache = OptimalCache::with_access_pattern(2, vec![1, 2, 3, 2, 1]);
    cache.put(1, ());
    cache.put(2, ());
    cache.put(3, ());
    assert!(!cache.contains(&1));
    assert_eq!(cache.next_access(&2), Some(3));
  }

  #[test]
  fn test_optimal_simulation_report() {
    let cache = OptimalCache::new(2);
    let ops = vec![
      Operation::Put("a", 1),
      Operation::Put("b", 2),
      Operation::Get("a"),
      Operation::Put("c", 3),
      Operation::Get("a"),
      Operation::Get("b"),
    ];
    let report = cache.simulate(ops);
    assert_eq!(report.hits, 2);
    assert_eq!(report.misses, 1);
    assert_eq!(report.evictions, 1);
    assert_eq!(report.hit_rate(), Some(2.0 / 3.0));
    assert_eq!(cache.stats().last_simulation, Some(report));
  }

  #[test]
  fn test_optimal_simulation_without_gets() {
    let cache = OptimalCache::new(1);
    let report = cache.simulate(vec![Operation::Put(1, 1), Operation::Put(2, 2)]);
    assert_eq!(report.hit_rate(), None);
    assert_eq!(report.evictions, 1);
  }
}
