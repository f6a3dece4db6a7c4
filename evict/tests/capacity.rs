mod common;

use std::collections::HashMap;

use common::every_policy;
use fibre_evict::{EvictionReason, PolicyKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
  Put(u8, u32),
  Get(u8),
  Remove(u8),
  Resize(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
  prop_oneof![
    6 => (0u8..24, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
    3 => (0u8..24).prop_map(Op::Get),
    1 => (0u8..24).prop_map(Op::Remove),
    1 => (1usize..10).prop_map(Op::Resize),
  ]
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  // Replays the same script against every engine and checks it against a
  // plain map of what should still be resident.
  #[test]
  fn test_len_never_exceeds_capacity_and_evictions_are_exact(
    initial in 1usize..8,
    ops in prop::collection::vec(op_strategy(), 1..200),
  ) {
    for (cache, recorder) in every_policy::<u8, u32>(initial) {
      let policy = cache.policy();
      let mut model: HashMap<u8, u32> = HashMap::new();

      for op in &ops {
        match *op {
          Op::Put(k, v) => {
            let was_new = !model.contains_key(&k);
            let evicted = cache.put(k, v);
            let events = recorder.take();
            prop_assert_eq!(evicted, !events.is_empty(), "{} put({})", policy, k);
            prop_assert!(events.len() <= 1);
            if !was_new {
              prop_assert!(events.is_empty(), "{} evicted on update", policy);
            }
            for (key, value, reason) in events {
              prop_assert_eq!(reason, EvictionReason::Capacity);
              prop_assert_eq!(model.remove(&key), Some(value), "{} evicted a stale value", policy);
            }
            model.insert(k, v);
          }
          Op::Get(k) => {
            prop_assert_eq!(cache.get(&k), model.get(&k).copied(), "{} get({})", policy, k);
          }
          Op::Remove(k) => {
            let removed = model.remove(&k);
            prop_assert_eq!(cache.remove(&k), removed);
            let expected = match (policy, removed) {
              (PolicyKind::Arc, _) | (_, None) => vec![],
              (_, Some(value)) => vec![(k, value, EvictionReason::Invalidated)],
            };
            prop_assert_eq!(recorder.take(), expected, "{} remove({})", policy, k);
          }
          Op::Resize(n) => {
            let before = cache.len();
            cache.resize(n);
            let events = recorder.take();
            prop_assert_eq!(events.len(), before.saturating_sub(n), "{} resize({})", policy, n);
            for (key, value, _) in events {
              prop_assert_eq!(model.remove(&key), Some(value));
            }
          }
        }

        prop_assert!(cache.len() <= cache.capacity(), "{} over capacity", policy);
        prop_assert_eq!(cache.len(), model.len(), "{} drifted from model", policy);
      }

      let mut keys = cache.keys();
      keys.sort_unstable();
      let mut expected: Vec<u8> = model.keys().copied().collect();
      expected.sort_unstable();
      prop_assert_eq!(keys, expected);
    }
  }
}

#[test]
fn test_capacity_one_holds_latest_key() {
  for (cache, recorder) in every_policy::<u32, u32>(1) {
    for i in 0..10 {
      cache.put(i, i);
      assert_eq!(cache.len(), 1);
      assert!(cache.contains(&i), "{}", cache.policy());
    }
    assert_eq!(recorder.len(), 9);
    assert_eq!(cache.metrics().evicted_by_capacity, 9);
  }
}

#[test]
fn test_round_trip_below_capacity() {
  for (cache, _) in every_policy::<String, Vec<u8>>(16) {
    for i in 0..16u8 {
      cache.put(format!("key-{i}"), vec![i; 3]);
    }
    for i in 0..16u8 {
      assert_eq!(cache.get(&format!("key-{i}")), Some(vec![i; 3]));
      assert_eq!(cache.peek(&format!("key-{i}")), Some(vec![i; 3]));
    }
    let metrics = cache.metrics();
    assert_eq!(metrics.hits, 16);
    assert_eq!(metrics.inserts, 16);
    assert_eq!(metrics.hit_ratio, 1.0);
  }
}

#[test]
#[should_panic(expected = "cache capacity must be greater than zero")]
fn test_resize_to_zero_panics() {
  let (cache, _) = every_policy::<u8, u8>(2).remove(0);
  cache.resize(0);
}
