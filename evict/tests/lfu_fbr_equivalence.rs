// LFU and FBR keep their minimum frequency differently but must agree on
// every observable outcome.

mod common;

use common::Recorder;
use fibre_evict::{FbrCache, LfuCache};
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

fn run_workload(seed: u64, capacity: usize, key_space: u32, steps: usize) {
  let mut rng = Pcg64::seed_from_u64(seed);
  let lfu_events = Recorder::new();
  let fbr_events = Recorder::new();
  let lfu = LfuCache::with_eviction_listener(capacity, lfu_events.clone());
  let fbr = FbrCache::with_eviction_listener(capacity, fbr_events.clone());

  for step in 0..steps {
    let key = rng.random_range(0..key_space);
    match rng.random_range(0..10) {
      0..=3 => {
        let value = rng.random::<u64>();
        assert_eq!(lfu.put(key, value), fbr.put(key, value), "seed {seed} step {step}");
      }
      4..=7 => assert_eq!(lfu.get(&key), fbr.get(&key), "seed {seed} step {step}"),
      8 => assert_eq!(lfu.remove(&key), fbr.remove(&key), "seed {seed} step {step}"),
      _ => {
        let capacity = rng.random_range(1..=capacity);
        lfu.resize(capacity);
        fbr.resize(capacity);
      }
    }

    assert_eq!(lfu.keys(), fbr.keys(), "seed {seed} step {step}");
    assert_eq!(lfu_events.take(), fbr_events.take(), "seed {seed} step {step}");
  }

  let (l, f) = (lfu.stats(), fbr.stats());
  assert_eq!(l.size, f.size);
  assert_eq!(l.max_frequency, f.max_frequency);
  assert_eq!(l.frequency_distribution, f.frequency_distribution);
}

#[test]
fn test_lfu_and_fbr_agree_on_small_caches() {
  for seed in 0..16 {
    run_workload(seed, 4, 12, 500);
  }
}

#[test]
fn test_lfu_and_fbr_agree_under_churn() {
  run_workload(0x5eed, 64, 512, 20_000);
}

#[test]
fn test_lfu_and_fbr_agree_on_hot_set() {
  for seed in [7, 42, 1337] {
    run_workload(seed, 16, 20, 5_000);
  }
}
