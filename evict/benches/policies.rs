use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_evict::{CacheBuilder, EvictingCache, OptimalCache, Operation, PolicyKind};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const CAPACITY: usize = 1_024;
const KEY_SPACE: u64 = 4_096;
const WORKLOAD_LEN: usize = 10_000;

// A skewed workload: most accesses land on a small hot set.
fn skewed_keys(len: usize) -> Vec<u64> {
  let mut rng = Pcg64::seed_from_u64(0xbe1a);
  (0..len)
    .map(|_| {
      if rng.random_bool(0.8) {
        rng.random_range(0..KEY_SPACE / 16)
      } else {
        rng.random_range(0..KEY_SPACE)
      }
    })
    .collect()
}

fn build(kind: PolicyKind) -> Box<dyn EvictingCache<u64, u64>> {
  CacheBuilder::new().capacity(CAPACITY).build(kind).unwrap()
}

fn bench_get_or_put(c: &mut Criterion) {
  let keys = skewed_keys(WORKLOAD_LEN);
  let mut group = c.benchmark_group("get_or_put");
  group.throughput(Throughput::Elements(keys.len() as u64));

  for kind in PolicyKind::ALL {
    if kind == PolicyKind::Optimal {
      continue;
    }
    group.bench_with_input(BenchmarkId::from_parameter(kind), &keys, |b, keys| {
      let cache = build(kind);
      b.iter(|| {
        for &key in keys {
          if cache.get(&key).is_none() {
            cache.put(key, key);
          }
        }
      });
    });
  }
  group.finish();
}

fn bench_put_churn(c: &mut Criterion) {
  let mut group = c.benchmark_group("put_churn");
  group.throughput(Throughput::Elements(WORKLOAD_LEN as u64));

  for kind in [PolicyKind::Arc, PolicyKind::Lfu, PolicyKind::Fbr, PolicyKind::Mru] {
    group.bench_function(BenchmarkId::from_parameter(kind), |b| {
      let cache = build(kind);
      let mut next = 0u64;
      b.iter(|| {
        for _ in 0..WORKLOAD_LEN {
          black_box(cache.put(next, next));
          next += 1;
        }
      });
    });
  }
  group.finish();
}

fn bench_optimal_simulation(c: &mut Criterion) {
  let keys = skewed_keys(2_000);
  let ops: Vec<Operation<u64, u64>> = keys
    .iter()
    .enumerate()
    .map(|(i, &key)| if i % 3 == 0 { Operation::Put(key, key) } else { Operation::Get(key) })
    .collect();

  c.bench_function("optimal_simulate", |b| {
    let cache = OptimalCache::new(CAPACITY / 8);
    b.iter(|| black_box(cache.simulate(ops.clone())));
  });
}

criterion_group!(benches, bench_get_or_put, bench_put_churn, bench_optimal_simulation);
criterion_main!(benches);
