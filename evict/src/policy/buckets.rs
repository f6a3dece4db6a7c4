use std::collections::BTreeMap;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

use super::list::{Linked, List};

/// Per-frequency recency lists shared by the LFU family.
///
/// A bucket exists in the map iff it is non-empty, so `buckets[f]` present
/// means some entry currently has frequency `f`. Inside a bucket the front is
/// the most recently touched entry and the back is the eviction candidate.
///
/// `min_freq` is maintained by the owning engine (each engine has its own
/// rule for keeping it current); `max_freq` is kept exact here.
#[derive(Debug)]
pub(crate) struct FrequencyBuckets {
  buckets: HashMap<u64, List>,
  min_freq: u64,
  max_freq: u64,
}

impl FrequencyBuckets {
  pub(crate) fn new() -> Self {
    Self {
      buckets: HashMap::new(),
      min_freq: 1,
      max_freq: 1,
    }
  }

  #[inline]
  pub(crate) fn min_freq(&self) -> u64 {
    self.min_freq
  }

  #[inline]
  pub(crate) fn max_freq(&self) -> u64 {
    self.max_freq
  }

  #[inline]
  pub(crate) fn set_min_freq(&mut self, freq: u64) {
    self.min_freq = freq;
  }

  #[inline]
  pub(crate) fn has_bucket(&self, freq: u64) -> bool {
    self.buckets.contains_key(&freq)
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.buckets.is_empty()
  }

  /// Links `index` at the front of the bucket for `freq`.
  pub(crate) fn link<T: Linked>(&mut self, nodes: &mut Arena<T>, index: Index, freq: u64) {
    self
      .buckets
      .entry(freq)
      .or_insert_with(List::new)
      .push_front(nodes, index);
    if freq > self.max_freq {
      self.max_freq = freq;
    }
  }

  /// Unlinks `index` from the bucket for `freq`. Returns `true` if that
  /// bucket became empty (and was dropped).
  pub(crate) fn unlink<T: Linked>(&mut self, nodes: &mut Arena<T>, index: Index, freq: u64) -> bool {
    let emptied = match self.buckets.get_mut(&freq) {
      Some(bucket) => {
        bucket.unlink(nodes, index);
        bucket.is_empty()
      }
      None => return false,
    };

    if emptied {
      self.buckets.remove(&freq);
      if freq == self.max_freq {
        self.max_freq = self.buckets.keys().copied().max().unwrap_or(1);
      }
    }
    emptied
  }

  /// The least recently touched entry at exactly `freq`.
  #[inline]
  pub(crate) fn back_of(&self, freq: u64) -> Option<Index> {
    self.buckets.get(&freq).and_then(List::back)
  }

  /// Walks frequencies upward from `from` to the tracked maximum and returns
  /// the first one with a non-empty bucket.
  pub(crate) fn first_non_empty_from(&self, from: u64) -> Option<u64> {
    if self.is_empty() {
      return None;
    }
    (from.max(1)..=self.max_freq).find(|freq| self.buckets.contains_key(freq))
  }

  /// Recomputes both bounds by a full scan of the live buckets.
  pub(crate) fn recompute_bounds(&mut self) {
    let mut bounds: Option<(u64, u64)> = None;
    for &freq in self.buckets.keys() {
      bounds = Some(match bounds {
        None => (freq, freq),
        Some((lo, hi)) => (lo.min(freq), hi.max(freq)),
      });
    }
    let (min, max) = bounds.unwrap_or((1, 1));
    self.min_freq = min;
    self.max_freq = max;
  }

  /// Number of entries per non-empty frequency.
  pub(crate) fn histogram(&self) -> BTreeMap<u64, usize> {
    self
      .buckets
      .iter()
      .map(|(&freq, bucket)| (freq, bucket.len()))
      .collect()
  }

  /// Nodes ordered from most worth keeping to next victim: highest frequency
  /// first, most recent first within a frequency.
  pub(crate) fn iter_by_priority<'a, T: Linked>(
    &'a self,
    nodes: &'a Arena<T>,
  ) -> impl Iterator<Item = (Index, &'a T)> + 'a {
    let mut freqs: Vec<u64> = self.buckets.keys().copied().collect();
    freqs.sort_unstable_by(|a, b| b.cmp(a));
    freqs
      .into_iter()
      .flat_map(move |freq| self.buckets[&freq].iter(nodes))
  }

  pub(crate) fn reset(&mut self) {
    self.buckets.clear();
    self.min_freq = 1;
    self.max_freq = 1;
  }
}
