use thiserror::Error;

/// Errors that can occur when building or resizing a cache.
///
/// The panicking constructors (`new`, `resize`, `with_config`) report these
/// same conditions as a panic; the `try_*` variants hand them back instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// The cache was configured with a capacity of zero. Every engine is
  /// bounded, so a capacity of at least one is required.
  #[error("cache capacity must be greater than zero")]
  ZeroCapacity,

  /// The adaptive LFU decay factor must lie within `(0, 1]`.
  #[error("decay factor must be within (0, 1], got {0}")]
  InvalidDecayFactor(f64),
}

/// A specialized `Result` type for cache construction.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[inline]
pub(crate) fn check_capacity(capacity: usize) -> Result<()> {
  if capacity == 0 {
    return Err(BuildError::ZeroCapacity);
  }
  Ok(())
}

#[inline]
pub(crate) fn check_decay_factor(decay_factor: f64) -> Result<()> {
  // NaN fails both comparisons and is rejected with the rest.
  if decay_factor > 0.0 && decay_factor <= 1.0 {
    Ok(())
  } else {
    Err(BuildError::InvalidDecayFactor(decay_factor))
  }
}

/// Unwraps a construction result, turning a configuration error into a panic.
#[inline]
#[track_caller]
pub(crate) fn fatal<T>(result: Result<T>) -> T {
  match result {
    Ok(value) => value,
    Err(err) => panic!("{err}"),
  }
}
