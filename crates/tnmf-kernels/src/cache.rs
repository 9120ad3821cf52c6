//! Transform cache keyed on tensor state
//!
//! Spectral backends transform the same operand several times per iteration
//! (the dictionary feeds both the reconstruction and the activation gradient,
//! the observation never changes at all). [`TransformCache`] memoizes those
//! spectra under a [`CacheKey`] built from the tensor's identity *and* version,
//! the boundary mode and the transform shape. A mutated tensor has a new
//! version, so a stale spectrum can never be returned.
//!
//! # Eviction
//!
//! - Inserting a new version of a tensor evicts every older version of it.
//! - [`begin_iteration`](TransformCache::begin_iteration) advances a logical
//!   generation and drops entries that were not touched during the previous
//!   one. Spectra of constant operands survive because they are read every
//!   iteration.
//!
//! # Examples
//!
//! ```
//! use tnmf_core::{Boundary, VersionedTensor};
//! use tnmf_kernels::cache::{CacheKey, TransformCache};
//!
//! let cache = TransformCache::<Vec<f64>>::new();
//! let tensor = VersionedTensor::from_elem(&[4], 1.0);
//! let key = CacheKey::new(tensor.key(), Boundary::Full, &[8]);
//!
//! let first = cache.get_or_compute(key.clone(), || Ok(vec![tensor.sum()])).unwrap();
//! let second = cache
//!     .get_or_compute(key, || panic!("served from cache"))
//!     .unwrap();
//!
//! assert_eq!(first, second);
//! assert_eq!(cache.stats().hits, 1);
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tnmf_core::{Boundary, TensorKey, TnmfResult};

/// Identity of one cached transform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tensor: TensorKey,
    pub boundary: Boundary,
    pub shape: Vec<usize>,
}

impl CacheKey {
    pub fn new(tensor: TensorKey, boundary: Boundary, shape: &[usize]) -> Self {
        Self {
            tensor,
            boundary,
            shape: shape.to_vec(),
        }
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses (including every lookup while disabled)
    pub misses: usize,
    /// Number of evicted entries
    pub evictions: usize,
    /// Current number of cached transforms
    pub entries: usize,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry<V> {
    value: Arc<V>,
    /// Generation of the last access
    last_used: u64,
}

struct CacheInner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    generation: u64,
    stats: CacheStats,
}

/// Thread-safe memo of computed transforms
pub struct TransformCache<V> {
    enabled: bool,
    inner: Mutex<CacheInner<V>>,
}

impl<V> Default for TransformCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TransformCache<V> {
    /// Create an enabled cache
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                generation: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    ///
    /// The lock is released while `compute` runs, so concurrent misses on
    /// different keys transform in parallel. Errors from `compute` are passed
    /// through and nothing is stored.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> TnmfResult<Arc<V>>
    where
        F: FnOnce() -> TnmfResult<V>,
    {
        if !self.enabled {
            self.inner.lock().stats.misses += 1;
            return compute().map(Arc::new);
        }

        {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.last_used = generation;
                let value = Arc::clone(&entry.value);
                inner.stats.hits += 1;
                tracing::trace!(
                    tensor = key.tensor.id.get(),
                    version = key.tensor.version,
                    "transform cache hit"
                );
                return Ok(value);
            }
            inner.stats.misses += 1;
        }

        let value = Arc::new(compute()?);

        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|k, _| k.tensor.id != key.tensor.id || k.tensor.version >= key.tensor.version);
        let evicted = before - inner.entries.len();
        inner.stats.evictions += evicted;

        let generation = inner.generation;
        inner.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                last_used: generation,
            },
        );
        inner.stats.entries = inner.entries.len();
        Ok(value)
    }

    /// Advance the generation and drop entries unused during the previous one
    pub fn begin_iteration(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let oldest_kept = inner.generation.saturating_sub(1);
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.last_used >= oldest_kept);
        let evicted = before - inner.entries.len();
        inner.stats.evictions += evicted;
        inner.stats.entries = inner.entries.len();
    }

    /// Drop every entry (statistics are kept)
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let evicted = inner.entries.len();
        inner.entries.clear();
        inner.stats.evictions += evicted;
        inner.stats.entries = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
