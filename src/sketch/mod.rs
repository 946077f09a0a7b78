mod bucket;

use crate::config::SketchConfig;
use crate::error::{Result, SketchError};
use crate::hash;

use self::bucket::Bucket;

/// Sliding k-minimum-values sketch.
///
/// Owns `m` buckets of `k` entry slots each, all allocated at construction;
/// the record path touches exactly one bucket and never allocates. Stream
/// time `T` advances with every `record` and `periodic_clean` call and the
/// caller must feed timestamps in non-decreasing order. Cleaning must run at
/// least once every N time units of stream progress, or expired entries may
/// be misread as fresh once their compressed timestamps wrap.
pub struct Sketch {
    config: SketchConfig,
    buckets: Box<[Bucket]>,
    now: u64,
    /// Reusable buffer for the per-bucket value collection in `estimate`.
    scratch: Vec<u64>,
}

/// Read-only copy of one entry slot, for tests and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Element hash; equals `hash_range` when the slot is empty.
    pub hash: u64,
    /// Raw adjusted timestamp; equals `timestamp_range` when unset.
    pub adjusted_time: u64,
}

/// Read-only copy of one bucket's state, for tests and debugging.
#[derive(Debug, Clone)]
pub struct BucketSnapshot {
    pub entries: Vec<EntrySnapshot>,
    pub head: usize,
    pub locked: bool,
    pub lock_max: u64,
    pub lock_time: u64,
}

impl Sketch {
    /// Builds a sketch for window length `window` with `m` buckets of `k`
    /// slots, `hash_bits`-wide element hashes and `time_bits`-wide stored
    /// timestamps. Fails on any parameter outside its documented range.
    pub fn new(window: u64, k: u32, m: u32, hash_bits: u32, time_bits: u32) -> Result<Self> {
        Ok(Self::with_config(SketchConfig::new(
            window, k, m, hash_bits, time_bits,
        )?))
    }

    pub fn with_config(config: SketchConfig) -> Self {
        let buckets = (0..config.m())
            .map(|_| Bucket::new(config.k(), config.window(), config.hash_range()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            config,
            buckets,
            now: 0,
            scratch: Vec::with_capacity(config.k() as usize),
        }
    }

    /// Records one `(flow, element, timestamp)` observation.
    pub fn record(&mut self, flow: u64, element: u64, timestamp: u64) {
        self.now = timestamp;
        let i = hash::bucket_index(flow, self.config.m()) as usize;
        let hy = hash::element_hash(element, self.config.hash_bits());
        self.buckets[i].update(
            hy,
            timestamp,
            self.config.window(),
            self.config.hash_range(),
        );
    }

    /// Advances stream time to `t_now` and resets every expired entry in
    /// every bucket.
    pub fn periodic_clean(&mut self, t_now: u64) {
        self.now = t_now;
        let window = self.config.window();
        let range = self.config.hash_range();
        for bucket in self.buckets.iter_mut() {
            bucket.clean(t_now, window, range);
        }
    }

    /// Cleans a single bucket at the current stream time. Lets callers
    /// spread cleaning cost over many calls instead of paying for all `m`
    /// buckets at once.
    pub fn periodic_clean_bucket(&mut self, index: u32) -> Result<()> {
        if index >= self.config.m() {
            return Err(SketchError::BucketOutOfRange {
                index,
                m: self.config.m(),
            });
        }
        self.buckets[index as usize].clean(
            self.now,
            self.config.window(),
            self.config.hash_range(),
        );
        Ok(())
    }

    /// Estimated number of distinct elements in the window, across all
    /// flows: the harmonic mean of the per-bucket KMV estimates over the
    /// buckets that hold any valid value.
    pub fn estimate(&mut self) -> f64 {
        let now = self.now;
        let window = self.config.window();
        let range = self.config.hash_range();
        let mut effective_m = i64::from(self.config.m());
        let mut harmonic_sum = 0.0f64;

        let mut scratch = std::mem::take(&mut self.scratch);
        for bucket in self.buckets.iter_mut() {
            bucket.refresh_lock(now, window, range);
            bucket.collect_valid(now, window, range, &mut scratch);
            if scratch.is_empty() {
                effective_m -= 1;
                continue;
            }
            let n_i = bucket_cardinality(&scratch, range);
            if n_i > 0.0 {
                harmonic_sum += 1.0 / n_i;
            }
        }
        self.scratch = scratch;

        if effective_m > 0 && harmonic_sum > 0.0 {
            effective_m as f64 / harmonic_sum
        } else {
            0.0
        }
    }

    /// Estimated number of distinct elements in the window for one flow,
    /// read from the single bucket the flow routes to.
    pub fn estimate_flow(&mut self, flow: u64) -> f64 {
        let now = self.now;
        let window = self.config.window();
        let range = self.config.hash_range();
        let i = hash::bucket_index(flow, self.config.m()) as usize;

        let mut scratch = std::mem::take(&mut self.scratch);
        let bucket = &mut self.buckets[i];
        bucket.refresh_lock(now, window, range);
        bucket.collect_valid(now, window, range, &mut scratch);
        let estimate = if scratch.is_empty() {
            0.0
        } else {
            bucket_cardinality(&scratch, range).max(0.0)
        };
        self.scratch = scratch;
        estimate
    }

    #[inline]
    pub fn current_time(&self) -> u64 {
        self.now
    }

    #[inline]
    pub fn window_size(&self) -> u64 {
        self.config.window()
    }

    #[inline]
    pub fn k(&self) -> u32 {
        self.config.k()
    }

    #[inline]
    pub fn m(&self) -> u32 {
        self.config.m()
    }

    #[inline]
    pub fn hash_range(&self) -> u64 {
        self.config.hash_range()
    }

    #[inline]
    pub fn timestamp_range(&self) -> u64 {
        self.config.timestamp_range()
    }

    #[inline]
    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    /// Configured memory budget in bits, per the bucket layout formula.
    #[inline]
    pub fn memory_bits(&self) -> u64 {
        self.config.memory_bits()
    }

    /// Read-only snapshot of bucket `index`.
    pub fn bucket(&self, index: u32) -> Result<BucketSnapshot> {
        if index >= self.config.m() {
            return Err(SketchError::BucketOutOfRange {
                index,
                m: self.config.m(),
            });
        }
        let bucket = &self.buckets[index as usize];
        Ok(BucketSnapshot {
            entries: bucket
                .entries()
                .iter()
                .map(|e| EntrySnapshot {
                    hash: e.h,
                    adjusted_time: e.at.raw(),
                })
                .collect(),
            head: bucket.head(),
            locked: bucket.is_locked(),
            lock_max: bucket.lock_max(),
            lock_time: bucket.lock_time().raw(),
        })
    }
}

/// Classical KMV estimate for one bucket: with k' collected values whose
/// maximum is alpha, the distinct count is about `k' * range / alpha - 1`.
#[inline]
fn bucket_cardinality(values: &[u64], hash_range: u64) -> f64 {
    let k_prime = values.len() as f64;
    let alpha = values.iter().copied().fold(0u64, u64::max) as f64;
    k_prime * (hash_range as f64) / alpha - 1.0
}
