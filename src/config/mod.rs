use crate::error::{Result, SketchError};

/// Sketch parameters, fixed at construction.
///
/// `window` is the sliding-window length N in stream time units. Each of the
/// `m` buckets keeps the `k` smallest element hashes seen for the flows that
/// route to it. `hash_bits` (delta1) sets the width of element hashes and
/// `time_bits` (delta2) the width of the stored timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchConfig {
    window: u64,
    k: u32,
    m: u32,
    hash_bits: u32,
    time_bits: u32,
}

impl SketchConfig {
    pub fn new(window: u64, k: u32, m: u32, hash_bits: u32, time_bits: u32) -> Result<Self> {
        let config = Self {
            window,
            k,
            m,
            hash_bits,
            time_bits,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(SketchError::Config("window must be positive".into()));
        }
        if self.k == 0 {
            return Err(SketchError::Config("k must be at least 1".into()));
        }
        if self.m == 0 {
            return Err(SketchError::Config("m must be at least 1".into()));
        }
        if self.hash_bits == 0 || self.hash_bits > 64 {
            return Err(SketchError::Config(format!(
                "hash_bits must be in 1..=64, got {}",
                self.hash_bits
            )));
        }
        if self.time_bits == 0 || self.time_bits > 63 {
            return Err(SketchError::Config(format!(
                "time_bits must be in 1..=63, got {}",
                self.time_bits
            )));
        }
        // The encoding needs 2N distinct values plus the unset sentinel.
        let max_window = ((1u64 << self.time_bits) - 1) / 2;
        if self.window > max_window {
            return Err(SketchError::Config(format!(
                "window {} exceeds {} representable in {} time bits",
                self.window, max_window, self.time_bits
            )));
        }
        Ok(())
    }

    /// Window length N.
    #[inline]
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Entry slots per bucket.
    #[inline]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Number of buckets.
    #[inline]
    pub fn m(&self) -> u32 {
        self.m
    }

    #[inline]
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    #[inline]
    pub fn time_bits(&self) -> u32 {
        self.time_bits
    }

    /// Largest element hash value, which doubles as the empty-slot sentinel.
    #[inline]
    pub fn hash_range(&self) -> u64 {
        if self.hash_bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.hash_bits) - 1
        }
    }

    /// Number of distinct adjusted-timestamp encodings (2N); also the unset
    /// sentinel value.
    #[inline]
    pub fn timestamp_range(&self) -> u64 {
        2 * self.window
    }

    /// Configured memory budget in bits:
    /// `m * (k * (delta1 + delta2) + 1 + delta2 + delta1 + ceil(log2 k))`.
    pub fn memory_bits(&self) -> u64 {
        let entry = u64::from(self.k) * u64::from(self.hash_bits + self.time_bits);
        let head = if self.k == 1 {
            0
        } else {
            u64::from(32 - (self.k - 1).leading_zeros())
        };
        let lock = 1 + u64::from(self.time_bits) + u64::from(self.hash_bits);
        u64::from(self.m) * (entry + lock + head)
    }
}
