use std::hash::Hasher;

use twox_hash::XxHash64;

/// Seed for the element hash. Fixed so that repeated runs over the same
/// input produce bit-identical sketches.
const ELEMENT_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Routes a flow label to a bucket in `[0, m)`.
///
/// FxHash is plenty for routing: flow labels are small integers and only the
/// spread across m buckets matters, not avalanche quality.
#[inline]
pub fn bucket_index(flow: u64, m: u32) -> u32 {
    (fxhash::hash64(&flow) % u64::from(m)) as u32
}

/// Hashes an element id to a uniform value in `[0, hash_range)` where
/// `hash_range = 2^bits - 1`.
///
/// The estimator depends on these values being close to uniform, so this
/// uses a seeded avalanche hash rather than FxHash. `hash_range` itself is
/// reserved as the empty-slot sentinel; the one masked value that would
/// collide with it is clamped one below.
#[inline]
pub fn element_hash(element: u64, bits: u32) -> u64 {
    let mut hasher = XxHash64::with_seed(ELEMENT_SEED);
    hasher.write_u64(element);
    let mask = if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    };
    let h = hasher.finish() & mask;
    if h == mask {
        mask - 1
    } else {
        h
    }
}
