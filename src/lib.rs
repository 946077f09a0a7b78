//! Sliding k-minimum-values (S-KMV) cardinality sketch.
//!
//! Estimates, over a time-based sliding window of length N, the number of
//! distinct elements observed per flow and across all flows, in memory that
//! is fixed at construction time. Window expiry is handled by a compressed
//! modular timestamp and a per-bucket lock zone that defers head rescans.

/// Sketch parameters and validation
pub mod config;
/// Flow and element hashing
pub mod hash;
/// The sketch itself
pub mod sketch;
/// Adjusted (modular) timestamps
pub mod time;
/// Trace record parsing
pub mod trace;
/// Trace replay with scheduled cleaning
pub mod replay;

mod error;

pub use config::SketchConfig;
pub use error::{Result, SketchError};
pub use replay::Replay;
pub use sketch::{BucketSnapshot, EntrySnapshot, Sketch};
pub use trace::{Record, TraceReader};
