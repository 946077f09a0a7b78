use std::io::BufRead;

use log::{debug, warn};

use crate::error::Result;
use crate::sketch::Sketch;
use crate::trace::{Record, TraceReader};

/// Feeds a record stream into a sketch and keeps the cleaning contract.
///
/// Expired entries must be cleaned at least once every N time units of
/// stream progress. `Replay` triggers `periodic_clean` from the ingestion
/// path whenever stream time has advanced by the configured interval since
/// the last cleaning, defaulting to N/2.
pub struct Replay {
    sketch: Sketch,
    clean_interval: u64,
    last_clean: Option<u64>,
    records: u64,
}

impl Replay {
    pub fn new(sketch: Sketch) -> Self {
        let clean_interval = (sketch.window_size() / 2).max(1);
        Self::with_clean_interval(sketch, clean_interval)
    }

    /// `clean_interval` is clamped to the window length; anything longer
    /// would let compressed timestamps wrap before they are reset.
    pub fn with_clean_interval(sketch: Sketch, clean_interval: u64) -> Self {
        let clean_interval = clean_interval.clamp(1, sketch.window_size());
        Self {
            sketch,
            clean_interval,
            last_clean: None,
            records: 0,
        }
    }

    /// Records one observation, cleaning first if the stream has advanced
    /// far enough since the previous cleaning.
    pub fn feed(&mut self, record: &Record) {
        if record.timestamp < self.sketch.current_time() && self.records > 0 {
            // Out-of-contract input; the sketch itself does not detect this.
            warn!(
                "out-of-order timestamp {} after {}",
                record.timestamp,
                self.sketch.current_time()
            );
        }
        match self.last_clean {
            None => self.last_clean = Some(record.timestamp),
            Some(last) => {
                if record.timestamp.saturating_sub(last) >= self.clean_interval {
                    debug!("cleaning at stream time {}", record.timestamp);
                    self.sketch.periodic_clean(record.timestamp);
                    self.last_clean = Some(record.timestamp);
                }
            }
        }
        self.sketch
            .record(record.flow, record.element, record.timestamp);
        self.records += 1;
    }

    /// Drains a trace into the sketch. Returns the number of records fed;
    /// the first I/O or parse error stops the run.
    pub fn run<R: BufRead>(&mut self, reader: TraceReader<R>) -> Result<u64> {
        let before = self.records;
        for record in reader {
            self.feed(&record?);
        }
        Ok(self.records - before)
    }

    #[inline]
    pub fn records_fed(&self) -> u64 {
        self.records
    }

    #[inline]
    pub fn clean_interval(&self) -> u64 {
        self.clean_interval
    }

    #[inline]
    pub fn sketch(&self) -> &Sketch {
        &self.sketch
    }

    #[inline]
    pub fn sketch_mut(&mut self) -> &mut Sketch {
        &mut self.sketch
    }

    #[inline]
    pub fn into_sketch(self) -> Sketch {
        self.sketch
    }
}
