use crate::time::AdjustedTime;

/// One k-minimum slot: an element hash plus its compressed arrival time.
///
/// A slot is empty iff its hash equals the range sentinel; the adjusted time
/// is kept unset exactly when that holds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub(crate) h: u64,
    pub(crate) at: AdjustedTime,
}

impl Entry {
    #[inline]
    fn empty(window: u64, hash_range: u64) -> Self {
        Self {
            h: hash_range,
            at: AdjustedTime::unset(window),
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self, hash_range: u64) -> bool {
        self.h == hash_range
    }
}

/// A bucket holds the k smallest in-window element hashes routed to it.
///
/// `head` indexes the entry with the largest in-window hash. When that entry
/// falls out of the window the bucket arms a lock instead of rescanning on
/// every arrival: while locked, `lock_max` tracks the smallest hash observed
/// between the stale head value and the top of the range, and `lock_time`
/// bounds how long the deferral may last.
#[derive(Debug)]
pub(crate) struct Bucket {
    entries: Box<[Entry]>,
    head: usize,
    locked: bool,
    lock_time: AdjustedTime,
    lock_max: u64,
}

impl Bucket {
    pub(crate) fn new(k: u32, window: u64, hash_range: u64) -> Self {
        let entries = vec![Entry::empty(window, hash_range); k as usize].into_boxed_slice();
        Self {
            entries,
            head: 0,
            locked: false,
            lock_time: AdjustedTime::unset(window),
            lock_max: hash_range,
        }
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[inline]
    pub(crate) fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }

    #[inline]
    pub(crate) fn lock_max(&self) -> u64 {
        self.lock_max
    }

    #[inline]
    pub(crate) fn lock_time(&self) -> AdjustedTime {
        self.lock_time
    }

    /// Lock maintenance, run before every arrival and every estimate pass.
    ///
    /// A lock whose hold time has passed is released. A released (or never
    /// armed) lock is re-armed when the head entry holds a real hash that
    /// has left the window: from that point the bucket no longer knows its
    /// in-window maximum and defers the rescan. An empty head arms nothing.
    pub(crate) fn refresh_lock(&mut self, now: u64, window: u64, hash_range: u64) {
        if self.locked && !self.lock_time.in_window(now, window) {
            self.locked = false;
        }
        if !self.locked {
            let head = &self.entries[self.head];
            if !head.is_empty(hash_range) && !head.at.in_window(now, window) {
                self.locked = true;
                // The head expired N units after its arrival; holding the
                // lock until N units after that covers exactly the rest of
                // the head's unambiguous encoding span.
                self.lock_time.record(head.at.raw() + window, window);
                self.lock_max = hash_range;
            }
        }
    }

    /// Records one arrival with element hash `hy` at stream time `now`.
    pub(crate) fn update(&mut self, hy: u64, now: u64, window: u64, hash_range: u64) {
        self.refresh_lock(now, window, hash_range);

        // Re-observed element: refresh its arrival time and stop.
        if let Some(j) = self.position_of(hy, hash_range) {
            let was_stale = !self.entries[j].at.in_window(now, window);
            self.entries[j].at.record(now, window);
            if self.locked && j == self.head && was_stale {
                // The refresh revived the very entry the lock declared
                // stale; recompute the head and release the lock.
                self.update_head(now, window, hash_range);
                self.locked = false;
            }
            return;
        }

        if self.locked {
            self.update_locked(hy, now, window, hash_range);
        } else {
            self.update_no_lock(hy, now, window, hash_range);
        }
    }

    /// Index of the non-empty entry holding `hy`, if any.
    #[inline]
    fn position_of(&self, hy: u64, hash_range: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| !e.is_empty(hash_range) && e.h == hy)
    }

    /// First slot that can be overwritten: empty slots take precedence over
    /// expired ones.
    fn stale_slot(&self, now: u64, window: u64, hash_range: u64) -> Option<usize> {
        if let Some(j) = self.entries.iter().position(|e| e.is_empty(hash_range)) {
            return Some(j);
        }
        self.entries
            .iter()
            .position(|e| !e.at.in_window(now, window))
    }

    #[inline]
    fn write_slot(&mut self, pos: usize, hy: u64, now: u64, window: u64) {
        self.entries[pos].h = hy;
        self.entries[pos].at.record(now, window);
    }

    fn update_no_lock(&mut self, hy: u64, now: u64, window: u64, hash_range: u64) {
        if let Some(pos) = self.stale_slot(now, window, hash_range) {
            // Accept into any free slot, k-minimum or not; oversized values
            // taken in here are displaced once k true minima arrive, or
            // expire on their own.
            self.write_slot(pos, hy, now, window);
            let head = &self.entries[self.head];
            if head.is_empty(hash_range) || hy > head.h {
                self.head = pos;
            }
        } else if hy < self.entries[self.head].h {
            // All slots hold valid values: a new k-minimum displaces the
            // current maximum.
            self.write_slot(self.head, hy, now, window);
            self.update_head(now, window, hash_range);
        }
        // Anything not below the in-window maximum of a full bucket is not
        // among the k smallest; drop it.
    }

    fn update_locked(&mut self, hy: u64, now: u64, window: u64, hash_range: u64) {
        let head_h = self.entries[self.head].h;
        if hy < head_h {
            if let Some(pos) = self.stale_slot(now, window, hash_range) {
                self.write_slot(pos, hy, now, window);
            } else {
                // Every slot holds a valid value again, so evicting the old
                // maximum restores a fully known bucket; the lock has
                // nothing left to guard.
                self.write_slot(self.head, hy, now, window);
                self.update_head(now, window, hash_range);
                self.locked = false;
            }
        } else if hy > head_h && hy < self.lock_max {
            // Smallest candidate seen in the zone above the stale head.
            self.lock_max = hy;
        }
    }

    /// Full rescan: point `head` at the largest in-window hash, slot 0 when
    /// nothing is in-window.
    pub(crate) fn update_head(&mut self, now: u64, window: u64, hash_range: u64) {
        let mut best: Option<usize> = None;
        for (j, e) in self.entries.iter().enumerate() {
            if e.is_empty(hash_range) || !e.at.in_window(now, window) {
                continue;
            }
            match best {
                Some(b) if self.entries[b].h >= e.h => {}
                _ => best = Some(j),
            }
        }
        self.head = best.unwrap_or(0);
    }

    /// Resets every expired entry to the empty sentinel pair, then restores
    /// the head and lock state.
    ///
    /// The head rescan below is exactly the work a lock defers, so any
    /// armed lock is resolved here; afterwards the head is either empty or
    /// in-window and the maintenance pass cannot re-arm.
    pub(crate) fn clean(&mut self, now: u64, window: u64, hash_range: u64) {
        for e in self.entries.iter_mut() {
            if e.at.clean(now, window) {
                e.h = hash_range;
            }
        }
        self.update_head(now, window, hash_range);
        self.locked = false;
        self.refresh_lock(now, window, hash_range);
    }

    /// Collects the hashes that may feed the estimator: non-empty, in-window,
    /// and not the head of a locked bucket (its stale value no longer
    /// reflects in-window data).
    pub(crate) fn collect_valid(
        &self,
        now: u64,
        window: u64,
        hash_range: u64,
        out: &mut Vec<u64>,
    ) {
        out.clear();
        for (j, e) in self.entries.iter().enumerate() {
            if e.is_empty(hash_range) || !e.at.in_window(now, window) {
                continue;
            }
            if self.locked && j == self.head {
                continue;
            }
            out.push(e.h);
        }
    }
}
