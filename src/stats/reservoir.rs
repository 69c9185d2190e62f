use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Number of samples a reservoir retains.
pub const RESERVOIR_SLOTS: usize = 100;

/// Fixed-size latency sample array written at uniformly random indices.
///
/// A slot holding 0 has never been written: no query completes in zero
/// nanoseconds, so 0 doubles as the uninitialized sentinel. Writes are
/// relaxed atomic stores; concurrent writers may overwrite each other's
/// samples, which a statistical sampler tolerates, but a reader never
/// observes a torn word.
pub struct Reservoir {
    slots: [AtomicU64; RESERVOIR_SLOTS],
}

impl Reservoir {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Pick a uniformly random slot index. The flow, global, and
    /// per-fingerprint reservoirs touched by one response all share the
    /// index chosen here.
    pub fn random_slot() -> usize {
        rand::rng().random_range(0..RESERVOIR_SLOTS)
    }

    pub fn record(&self, slot: usize, latency_ns: u64) {
        self.slots[slot].store(latency_ns, Ordering::Relaxed);
    }

    /// Number of slots holding a sample.
    pub fn populated(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.load(Ordering::Relaxed) != 0)
            .count()
    }

    /// Min/avg/max in milliseconds over populated slots only. All three
    /// are 0.0 while nothing has been recorded. The mean is computed in
    /// integer nanoseconds before the millisecond conversion.
    pub fn stats(&self) -> LatencyStats {
        let mut min = 0u64;
        let mut max = 0u64;
        let mut total = 0u64;
        let mut count = 0u64;
        for slot in &self.slots {
            let val = slot.load(Ordering::Relaxed);
            if val == 0 {
                continue;
            }
            if count == 0 || val < min {
                min = val;
            }
            if val > max {
                max = val;
            }
            count += 1;
            total += val;
        }
        let avg = if count > 0 { total / count } else { 0 };
        LatencyStats {
            min_ms: min as f64 / 1_000_000.0,
            avg_ms: avg as f64 / 1_000_000.0,
            max_ms: max as f64 / 1_000_000.0,
        }
    }
}

impl Default for Reservoir {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}
