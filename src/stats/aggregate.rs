use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use crate::stats::reservoir::Reservoir;

/// Per-fingerprint aggregation state.
///
/// Entries are shared between the flow listeners that update them and the
/// reporter that reads them; counters are atomics so a snapshot never
/// sees a torn word.
#[derive(Default)]
pub struct AggregateEntry {
    count: AtomicU64,
    bytes: AtomicU64,
    latencies: Reservoir,
}

impl AggregateEntry {
    /// Count one identity-carrying request.
    pub fn record_query(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Charge one measured response: its latency sample and payload size.
    pub fn record_response(&self, slot: usize, latency_ns: u64, response_bytes: u64) {
        self.latencies.record(slot, latency_ns);
        self.bytes.fetch_add(response_bytes, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn latencies(&self) -> &Reservoir {
        &self.latencies
    }
}

/// The fingerprint table. One mutex around the whole map is enough: the
/// fingerprint cardinality is low in steady state and each access is a
/// lookup plus an `Arc` clone.
#[derive(Default)]
pub struct Aggregator {
    entries: Mutex<HashMap<String, Arc<AggregateEntry>>>,
}

impl Aggregator {
    /// Look up or create the entry for a rendered fingerprint.
    pub fn entry(&self, fingerprint: &str) -> Arc<AggregateEntry> {
        let mut entries = lock(&self.entries);
        match entries.get(fingerprint) {
            Some(entry) => Arc::clone(entry),
            None => {
                let entry = Arc::new(AggregateEntry::default());
                entries.insert(fingerprint.to_string(), Arc::clone(&entry));
                entry
            }
        }
    }

    /// Clone the table out for reporting.
    pub fn snapshot(&self) -> Vec<(String, Arc<AggregateEntry>)> {
        lock(&self.entries)
            .iter()
            .map(|(fingerprint, entry)| (fingerprint.clone(), Arc::clone(entry)))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned map still holds consistent atomics; keep serving it.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-wide counters every flow contributes to.
pub struct SniffStats {
    queries: AtomicU64,
    latencies: Reservoir,
    started: Instant,
}

impl SniffStats {
    pub fn new() -> Self {
        Self {
            queries: AtomicU64::new(0),
            latencies: Reservoir::new(),
            started: Instant::now(),
        }
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, slot: usize, latency_ns: u64) {
        self.latencies.record(slot, latency_ns);
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn latencies(&self) -> &Reservoir {
        &self.latencies
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl Default for SniffStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_created_once_per_fingerprint() {
        let agg = Aggregator::default();
        let a = agg.entry("users:42");
        let b = agg.entry("users:42");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(agg.len(), 1);

        agg.entry("users:43");
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn count_is_at_least_populated_slots() {
        let agg = Aggregator::default();
        let entry = agg.entry("users:42");
        entry.record_query();
        entry.record_response(7, 5_000_000, 120);

        assert_eq!(entry.count(), 1);
        assert_eq!(entry.bytes(), 120);
        assert!(entry.count() >= entry.latencies().populated() as u64);
    }

    #[test]
    fn snapshot_shares_entries_with_the_table() {
        let agg = Aggregator::default();
        agg.entry("a").record_query();
        let snapshot = agg.snapshot();
        assert_eq!(snapshot.len(), 1);

        // Updates after the snapshot are visible through the shared Arc.
        agg.entry("a").record_query();
        assert_eq!(snapshot[0].1.count(), 2);
    }
}
