//! Sample ledger: cumulative PMC sample counts by address and by thread
//!
//! Address counts live in a `BTreeMap` because the attribution sweep needs
//! ascending iteration; thread counts are only ever point-looked-up.

use fnv::FnvHashMap;
use std::collections::BTreeMap;

/// Monotonic counters for every sampled address and thread
#[derive(Debug, Default)]
pub struct SampleLedger {
    address_counts: BTreeMap<u64, u64>,
    thread_counts: FnvHashMap<u64, u64>,
    total_samples: u64,
}

impl SampleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` samples at `address`
    pub fn record_sample(&mut self, address: u64, count: u64) {
        *self.address_counts.entry(address).or_insert(0) += count;
        self.total_samples += count;
    }

    /// Add `count` samples to a thread's counter. `count` may be zero; the
    /// entry is still materialized so a later snapshot of this thread is
    /// well-defined even before its first sample.
    pub fn record_thread_sample(&mut self, thread_id: u64, count: u64) {
        *self.thread_counts.entry(thread_id).or_insert(0) += count;
    }

    /// Current cumulative count for a thread, 0 if never recorded
    pub fn thread_count(&self, thread_id: u64) -> u64 {
        self.thread_counts.get(&thread_id).copied().unwrap_or(0)
    }

    /// Current cumulative count for an address, 0 if never recorded
    pub fn address_count(&self, address: u64) -> u64 {
        self.address_counts.get(&address).copied().unwrap_or(0)
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Insertion-independent ascending walk of `(address, count)` pairs
    pub fn ordered_addresses(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.address_counts.iter().map(|(&addr, &count)| (addr, count))
    }
}
